use core::future::Future;
use core::pin::Pin;
use core::task::{Context as TaskContext, Poll};

use super::Context;

/// Resolves once a [`Context`] is cancelled.
///
/// This `struct` is created by the [`done`] method on [`Context`]. See its
/// documentation for more.
///
/// [`done`]: Context::done
#[derive(Debug)]
#[must_use = "futures do nothing unless polled or .awaited"]
pub struct Done {
    ctx: Context,
    key: Option<usize>,
}

impl Done {
    pub(crate) fn new(ctx: Context) -> Self {
        Self { ctx, key: None }
    }

    /// Returns `true` once the context is cancelled, without registering a waker.
    pub(crate) fn is_set(&self) -> bool {
        self.ctx.is_done()
    }
}

impl Future for Done {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        let this = &mut *self;
        if this.ctx.node().poll_done(&mut this.key, cx.waker()) {
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.ctx.node().unregister(key);
        }
    }
}
