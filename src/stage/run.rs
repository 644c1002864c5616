use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context as TaskContext, Poll};

use futures::channel::mpsc;
use futures_core::Stream;
use pin_project::pin_project;

use crate::{Canceller, Context, Item, Result};

/// The output of a running stage.
///
/// Polling a `Staged` stream drives the stage itself, then yields whatever
/// it has handed off. The stream closes once the stage has returned and its
/// output has been drained. No task is spawned, so nothing outlives the
/// stream.
///
/// This `struct` is created by [`Pipe::pipe`][crate::Pipe::pipe].
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Staged<F> {
    #[pin]
    run: Option<F>,
    items: mpsc::Receiver<Item>,
    ctx: Context,
    canceller: Canceller,
}

impl<F> Staged<F>
where
    F: Future<Output = Result<()>>,
{
    pub(crate) fn new(
        ctx: Context,
        canceller: Canceller,
        run: F,
        items: mpsc::Receiver<Item>,
    ) -> Self {
        Self {
            run: Some(run),
            items,
            ctx,
            canceller,
        }
    }
}

impl<F> fmt::Debug for Staged<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Staged")
            .field("running", &self.run.is_some())
            .field("ctx", &self.ctx)
            .finish()
    }
}

impl<F> Stream for Staged<F>
where
    F: Future<Output = Result<()>>,
{
    type Item = Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Item>> {
        let mut this = self.project();

        if let Some(run) = this.run.as_mut().as_pin_mut() {
            if let Poll::Ready(result) = run.poll(cx) {
                this.run.set(None);
                match result {
                    Ok(()) => tracing::trace!(parent: this.ctx.span(), "stage finished"),
                    Err(err) => {
                        // A stage that stopped because its context was already
                        // done is reporting someone else's failure.
                        if !this.ctx.is_done() {
                            this.ctx.error(format_args!("stage failed: {err}"));
                        }
                        this.canceller.cancel_with(err);
                    }
                }
            }
        }

        Pin::new(this.items).poll_next(cx)
    }
}
