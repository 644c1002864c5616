use core::fmt;
use core::future::Future;
use core::iter;
use core::pin::Pin;
use core::task::{Context as TaskContext, Poll};

use futures_core::Stream;
use pin_project::pin_project;

use crate::context::Done;
use crate::utils;
use crate::{Context, Pipe};

/// Merges the output of multiple pipes into one pipe, one after another.
///
/// `pipe` is drained until it closes, then the first of `pipes`, and so on.
/// The cancellation wiring is the same as for [`merge`][super::merge]: the
/// queued context is derived from `pipe`'s context and cancelled as soon as
/// any source's context is done, which closes the output without starting the
/// remaining sources.
///
/// With no additional pipes, `pipe` itself is returned.
///
/// # Examples
///
/// ```
/// use pipe_concurrency::{stream, Context, Descriptor, Item, Pipe};
/// use futures_lite::future::block_on;
/// use futures_lite::StreamExt;
///
/// block_on(async {
///     let ctx = Context::background();
///     let first = Pipe::from_items(ctx.clone(), vec![Item::from_bytes(Descriptor::new("1"), "")]);
///     let second = Pipe::from_items(ctx.clone(), vec![Item::from_bytes(Descriptor::new("2"), "")]);
///
///     let names: Vec<String> = stream::queue(first, [second])
///         .map(|item| {
///             let name = item.name().to_owned();
///             item.release();
///             name
///         })
///         .collect()
///         .await;
///     assert_eq!(names, ["1", "2"]);
/// })
/// ```
pub fn queue<I>(pipe: Pipe, pipes: I) -> Pipe
where
    I: IntoIterator<Item = Pipe>,
{
    let mut rest = pipes.into_iter().peekable();
    if rest.peek().is_none() {
        return pipe;
    }

    let pipes: Vec<Pipe> = iter::once(pipe).chain(rest).collect();
    let (queued, _) = pipes[0]
        .context()
        .with_first_settler(pipes[1..].iter().map(Pipe::context));
    tracing::trace!(parent: queued.span(), sources = pipes.len(), "queueing pipes");

    let streams = pipes.into_iter().map(Pipe::into_stream).collect();
    let stream = Queue::new(&queued, streams);
    Pipe::new(queued, stream)
}

/// A stream that drains multiple streams in sequence until they are
/// exhausted or a context is done.
///
/// This `struct` is created by [`queue`], or directly through
/// [`Queue::new`] for streams that are not wrapped in pipes.
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Queue<S> {
    #[pin]
    streams: Vec<S>,
    done: Done,
    index: usize,
    closed: bool,
}

impl<S: Stream> Queue<S> {
    /// Chains `streams`, closing early once `ctx` is done.
    pub fn new(ctx: &Context, streams: Vec<S>) -> Self {
        Self {
            streams,
            done: ctx.done(),
            index: 0,
            closed: false,
        }
    }
}

impl<S> fmt::Debug for Queue<S>
where
    S: Stream + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("streams", &self.streams)
            .field("index", &self.index)
            .finish()
    }
}

impl<S: Stream> Stream for Queue<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.closed {
                return Poll::Ready(None);
            }
            if Pin::new(&mut *this.done).poll(cx).is_ready() {
                tracing::trace!(source = *this.index, "queue cancelled");
                *this.closed = true;
                this.streams.set(Vec::new());
                return Poll::Ready(None);
            }

            let Some(stream) = utils::get_pin_mut_from_vec(this.streams.as_mut(), *this.index)
            else {
                *this.closed = true;
                return Poll::Ready(None);
            };
            match stream.poll_next(cx) {
                Poll::Ready(Some(item)) => return Poll::Ready(Some(item)),
                Poll::Ready(None) => {
                    *this.index += 1;
                    tracing::trace!(source = *this.index, "moving to next source");
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
