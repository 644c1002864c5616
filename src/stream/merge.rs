use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context as TaskContext, Poll};

use fixedbitset::FixedBitSet;
use futures_core::Stream;
use pin_project::pin_project;

use crate::context::Done;
use crate::utils::{self, SourceWakers};
use crate::{Context, Pipe};

/// Concurrently merges the output of multiple pipes into one pipe.
///
/// The returned pipe's context is derived from `ctx` and linked to the
/// context of every source: as soon as any of them is done, the merged
/// context is cancelled and the merged stream closes, even if other sources
/// still have items. Items from one source keep their order; items from
/// different sources are interleaved as they become ready.
///
/// Merging zero pipes yields a pipe whose stream is already closed.
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
///     let a = Pipe::from_items(ctx.clone(), vec![Item::from_bytes(Descriptor::new("a"), "a")]);
///     let b = Pipe::from_items(ctx.clone(), vec![Item::from_bytes(Descriptor::new("b"), "b")]);
///
///     let mut names: Vec<String> = stream::merge(&ctx, [a, b])
///         .map(|item| {
///             let name = item.name().to_owned();
///             item.release();
///             name
///         })
///         .collect()
///         .await;
///     names.sort();
///     assert_eq!(names, ["a", "b"]);
/// })
/// ```
pub fn merge<I>(ctx: &Context, pipes: I) -> Pipe
where
    I: IntoIterator<Item = Pipe>,
{
    let pipes: Vec<Pipe> = pipes.into_iter().collect();
    let (merged, _) = ctx.with_first_settler(pipes.iter().map(Pipe::context));
    tracing::trace!(parent: merged.span(), sources = pipes.len(), "merging pipes");

    let streams = pipes.into_iter().map(Pipe::into_stream).collect();
    let stream = Merge::new(&merged, streams);
    Pipe::new(merged, stream)
}

/// A stream that merges multiple streams until they are exhausted or a
/// context is done.
///
/// This `struct` is created by [`merge`], or directly through
/// [`Merge::new`] for streams that are not wrapped in pipes.
#[pin_project]
#[must_use = "streams do nothing unless polled"]
pub struct Merge<S> {
    #[pin]
    streams: Vec<S>,
    done: Done,
    wakers: SourceWakers,
    exhausted: FixedBitSet,
    remaining: usize,
    closed: bool,
}

impl<S: Stream> Merge<S> {
    /// Merges `streams`, closing early once `ctx` is done.
    pub fn new(ctx: &Context, streams: Vec<S>) -> Self {
        let len = streams.len();
        Self {
            streams,
            done: ctx.done(),
            wakers: SourceWakers::new(len),
            exhausted: FixedBitSet::with_capacity(len),
            remaining: len,
            closed: false,
        }
    }
}

impl<S> fmt::Debug for Merge<S>
where
    S: Stream + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.streams.iter()).finish()
    }
}

impl<S: Stream> Stream for Merge<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.closed {
            return Poll::Ready(None);
        }
        if *this.remaining == 0 || Pin::new(&mut *this.done).poll(cx).is_ready() {
            // Stop pulling. Sources are dropped now rather than with the
            // merge so that their producers are released promptly.
            *this.closed = true;
            this.streams.set(Vec::new());
            return Poll::Ready(None);
        }

        // Start at a random source so that when several are ready at once,
        // none of them gets to starve the others.
        let len = this.streams.len();
        let start = utils::random(len as u32) as usize;

        let mut readiness = this.wakers.readiness();
        readiness.set_waker(cx.waker());
        for offset in 0..len {
            if !readiness.any_ready() {
                // Nothing is ready yet
                return Poll::Pending;
            }

            let index = (start + offset) % len;
            if this.exhausted[index] || !readiness.clear_ready(index) {
                continue;
            }

            // unlock readiness so we don't deadlock when polling
            drop(readiness);

            let mut cx = TaskContext::from_waker(this.wakers.get(index).unwrap());
            let stream = utils::get_pin_mut_from_vec(this.streams.as_mut(), index).unwrap();
            match stream.poll_next(&mut cx) {
                Poll::Ready(Some(item)) => {
                    // Poll this source again next time, it may have more.
                    this.wakers.readiness().set_ready(index);
                    return Poll::Ready(Some(item));
                }
                Poll::Ready(None) => {
                    this.exhausted.insert(index);
                    *this.remaining -= 1;
                    if *this.remaining == 0 {
                        *this.closed = true;
                        return Poll::Ready(None);
                    }
                }
                Poll::Pending => {}
            }

            // Polling a source may have settled the shared context.
            if this.done.is_set() {
                *this.closed = true;
                this.streams.set(Vec::new());
                return Poll::Ready(None);
            }

            readiness = this.wakers.readiness();
        }
        Poll::Pending
    }
}
