//! A running producer: a context bound to the stream it feeds.

use core::fmt;
use core::pin::Pin;
use core::task::{Context as TaskContext, Poll};

use futures::channel::mpsc;
use futures_core::Stream;

use crate::stage::{Stage, Staged};
use crate::{Context, Item};

/// The single-reader stream of items carried by a [`Pipe`].
pub type ItemStream = Pin<Box<dyn Stream<Item = Item> + Send>>;

/// The output handle a [`Stage`] forwards items into.
pub type ItemSender = mpsc::Sender<Item>;

/// A [`Context`] bound to a stream of items.
///
/// The stream has exactly one consumer. A pipe is consumed until its stream
/// closes or its context is done, and is never reused afterwards.
pub struct Pipe {
    ctx: Context,
    stream: ItemStream,
}

impl Pipe {
    /// Binds `ctx` and `stream` together.
    pub fn new<S>(ctx: Context, stream: S) -> Self
    where
        S: Stream<Item = Item> + Send + 'static,
    {
        Self {
            ctx,
            stream: Box::pin(stream),
        }
    }

    /// Creates a pipe which yields `items` in order and then closes.
    pub fn from_items<I>(ctx: Context, items: I) -> Self
    where
        I: IntoIterator<Item = Item>,
        I::IntoIter: Send + 'static,
    {
        Self::new(ctx, futures_lite::stream::iter(items))
    }

    /// The context this pipe runs under.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The pipe's stream. Every call returns the same stream; it is not a
    /// new subscription.
    pub fn stream(&mut self) -> &mut ItemStream {
        &mut self.stream
    }

    /// Splits the pipe into its context and stream.
    pub fn into_parts(self) -> (Context, ItemStream) {
        (self.ctx, self.stream)
    }

    pub(crate) fn into_stream(self) -> ItemStream {
        self.stream
    }

    /// Runs `stage` over this pipe's items and returns a pipe over its output.
    ///
    /// The stage runs under a cancellable child of this pipe's context and is
    /// driven by whoever consumes the returned pipe. If it fails, the error is
    /// logged and the child context is cancelled with the error as its cause,
    /// which downstream combinators observe as this pipe settling.
    pub fn pipe<S: Stage>(self, stage: S) -> Pipe {
        let (ctx, canceller) = self.ctx.with_cancel();
        // One slot: the stage can hold at most one handed-off item.
        let (output, items) = mpsc::channel(0);
        let run = stage.execute(ctx.clone(), self.stream, output);
        Pipe::new(ctx.clone(), Staged::new(ctx, canceller, run, items))
    }
}

impl Stream for Pipe {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}
