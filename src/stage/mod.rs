//! The stage execution contract and the reference stages.
//!
//! A [`Stage`] consumes one item stream and produces another under a
//! [`Context`]. Every stage is written as the same loop: wait for the next
//! input item, the end of the input, or the context being done, whichever
//! comes first. [`recv`] and [`send`] are the two suspension points of that
//! loop, and both give cancellation priority, so a stage never forwards an
//! item after its context is done.
//!
//! Each received item must be forwarded, consumed, or released.
//!
//! # Examples
//!
//! ```
//! use pipe_concurrency::stage::{self, Stage};
//! use pipe_concurrency::{Context, Descriptor, Item, ItemSender, ItemStream, Pipe, Result};
//! use futures_lite::future::block_on;
//! use futures_lite::StreamExt;
//! use std::future::Future;
//!
//! /// Drops every item whose name does not end in `.css`.
//! struct OnlyCss;
//!
//! impl Stage for OnlyCss {
//!     fn execute(
//!         self,
//!         ctx: Context,
//!         mut input: ItemStream,
//!         mut output: ItemSender,
//!     ) -> impl Future<Output = Result<()>> + Send + 'static {
//!         async move {
//!             while let Some(item) = stage::recv(&ctx, &mut input).await? {
//!                 if item.name().ends_with(".css") {
//!                     stage::send(&ctx, &mut output, item).await?;
//!                 } else {
//!                     item.release();
//!                 }
//!             }
//!             Ok(())
//!         }
//!     }
//! }
//!
//! block_on(async {
//!     let ctx = Context::background();
//!     let items = vec![
//!         Item::from_bytes(Descriptor::new("a.css"), ""),
//!         Item::from_bytes(Descriptor::new("b.js"), ""),
//!     ];
//!     let mut css = Pipe::from_items(ctx, items).pipe(OnlyCss);
//!     let item = css.next().await.unwrap();
//!     assert_eq!(item.name(), "a.css");
//!     item.release();
//!     assert!(css.next().await.is_none());
//! })
//! ```

use core::future::Future;
use core::pin::Pin;
use core::task::Poll;

use futures_lite::future;

use crate::{Context, Error, Item, ItemSender, ItemStream, Result};

mod concat;
mod inspect;
mod run;
mod transform;

pub use concat::Concatenator;
pub use inspect::{Checkpoint, Inspector};
pub use run::Staged;
pub use transform::Transformer;

/// An operation from one item stream to another.
///
/// A stage is a stateless value, executed once per invocation. It returns
/// `Ok(())` when its input is exhausted and its output has been handed off,
/// or an error: its context's cause once the context is done, or the failure
/// that aborted it.
pub trait Stage: Send + 'static {
    /// Runs the stage until `input` closes, `ctx` is done, or it fails.
    fn execute(
        self,
        ctx: Context,
        input: ItemStream,
        output: ItemSender,
    ) -> impl Future<Output = Result<()>> + Send + 'static;
}

fn cancelled(ctx: &Context) -> Error {
    ctx.cause().unwrap_or(Error::Canceled)
}

/// Waits for the next input item.
///
/// Returns `Ok(None)` once `input` is closed, or the context's cause once it
/// is done. When both are ready, cancellation wins.
pub async fn recv(ctx: &Context, input: &mut ItemStream) -> Result<Option<Item>> {
    let mut done = ctx.done();
    future::poll_fn(|cx| {
        if Pin::new(&mut done).poll(cx).is_ready() {
            return Poll::Ready(Err(cancelled(ctx)));
        }
        input.as_mut().poll_next(cx).map(Ok)
    })
    .await
}

/// Hands `item` off to `output`, waiting until there is room for it.
///
/// If the context is done first, or the consumer is gone, the item is
/// released and an error is returned instead.
pub async fn send(ctx: &Context, output: &mut ItemSender, item: Item) -> Result<()> {
    // The closure must not borrow `item`: `Item` is not `Sync`, and stage
    // futures have to be `Send`.
    let mut done = ctx.done();
    let ready = future::poll_fn(|cx| {
        if Pin::new(&mut done).poll(cx).is_ready() {
            return Poll::Ready(Err(Some(cancelled(ctx))));
        }
        output.poll_ready(cx).map_err(|_| None)
    })
    .await;

    if let Err(err) = ready {
        let err = err.unwrap_or_else(|| Error::OutputClosed {
            name: item.name().to_owned(),
        });
        item.release();
        return Err(err);
    }
    output.try_send(item).map_err(|err| {
        let item = err.into_inner();
        let name = item.name().to_owned();
        item.release();
        Error::OutputClosed { name }
    })
}
