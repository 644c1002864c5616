//! Cancellable fan-in combinators and stage execution for async item
//! pipelines.
//!
//! A pipeline moves [`Item`]s, readable payloads with a [`Descriptor`],
//! through a chain of [`Stage`][stage::Stage]s. Every producer is a [`Pipe`]:
//! a stream of items bound to the [`Context`] it runs under. Contexts form a
//! cancellation tree, so cancelling one part of a pipeline stops everything
//! downstream of it while leaving its ancestors running.
//!
//! Like the combinators in `futures-concurrency`, everything here is a
//! `Stream` driven by whoever polls it. No executor is required and no task
//! is spawned.
//!
//! # Operations
//!
//! - [`Pipe::pipe`]: Runs a stage over a pipe and returns a pipe over its output.
//! - [`stream::merge`]: Combines multiple pipes into one, interleaving their items.
//! - [`stream::queue`]: Combines multiple pipes into one, draining them in order.
//! - [`Context::with_first_settler`]: Derives a context cancelled by whichever of a group settles first.
//!
//! # Examples
//!
//! Bundle the output of two producers into a single item:
//!
//! ```rust
//! use pipe_concurrency::stage::Concatenator;
//! use pipe_concurrency::{stream, Context, Descriptor, Item, Pipe};
//! use futures_lite::future::block_on;
//! use futures_lite::prelude::*;
//!
//! block_on(async {
//!     let ctx = Context::background();
//!     let vendor = Pipe::from_items(ctx.clone(), vec![
//!         Item::from_bytes(Descriptor::new("reset.css"), "*{}"),
//!     ]);
//!     let app = Pipe::from_items(ctx.clone(), vec![
//!         Item::from_bytes(Descriptor::new("app.css"), "body{}"),
//!     ]);
//!
//!     let mut bundle = stream::queue(vendor, [app]).pipe(Concatenator::new("all.css"));
//!
//!     let mut item = bundle.next().await.unwrap();
//!     let mut css = String::new();
//!     item.read_to_string(&mut css).await.unwrap();
//!     assert_eq!(css, "*{}\nbody{}\n");
//!     item.release();
//! })
//! ```

#![deny(missing_debug_implementations, nonstandard_style)]
#![warn(missing_docs, unreachable_pub)]

mod context;
mod error;
mod item;
mod pipe;
mod utils;

pub mod stage;
pub mod stream;

pub use context::{CancelGuard, Canceller, Context, Done};
pub use error::{Error, Result};
pub use item::{Descriptor, Item, Payload};
pub use pipe::{ItemSender, ItemStream, Pipe};
