//! Fan-in combinators for pipes.
//!
//! Both combinators derive one shared output [`Context`][crate::Context]
//! which is linked to every source: whichever source's context is done first
//! cancels the shared context, and with it the combined stream. A source
//! counts as settled when its context is done, whether that happened because
//! it failed or because its producer cancelled it after finishing.
//!
//! | Name      | Output order                         | Closes when |
//! | ---       | ---                                  | ---         |
//! | [`merge`] | per-source order, sources interleave | every source is exhausted, or the shared context is done
//! | [`queue`] | concatenation of the sources         | the last source is exhausted, or the shared context is done
//!
//! Neither combinator buffers: an item is pulled from a source only when the
//! consumer asks for the next one.

mod merge;
mod queue;

pub use merge::{merge, Merge};
pub use queue::{queue, Queue};
