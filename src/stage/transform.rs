use core::fmt;
use core::future::Future;

use super::{recv, send, Stage};
use crate::{Context, Item, ItemSender, ItemStream, Result};

/// Passes every item through a function and forwards the result.
///
/// Items are forwarded in arrival order, one at a time.
pub struct Transformer<F> {
    map: F,
}

impl<F> Transformer<F>
where
    F: Fn(Item) -> Item + Send + Sync + 'static,
{
    /// Creates a transformer applying `map` to each item.
    pub fn new(map: F) -> Self {
        Self { map }
    }
}

impl<F> fmt::Debug for Transformer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer").finish_non_exhaustive()
    }
}

impl<F> Stage for Transformer<F>
where
    F: Fn(Item) -> Item + Send + Sync + 'static,
{
    fn execute(
        self,
        ctx: Context,
        mut input: ItemStream,
        mut output: ItemSender,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        async move {
            while let Some(item) = recv(&ctx, &mut input).await? {
                send(&ctx, &mut output, (self.map)(item)).await?;
            }
            Ok(())
        }
    }
}
