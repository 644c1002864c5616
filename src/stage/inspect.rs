use core::future::Future;

use super::{recv, send, Stage};
use crate::{Context, Item, ItemSender, ItemStream, Result};

/// The checkpoint an [`Inspector`] attaches to its context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint(pub String);

/// Logs the descriptor of every item passing through, for debugging.
///
/// Items are forwarded unmodified and in order. The checkpoint is recorded
/// on the stage's context, both as a [`Checkpoint`] value and as a field of
/// the span the stage logs in.
#[derive(Debug, Clone)]
pub struct Inspector {
    checkpoint: String,
}

impl Inspector {
    /// Creates an inspector logging under `checkpoint`.
    pub fn new(checkpoint: impl Into<String>) -> Self {
        Self {
            checkpoint: checkpoint.into(),
        }
    }
}

impl Stage for Inspector {
    fn execute(
        self,
        ctx: Context,
        mut input: ItemStream,
        mut output: ItemSender,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        async move {
            let span = tracing::info_span!(
                parent: ctx.span(),
                "inspect",
                checkpoint = %self.checkpoint
            );
            let ctx = ctx
                .with_span(span)
                .with_value(Checkpoint(self.checkpoint));

            while let Some(item) = recv(&ctx, &mut input).await? {
                describe(&ctx, &item);
                send(&ctx, &mut output, item).await?;
            }
            Ok(())
        }
    }
}

/// Logs `item`'s descriptor under the closest [`Checkpoint`] in `ctx`.
fn describe(ctx: &Context, item: &Item) {
    let checkpoint = ctx.value::<Checkpoint>();
    let checkpoint = checkpoint.as_deref().map_or("-", |c| c.0.as_str());

    let descriptor = item.descriptor();
    match descriptor.path() {
        Some(path) => ctx.info(format_args!(
            "[{checkpoint}] {} ({} bytes)",
            path.display(),
            descriptor.size
        )),
        None => ctx.error(format_args!(
            "[{checkpoint}] can't describe item without a name"
        )),
    }
}
