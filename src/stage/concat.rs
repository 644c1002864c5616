use core::future::Future;

use futures_lite::AsyncReadExt;

use super::{recv, send, Stage};
use crate::{Context, Descriptor, Error, Item, ItemSender, ItemStream, Result};

/// Concatenates every input item into one output item called `name`.
///
/// Each payload is followed by a separator byte (`\n` unless configured
/// otherwise), and the output size is the number of bytes read plus one per
/// item. Inputs are released as they are consumed. The single output item is
/// sent once the input is exhausted; if any read fails, the stage stops with
/// that error and sends nothing.
#[derive(Debug, Clone)]
pub struct Concatenator {
    name: String,
    separator: u8,
}

impl Concatenator {
    /// Creates a concatenator producing an item named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            separator: b'\n',
        }
    }

    /// Sets the byte written after each payload.
    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }
}

impl Stage for Concatenator {
    fn execute(
        self,
        ctx: Context,
        mut input: ItemStream,
        mut output: ItemSender,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        async move {
            let mut bundle = Vec::new();
            let mut size = 0u64;

            while let Some(mut item) = recv(&ctx, &mut input).await? {
                let path = item.descriptor().path().unwrap_or_default();
                ctx.info(format!("adding {} to {}", path.display(), self.name));

                let read = match item.read_to_end(&mut bundle).await {
                    Ok(read) => read,
                    Err(err) => {
                        let err = Error::read(item.name(), err);
                        item.release();
                        return Err(err);
                    }
                };
                bundle.push(self.separator);
                size += read as u64 + 1;
                item.release();
            }

            let descriptor = Descriptor::new(self.name).with_size(size);
            send(&ctx, &mut output, Item::from_bytes(descriptor, bundle)).await
        }
    }
}
