//! The unit of data flowing through a pipeline.

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::io;
use std::path::PathBuf;

use futures_lite::io::{AsyncRead, Cursor};

/// The readable resource carried by an [`Item`].
pub type Payload = Box<dyn AsyncRead + Send + Unpin>;

/// Name, location and size of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// File name, without directories. Empty for unnamed items.
    pub name: String,
    /// Directory the item lives in, relative to the pipeline root.
    pub parent_path: String,
    /// Payload size in bytes.
    pub size: u64,
}

impl Descriptor {
    /// Creates a descriptor with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the directory the item lives in.
    pub fn with_parent_path(mut self, parent_path: impl Into<String>) -> Self {
        self.parent_path = parent_path.into();
        self
    }

    /// Sets the size of the payload in bytes.
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// The item's path, or `None` if the item has no name.
    pub fn path(&self) -> Option<PathBuf> {
        if self.name.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.parent_path).join(&self.name))
    }
}

/// A payload together with its [`Descriptor`].
///
/// An item has exactly one owner at a time. The owner either hands it on to
/// the next stage or calls [`Item::release`] once it has consumed the payload.
/// Dropping an item without releasing it is reported as a leak.
pub struct Item {
    payload: Payload,
    descriptor: Descriptor,
    released: bool,
}

impl Item {
    /// Creates a new item.
    pub fn new(payload: Payload, descriptor: Descriptor) -> Self {
        Self {
            payload,
            descriptor,
            released: false,
        }
    }

    /// Creates an item backed by an in-memory buffer.
    pub fn from_bytes(descriptor: Descriptor, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Box::new(Cursor::new(bytes.into())), descriptor)
    }

    /// Access the descriptor.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Mutably access the descriptor.
    pub fn descriptor_mut(&mut self) -> &mut Descriptor {
        &mut self.descriptor
    }

    /// Shorthand for `descriptor().name`.
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Closes the payload. The item is consumed, so it can only be released once.
    pub fn release(mut self) {
        self.released = true;
        tracing::trace!(name = %self.descriptor.name, "item released");
    }
}

impl AsyncRead for Item {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.payload).poll_read(cx, buf)
    }
}

impl Drop for Item {
    fn drop(&mut self) {
        if !self.released {
            tracing::debug!(
                name = %self.descriptor.name,
                parent_path = %self.descriptor.parent_path,
                "item dropped without being released"
            );
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("descriptor", &self.descriptor)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
