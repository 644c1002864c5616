//! Error types for stages and cancellation causes.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors produced while running a pipeline.
///
/// An `Error` doubles as the recorded cause of a [`Context`][crate::Context]:
/// it is cheap to clone so every descendant of a cancelled context can report
/// the same cause.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The context was cancelled without a more specific cause.
    #[error("context canceled")]
    Canceled,

    /// Reading an item's payload failed inside a stage.
    #[error("failed to read `{name}`: {source}")]
    Read {
        /// Name of the item being read.
        name: String,
        /// The underlying I/O failure.
        #[source]
        source: Arc<io::Error>,
    },

    /// The consumer of a stage's output went away before an item was handed off.
    #[error("output closed while forwarding `{name}`")]
    OutputClosed {
        /// Name of the item that could not be handed off.
        name: String,
    },
}

impl Error {
    /// Wraps a payload read failure for the item called `name`.
    pub fn read(name: impl Into<String>, source: io::Error) -> Self {
        Self::Read {
            name: name.into(),
            source: Arc::new(source),
        }
    }

    /// Returns `true` if this is a plain cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Result type for pipeline operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_error_reports_item_and_source() {
        let err = Error::read("a.css", io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert_eq!(err.to_string(), "failed to read `a.css`: disk gone");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_canceled());
    }
}
