//! Server error types.

use std::path::PathBuf;

use gridwar_core::error::GameError;
use thiserror::Error;

/// Result type alias using [`ServerError`].
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that stop the server or one of its setup steps.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to read or write a file.
    #[error("Failed to access file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The simulation rejected data or state.
    #[error(transparent)]
    Game(#[from] GameError),

    /// Every receiver of the inbox is gone.
    #[error("Inbox closed")]
    InboxClosed,
}
