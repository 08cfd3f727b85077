//! Error types for the game simulation.
//!
//! These cover the fallible API surfaces around the tick: store mutation,
//! data loading, message decoding and snapshots. Individual player commands
//! never produce a [`GameError`]; they are rejected with a
//! [`Rejection`](crate::commands::Rejection) instead.

use thiserror::Error;

use crate::components::EntityId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// An inbound message could not be decoded.
    #[error("Failed to decode inbound message: {0}")]
    MessageDecode(String),

    /// A map layout was rejected.
    #[error("Invalid map: {0}")]
    InvalidMap(String),

    /// Snapshot or replay (de)serialization failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Replay file was written by an incompatible format version.
    #[error("Replay version mismatch: expected {expected}, got {found}")]
    ReplayVersionMismatch {
        /// Version this build understands.
        expected: u32,
        /// Version found in the file.
        found: u32,
    },

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),
}
