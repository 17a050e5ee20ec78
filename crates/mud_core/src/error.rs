//! Error types for the combat core.

use thiserror::Error;

use crate::ids::{CharId, ObjId, RoomId};
use crate::position::Position;

/// Result type alias using [`CombatError`].
pub type Result<T> = std::result::Result<T, CombatError>;

/// Top-level error type for combat core errors.
///
/// Refusals a player should see ("They aren't here.") are not errors; they
/// come back as [`crate::commands::CommandOutcome::Rejected`].
#[derive(Debug, Error)]
pub enum CombatError {
    /// Character reference does not resolve.
    #[error("Character not found: {0}")]
    CharacterNotFound(CharId),

    /// Object reference does not resolve.
    #[error("Object not found: {0}")]
    ObjectNotFound(ObjId),

    /// Room reference does not resolve.
    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    /// A posture change that only the vitality rules may perform.
    #[error("Invalid posture change from {from:?} to {to:?}")]
    InvalidPosture {
        /// Current position.
        from: Position,
        /// Requested position.
        to: Position,
    },

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Invalid engine state.
    #[error("Invalid combat state: {0}")]
    InvalidState(String),
}
