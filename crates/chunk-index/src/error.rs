use crate::types::{ChunkLevel, ChunkState};
use thiserror::Error;

/// Result type for chunk index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised by the chunk index.
///
/// These only ever signal programmer errors (bad ids, broken hierarchy);
/// per-chunk analysis failures are represented as chunk state instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// No chunk registered under this id
    #[error("Unknown chunk: {0}")]
    UnknownChunk(String),

    /// Parent id does not resolve to a registered chunk
    #[error("Unknown parent '{parent}' for chunk '{id}'")]
    UnknownParent { id: String, parent: String },

    /// Non-root chunk registered without a parent
    #[error("Chunk '{0}' needs a parent")]
    MissingParent(String),

    /// Parent is not strictly above the child in the hierarchy
    #[error("Chunk '{id}' ({child:?}) cannot be placed under a {parent:?} chunk")]
    InvalidHierarchy {
        id: String,
        child: ChunkLevel,
        parent: ChunkLevel,
    },

    /// Malformed chunk id
    #[error("Invalid chunk id: {0}")]
    InvalidId(String),

    /// Result carries a ticket from a claim that no longer owns the chunk
    #[error("Stale result for '{0}': chunk was re-registered or re-claimed")]
    StaleClaim(String),

    /// State change not allowed by the chunk state machine
    #[error("Invalid state transition for '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: ChunkState,
        to: ChunkState,
    },
}

impl IndexError {
    /// Create an unknown chunk error
    pub fn unknown(id: impl Into<String>) -> Self {
        Self::UnknownChunk(id.into())
    }

    pub(crate) fn transition(id: &str, from: ChunkState, to: ChunkState) -> Self {
        Self::InvalidTransition {
            id: id.to_string(),
            from,
            to,
        }
    }
}
