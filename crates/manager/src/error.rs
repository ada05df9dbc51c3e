use chunkcache_index::IndexError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ManagerError>;

/// Errors crossing the manager's public API.
///
/// Per-chunk analysis failures are never reported here; they show up as
/// chunk `error` state and a [`ChunkEvent::Error`](crate::ChunkEvent::Error).
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Unknown chunk: {0}")]
    UnknownChunk(String),

    #[error("Chunk manager has been destroyed")]
    Destroyed,

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),
}
