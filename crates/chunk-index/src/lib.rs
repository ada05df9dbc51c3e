//! # Chunk Index
//!
//! Tree-and-lookup store for the incremental manuscript analysis cache.
//!
//! ## Hierarchy
//!
//! ```text
//! book
//!  ├── act:<key>            (optional)
//!  │    └── chapter:<key>
//!  └── chapter:<key>        full chapter text, [0, len)
//!       ├── scene:<key>:0   slice of the chapter text
//!       └── scene:<key>:1
//! ```
//!
//! Chunks live in a flat arena keyed by id; parents hold child ids only.
//! The index knows nothing about scheduling: it stores records, walks the
//! tree and applies state transitions.
//!
//! ## Example
//!
//! ```rust
//! use chunkcache_index::{ChunkIndex, ChunkLevel, BOOK_ID};
//!
//! let mut index = ChunkIndex::new();
//! index
//!     .register_chunk("chapter:ch3", ChunkLevel::Chapter, 0, 10, "abcdefghij", Some(BOOK_ID))
//!     .unwrap();
//! let scene = index
//!     .register_chunk("scene:ch3:0", ChunkLevel::Scene, 2, 6, "", Some("chapter:ch3"))
//!     .unwrap()
//!     .clone();
//!
//! assert_eq!(index.get_chunk_text(&scene), Some("cdef"));
//! ```

mod cursor;
mod error;
mod id;
mod index;
mod types;

pub use cursor::{resolve_cursor, CursorHit};
pub use error::{IndexError, Result};
pub use id::{
    act_chunk_id, chapter_chunk_id, chapter_key_of, chunk_id, parse_chunk_id, scene_chunk_id,
    ParsedChunkId, BOOK_ID,
};
pub use index::{ChunkIndex, RegisterOutcome};
pub use types::{Chunk, ChunkAnalysis, ChunkLevel, ChunkState, TextRange};
