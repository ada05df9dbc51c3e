//! Deterministic chunk ids.
//!
//! The same logical unit always maps to the same id across edits:
//! `book`, `act:<key>`, `chapter:<key>`, `scene:<chapter key>:<index>`.

use crate::types::ChunkLevel;

/// Id of the book root
pub const BOOK_ID: &str = "book";

const ACT_PREFIX: &str = "act:";
const CHAPTER_PREFIX: &str = "chapter:";
const SCENE_PREFIX: &str = "scene:";

#[must_use]
pub fn act_chunk_id(act_key: &str) -> String {
    format!("{ACT_PREFIX}{act_key}")
}

#[must_use]
pub fn chapter_chunk_id(chapter_key: &str) -> String {
    format!("{CHAPTER_PREFIX}{chapter_key}")
}

#[must_use]
pub fn scene_chunk_id(chapter_key: &str, index: usize) -> String {
    format!("{SCENE_PREFIX}{chapter_key}:{index}")
}

/// Derive the id for `(level, key, index)`; `index` only matters for scenes
#[must_use]
pub fn chunk_id(level: ChunkLevel, key: &str, index: usize) -> String {
    match level {
        ChunkLevel::Book => BOOK_ID.to_string(),
        ChunkLevel::Act => act_chunk_id(key),
        ChunkLevel::Chapter => chapter_chunk_id(key),
        ChunkLevel::Scene => scene_chunk_id(key, index),
    }
}

/// Parsed form of a chunk id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChunkId {
    pub level: ChunkLevel,
    /// Act key, chapter key, or empty for the book
    pub key: String,
    pub index: Option<usize>,
}

/// Inverse of [`chunk_id`]. Keys may contain `:`; the scene index is the last segment.
#[must_use]
pub fn parse_chunk_id(id: &str) -> Option<ParsedChunkId> {
    if id == BOOK_ID {
        return Some(ParsedChunkId {
            level: ChunkLevel::Book,
            key: String::new(),
            index: None,
        });
    }
    if let Some(key) = id.strip_prefix(ACT_PREFIX) {
        return (!key.is_empty()).then(|| ParsedChunkId {
            level: ChunkLevel::Act,
            key: key.to_string(),
            index: None,
        });
    }
    if let Some(key) = id.strip_prefix(CHAPTER_PREFIX) {
        return (!key.is_empty()).then(|| ParsedChunkId {
            level: ChunkLevel::Chapter,
            key: key.to_string(),
            index: None,
        });
    }
    let tail = id.strip_prefix(SCENE_PREFIX)?;
    let (key, index) = tail.rsplit_once(':')?;
    let index = index.parse::<usize>().ok()?;
    if key.is_empty() {
        return None;
    }
    Some(ParsedChunkId {
        level: ChunkLevel::Scene,
        key: key.to_string(),
        index: Some(index),
    })
}

/// Chapter key owning a chapter or scene id
#[must_use]
pub fn chapter_key_of(id: &str) -> Option<String> {
    let parsed = parse_chunk_id(id)?;
    matches!(parsed.level, ChunkLevel::Chapter | ChunkLevel::Scene).then_some(parsed.key)
}
