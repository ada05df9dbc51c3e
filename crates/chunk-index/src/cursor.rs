use crate::id::chapter_chunk_id;
use crate::index::ChunkIndex;
use crate::types::{Chunk, ChunkAnalysis, ChunkState, TextRange};
use serde::Serialize;

/// Scene found under a cursor, with its last-known analysis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CursorHit {
    pub chunk_id: String,
    pub range: TextRange,
    pub state: ChunkState,
    /// Possibly stale; check `state` before presenting it as current
    pub analysis: Option<ChunkAnalysis>,
}

impl CursorHit {
    #[must_use]
    pub fn is_stale(&self) -> bool {
        !self.state.is_authoritative()
    }
}

impl ChunkIndex {
    /// First child of the chapter (by range start) whose range holds `offset`
    #[must_use]
    pub fn scene_at(&self, chapter_key: &str, offset: usize) -> Option<&Chunk> {
        self.get_children(&chapter_chunk_id(chapter_key))
            .into_iter()
            .find(|chunk| chunk.range.contains(offset))
    }
}

/// Map a byte offset in a chapter to the scene containing it.
///
/// `None` when the chapter has no chunks yet or no scene covers the offset.
#[must_use]
pub fn resolve_cursor(index: &ChunkIndex, chapter_key: &str, offset: usize) -> Option<CursorHit> {
    let scene = index.scene_at(chapter_key, offset)?;
    Some(CursorHit {
        chunk_id: scene.id.clone(),
        range: scene.range,
        state: scene.state,
        analysis: scene.analysis.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::BOOK_ID;
    use crate::types::ChunkLevel;

    fn index_with_scenes() -> ChunkIndex {
        let text = "first scene. second scene.";
        let mut index = ChunkIndex::new();
        index
            .register_chunk("chapter:ch1", ChunkLevel::Chapter, 0, text.len(), text, Some(BOOK_ID))
            .unwrap();
        index
            .register_chunk("scene:ch1:0", ChunkLevel::Scene, 0, 13, "", Some("chapter:ch1"))
            .unwrap();
        index
            .register_chunk("scene:ch1:1", ChunkLevel::Scene, 13, text.len(), "", Some("chapter:ch1"))
            .unwrap();
        index
    }

    #[test]
    fn test_cursor_resolves_half_open_ranges() {
        let index = index_with_scenes();
        assert_eq!(
            resolve_cursor(&index, "ch1", 0).map(|h| h.chunk_id),
            Some("scene:ch1:0".to_string())
        );
        assert_eq!(
            resolve_cursor(&index, "ch1", 12).map(|h| h.chunk_id),
            Some("scene:ch1:0".to_string())
        );
        assert_eq!(
            resolve_cursor(&index, "ch1", 13).map(|h| h.chunk_id),
            Some("scene:ch1:1".to_string())
        );
        assert!(resolve_cursor(&index, "ch1", 500).is_none());
    }

    #[test]
    fn test_cursor_on_unknown_chapter_is_none() {
        let index = index_with_scenes();
        assert!(resolve_cursor(&index, "ch9", 0).is_none());
        assert!(resolve_cursor(&ChunkIndex::new(), "ch1", 0).is_none());
    }

    #[test]
    fn test_unprocessed_scene_reports_stale_without_analysis() {
        let index = index_with_scenes();
        let hit = resolve_cursor(&index, "ch1", 2).unwrap();
        assert_eq!(hit.state, ChunkState::Dirty);
        assert!(hit.is_stale());
        assert!(hit.analysis.is_none());
    }
}
