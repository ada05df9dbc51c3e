use chunkcache_index::{ChunkIndex, ChunkLevel, ChunkState};
use serde::{Deserialize, Serialize};

/// Chunk counts per hierarchy level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    pub scene: usize,
    pub chapter: usize,
    pub act: usize,
    pub book: usize,
}

/// Point-in-time snapshot of the cache.
///
/// Always this shape; zero-filled before anything is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerStats {
    pub total_chunks: usize,
    pub dirty_count: usize,
    pub fresh_count: usize,
    pub processing_count: usize,
    pub error_count: usize,
    pub by_level: LevelCounts,
    pub is_processing: bool,
    pub chapter_count: usize,
}

impl ManagerStats {
    pub(crate) fn collect(index: &ChunkIndex, is_processing: bool) -> Self {
        let mut stats = Self {
            is_processing,
            ..Self::default()
        };
        for chunk in index.iter() {
            stats.total_chunks += 1;
            match chunk.state {
                ChunkState::Fresh => stats.fresh_count += 1,
                ChunkState::Dirty => stats.dirty_count += 1,
                ChunkState::Processing => stats.processing_count += 1,
                ChunkState::Error => stats.error_count += 1,
            }
            match chunk.level {
                ChunkLevel::Scene => stats.by_level.scene += 1,
                ChunkLevel::Chapter => stats.by_level.chapter += 1,
                ChunkLevel::Act => stats.by_level.act += 1,
                ChunkLevel::Book => stats.by_level.book += 1,
            }
        }
        stats.chapter_count = stats.by_level.chapter;
        stats
    }
}
