use crate::error::Result;
use crate::intelligence::ManuscriptIntelligence;
use crate::scenes::split_scenes;
use async_trait::async_trait;
use chunkcache_index::TextRange;

/// External analysis capability consumed by the engine.
///
/// `analyze` is the only suspension point in the engine and may be called
/// for several sibling scenes at once.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze one leaf chunk of text
    async fn analyze(&self, text: &str) -> Result<ManuscriptIntelligence>;

    /// Scene boundaries inside a chapter. Must partition `text`.
    fn scene_boundaries(&self, text: &str) -> Vec<TextRange> {
        split_scenes(text)
    }
}
