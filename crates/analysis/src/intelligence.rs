//! Rich analysis record produced by an analyzer for one piece of text.
//!
//! The engine never interprets most of this; it only reads the handful of
//! fields needed to build a compact [`ChunkAnalysis`](chunkcache_index::ChunkAnalysis).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManuscriptIntelligence {
    pub structural: StructuralFingerprint,
    pub entities: EntityGraph,
    pub timeline: Timeline,
    pub style: StyleFingerprint,
    pub heatmap: AttentionHeatmap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralFingerprint {
    pub stats: StructuralStats,
    pub scenes: Vec<SceneInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralStats {
    pub word_count: usize,
    pub sentence_count: usize,
    /// `0.0..=1.0`
    pub dialogue_ratio: f64,
    /// Mean words per sentence
    pub avg_sentence_length: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneInfo {
    /// `0.0..=1.0`
    pub tension: f64,
    pub time_marker: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityGraph {
    pub nodes: Vec<EntityNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub mentions: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Location,
    Object,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeline {
    pub promises: Vec<PlotPromise>,
}

/// A setup the text raises and may or may not pay off
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPromise {
    pub description: String,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleFingerprint {
    pub passive_voice_ratio: f64,
    pub adverb_density: f64,
    pub filter_word_density: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionHeatmap {
    pub sections: Vec<HeatmapSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapSection {
    pub offset: usize,
    /// `0.0..=1.0`
    pub overall_risk: f64,
}
