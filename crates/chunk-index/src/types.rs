use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Level of a chunk in the book hierarchy.
///
/// Ordering follows depth: `Book < Act < Chapter < Scene`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkLevel {
    /// Whole manuscript (the single root)
    Book,
    /// Optional grouping of chapters
    Act,
    /// A chapter, indexing its own full text
    Chapter,
    /// A scene, indexing a slice of its chapter's text
    Scene,
}

impl ChunkLevel {
    /// All levels, root first
    pub const ALL: [Self; 4] = [Self::Book, Self::Act, Self::Chapter, Self::Scene];

    /// Depth below the root (book = 0)
    #[must_use]
    pub const fn depth(self) -> u8 {
        match self {
            Self::Book => 0,
            Self::Act => 1,
            Self::Chapter => 2,
            Self::Scene => 3,
        }
    }

    /// Only scenes are ever sent to the analyzer
    #[must_use]
    pub const fn is_leaf_level(self) -> bool {
        matches!(self, Self::Scene)
    }

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Act => "act",
            Self::Chapter => "chapter",
            Self::Scene => "scene",
        }
    }
}

impl fmt::Display for ChunkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing state of a chunk.
///
/// ```text
/// fresh ──> dirty ──> processing ──> fresh
///             ^                 └──> error ──┐
///             └──────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkState {
    Fresh,
    Dirty,
    Processing,
    Error,
}

impl ChunkState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Dirty => "dirty",
            Self::Processing => "processing",
            Self::Error => "error",
        }
    }

    /// Whether cached analysis may be shown without a stale marker
    #[must_use]
    pub const fn is_authoritative(self) -> bool {
        matches!(self, Self::Fresh)
    }
}

impl fmt::Display for ChunkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Half-open byte range `[start, end)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in bytes (0 for inverted ranges)
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// `start <= offset < end`
    #[must_use]
    pub const fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Overlap test that also treats an empty range as touching the
    /// range containing its position (a pure deletion point).
    #[must_use]
    pub const fn touches(&self, other: &Self) -> bool {
        if other.is_empty() {
            return self.contains(other.start) || (self.end == other.start && self.start < self.end);
        }
        self.start < other.end && other.start < self.end
    }

    /// Slice `text` by this range, `None` when out of bounds or not on char boundaries
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.start > self.end || self.end > text.len() {
            return None;
        }
        text.get(self.start..self.end)
    }
}

/// Compact, mergeable analysis record for one chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    pub summary: String,
    pub word_count: usize,
    /// Share of words spoken in dialogue, `0.0..=1.0`
    pub dialogue_ratio: f64,
    /// Mean scene tension, `0.0..=1.0`
    pub avg_tension: f64,
    #[serde(default)]
    pub character_names: BTreeSet<String>,
    #[serde(default)]
    pub location_names: BTreeSet<String>,
    #[serde(default)]
    pub time_markers: BTreeSet<String>,
    #[serde(default)]
    pub open_promises: BTreeSet<String>,
    /// Style warnings, deduplicated, in the order they were first raised
    #[serde(default)]
    pub style_flags: Vec<String>,
    /// Mean heatmap risk, `0.0..=1.0`
    pub risk_score: f64,

    // Opaque source payloads carried along for consumers; never merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entities: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<serde_json::Value>,

    /// Monotonic stamp assigned by the index when the record is stored
    #[serde(default)]
    pub processed_at_ms: u64,
}

/// A node in the book → act → chapter → scene hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub level: ChunkLevel,
    pub range: TextRange,
    /// Owning chunk; `None` only for the book root
    pub parent_id: Option<String>,
    pub state: ChunkState,
    /// Last successful analysis, kept while dirty/processing/error
    pub analysis: Option<ChunkAnalysis>,
    /// Present only in `error` state
    pub error_message: Option<String>,

    #[serde(skip)]
    pub(crate) fingerprint: String,
    /// Marked dirty while processing; the landing result is already stale
    #[serde(skip)]
    pub(crate) redirty: bool,
    /// Ticket of the in-flight claim, if any
    #[serde(skip)]
    pub(crate) ticket: Option<u64>,
}

impl Chunk {
    pub(crate) fn new(
        id: String,
        level: ChunkLevel,
        range: TextRange,
        parent_id: Option<String>,
        fingerprint: String,
    ) -> Self {
        Self {
            id,
            level,
            range,
            parent_id,
            state: ChunkState::Dirty,
            analysis: None,
            error_message: None,
            fingerprint,
            redirty: false,
            ticket: None,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// When the current analysis was stored, if ever
    #[must_use]
    pub fn processed_at_ms(&self) -> Option<u64> {
        self.analysis.as_ref().map(|a| a.processed_at_ms)
    }
}
