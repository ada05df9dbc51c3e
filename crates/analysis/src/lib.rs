//! # Chunk Analysis
//!
//! The analysis boundary of the cache: the [`Analyzer`] capability the engine
//! calls for leaf chunks, the rich record it returns, and the pure functions
//! that turn those records into compact, mergeable [`ChunkAnalysis`] values.
//!
//! ```text
//! scene text ──> Analyzer::analyze ──> ManuscriptIntelligence
//!                                          │
//!                     intelligence_to_chunk_analysis
//!                                          │
//!                                          v
//!   scene ChunkAnalysis ──┐
//!   scene ChunkAnalysis ──┼──> aggregate ──> chapter ChunkAnalysis ──> ... ──> book
//!   scene ChunkAnalysis ──┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chunkcache_analysis::{aggregate, ChunkAnalysis};
//!
//! let a = ChunkAnalysis { word_count: 100, ..Default::default() };
//! let b = ChunkAnalysis { word_count: 50, ..Default::default() };
//! let parent = aggregate(&[&a, &b]);
//!
//! assert_eq!(parent.word_count, 150);
//! assert!(parent.summary.contains("150 words"));
//! ```

mod aggregate;
mod analyzer;
mod convert;
mod error;
mod heuristic;
mod intelligence;
mod scenes;

pub use aggregate::{aggregate, aggregate_owned, no_data, NO_DATA_SUMMARY};
pub use analyzer::Analyzer;
pub use chunkcache_index::ChunkAnalysis;
pub use convert::intelligence_to_chunk_analysis;
pub use error::{AnalyzerError, Result};
pub use heuristic::HeuristicAnalyzer;
pub use intelligence::{
    AttentionHeatmap, EntityGraph, EntityKind, EntityNode, HeatmapSection,
    ManuscriptIntelligence, PlotPromise, SceneInfo, StructuralFingerprint, StructuralStats,
    StyleFingerprint, Timeline,
};
pub use scenes::split_scenes;
