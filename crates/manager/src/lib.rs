//! # Chunk Manager
//!
//! Orchestrates the incremental analysis cache: edits come in, the affected
//! scenes and their ancestors go dirty, and a background scheduler hands
//! dirty scenes to the [`Analyzer`](chunkcache_analysis::Analyzer) before
//! rolling fresh results up the hierarchy.
//!
//! ```text
//! handle_edit ──> sync chapter ──> dirty scenes + ancestors
//!                                        │
//!          debounce │ idle │ tick │ process_all_dirty
//!                                        v
//!              claim dirty scenes (focus first, bounded)
//!                                        │
//!                     Analyzer::analyze (concurrently)
//!                                        │
//!            fresh/error ──> aggregate parents bottom-up ──> events
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use chunkcache_analysis::HeuristicAnalyzer;
//! use chunkcache_manager::{ChunkManager, ManagerConfig};
//! use std::sync::Arc;
//!
//! # async fn run() -> chunkcache_manager::Result<()> {
//! let manager = ChunkManager::new(Arc::new(HeuristicAnalyzer::new()), ManagerConfig::default())?;
//! manager.register_chapter("ch1", "It rained.\n***\nThen it stopped.\n")?;
//! manager.process_all_dirty().await?;
//!
//! let summary = manager.get_book_summary();
//! println!("{}", summary.summary);
//! # Ok(())
//! # }
//! ```

mod config;
mod edit;
mod engine;
mod error;
mod events;
mod manager;
mod scheduler;
mod stats;

pub use config::ManagerConfig;
pub use edit::{EditDelta, EditOutcome};
pub use engine::BatchReport;
pub use error::{ManagerError, Result};
pub use events::ChunkEvent;
pub use manager::ChunkManager;
pub use stats::{LevelCounts, ManagerStats};

pub use chunkcache_index::{Chunk, ChunkAnalysis, ChunkLevel, ChunkState, CursorHit};
