use crate::config::ManagerConfig;
use crate::edit::EditOutcome;
use crate::engine::{BatchReport, Engine, Trigger};
use crate::error::{ManagerError, Result};
use crate::events::ChunkEvent;
use crate::scheduler::{spawn_scheduler, SchedulerCommand};
use crate::stats::ManagerStats;
use chunkcache_analysis::Analyzer;
use chunkcache_index::{chapter_chunk_id, Chunk, ChunkAnalysis, CursorHit};
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Incremental analysis cache over one manuscript.
///
/// Cheap to clone; clones share the same index and scheduler. The background
/// scheduler stops when the last clone is dropped or [`destroy`](Self::destroy)
/// is called.
#[derive(Clone)]
pub struct ChunkManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    engine: Arc<Engine>,
    command_tx: mpsc::UnboundedSender<SchedulerCommand>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
    config: ManagerConfig,
    paused: AtomicBool,
}

impl ManagerInner {
    fn stop_scheduler(&self) {
        let _ = self.command_tx.send(SchedulerCommand::Shutdown);
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        self.stop_scheduler();
    }
}

impl ChunkManager {
    /// Validate `config` and start the background scheduler.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(analyzer: Arc<dyn Analyzer>, config: ManagerConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| ManagerError::Runtime(e.to_string()))?;

        let engine = Arc::new(Engine::new(analyzer, config.max_concurrent_analyses));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let handle = spawn_scheduler(Arc::clone(&engine), config, command_rx);
        debug!(
            "Chunk manager started (debounce {}ms, tick {}ms, idle {}ms)",
            config.edit_debounce_ms, config.processing_interval_ms, config.idle_threshold_ms
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                engine,
                command_tx,
                scheduler: Mutex::new(Some(handle)),
                config,
                paused: AtomicBool::new(false),
            }),
        })
    }

    pub fn with_defaults(analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        Self::new(analyzer, ManagerConfig::default())
    }

    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    fn notify(&self, command: SchedulerCommand) {
        let _ = self.inner.command_tx.send(command);
    }

    // ---- edits ----

    /// Create or update a top-level chapter and (re)split it into scenes.
    ///
    /// Returns the ids that became dirty; counts as an edit for scheduling.
    pub fn register_chapter(&self, chapter_key: &str, text: &str) -> Result<Vec<String>> {
        let dirtied = self.engine().register_chapter(None, chapter_key, text)?;
        self.notify(SchedulerCommand::EditObserved);
        Ok(dirtied)
    }

    /// Like [`register_chapter`](Self::register_chapter) but under an act,
    /// creating the act on first use.
    pub fn register_chapter_in_act(
        &self,
        act_key: &str,
        chapter_key: &str,
        text: &str,
    ) -> Result<Vec<String>> {
        let dirtied = self
            .engine()
            .register_chapter(Some(act_key), chapter_key, text)?;
        self.notify(SchedulerCommand::EditObserved);
        Ok(dirtied)
    }

    /// Drop a chapter and its scenes. Returns `false` if it was not registered.
    pub fn remove_chapter(&self, chapter_key: &str) -> Result<bool> {
        let removed = self.engine().remove_chapter(chapter_key)?;
        if removed {
            self.notify(SchedulerCommand::EditObserved);
        }
        Ok(removed)
    }

    /// Apply a new full chapter text.
    ///
    /// Byte-identical text is a no-op: nothing is dirtied and the debounce
    /// window is not restarted.
    pub fn handle_edit(
        &self,
        chapter_key: &str,
        text: &str,
        cursor_start: usize,
        cursor_end: usize,
    ) -> Result<EditOutcome> {
        let outcome = self
            .engine()
            .handle_edit(chapter_key, text, cursor_start, cursor_end)?;
        if outcome.applied {
            self.notify(SchedulerCommand::EditObserved);
        }
        Ok(outcome)
    }

    // ---- processing ----

    /// Analyze every dirty leaf now, bypassing the debounce
    pub async fn process_all_dirty(&self) -> Result<BatchReport> {
        if self.engine().is_destroyed() {
            return Err(ManagerError::Destroyed);
        }
        Ok(self.engine().process_dirty(Trigger::Manual, None).await)
    }

    /// Re-analyze `id` (or every scene below it) even if it is fresh
    pub async fn reprocess_chunk(&self, id: &str) -> Result<BatchReport> {
        self.engine().reprocess(id).await
    }

    /// Move every errored chunk back to dirty and return their ids.
    ///
    /// Does not start processing; the next trigger picks them up.
    pub fn retry_errors(&self) -> Result<Vec<String>> {
        self.engine().retry_errors()
    }

    /// Stop the tick and idle triggers. In-flight work finishes.
    pub fn pause(&self) {
        if !self.inner.paused.swap(true, Ordering::AcqRel) {
            info!("Chunk processing paused");
            self.notify(SchedulerCommand::Pause);
        }
    }

    pub fn resume(&self) {
        if self.inner.paused.swap(false, Ordering::AcqRel) {
            info!("Chunk processing resumed");
            self.notify(SchedulerCommand::Resume);
        }
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Empty the index. Subscribers stay subscribed.
    pub fn clear(&self) -> Result<()> {
        self.engine().clear()
    }

    /// Cancel all timers, drop all state and stop publishing events.
    ///
    /// Reads keep working and return empty defaults; mutations fail with
    /// [`ManagerError::Destroyed`].
    pub fn destroy(&self) {
        self.engine().destroy();
        self.inner.stop_scheduler();
        info!("Chunk manager destroyed");
    }

    // ---- reads ----

    #[must_use]
    pub fn get_chunk(&self, id: &str) -> Option<Chunk> {
        self.engine().get_chunk(id)
    }

    #[must_use]
    pub fn get_chapter_chunk(&self, chapter_key: &str) -> Option<Chunk> {
        self.engine().get_chunk(&chapter_chunk_id(chapter_key))
    }

    /// Children of `id` ordered by range start; empty for unknown ids
    #[must_use]
    pub fn get_children(&self, id: &str) -> Vec<Chunk> {
        self.engine().get_children(id)
    }

    /// Fresh analysis of `id`, or a rollup of its children's last-known analyses
    #[must_use]
    pub fn get_aggregate(&self, id: &str) -> Option<ChunkAnalysis> {
        self.engine().get_aggregate(id)
    }

    /// Whole-book rollup; the "No data" sentinel when nothing is known yet
    #[must_use]
    pub fn get_book_summary(&self) -> ChunkAnalysis {
        self.engine().book_summary()
    }

    /// Chapter key → last-known chapter analysis
    #[must_use]
    pub fn get_all_chapter_analyses(&self) -> BTreeMap<String, ChunkAnalysis> {
        self.engine().chapter_analyses()
    }

    /// Scene under `offset` (bytes into the chapter text) with its possibly
    /// stale analysis
    #[must_use]
    pub fn get_analysis_at_cursor(&self, chapter_key: &str, offset: usize) -> Option<CursorHit> {
        self.engine().analysis_at_cursor(chapter_key, offset)
    }

    #[must_use]
    pub fn get_stats(&self) -> ManagerStats {
        self.engine().stats()
    }

    /// Lifecycle events. Dropping the receiver never affects processing.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChunkEvent> {
        self.engine().subscribe()
    }
}

impl std::fmt::Debug for ChunkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkManager")
            .field("config", &self.inner.config)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}
