use crate::edit::{EditDelta, EditOutcome};
use crate::error::{ManagerError, Result};
use crate::events::{ChunkEvent, EventBus};
use crate::stats::ManagerStats;
use chunkcache_analysis::{aggregate, intelligence_to_chunk_analysis, no_data, Analyzer};
use chunkcache_index::{
    act_chunk_id, chapter_chunk_id, parse_chunk_id, resolve_cursor, scene_chunk_id, Chunk,
    ChunkAnalysis, ChunkIndex, ChunkLevel, ChunkState, CursorHit, TextRange, BOOK_ID,
};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;

/// What started a processing batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Debounce,
    Idle,
    Tick,
    Manual,
}

impl Trigger {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Debounce => "debounce",
            Self::Idle => "idle",
            Self::Tick => "tick",
            Self::Manual => "manual",
        }
    }
}

/// Outcome of one processing batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Leaves that received a fresh analysis
    pub processed: usize,
    /// Leaves that ended in `error`
    pub failed: usize,
}

impl BatchReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.processed == 0 && self.failed == 0
    }
}

/// A leaf claimed for analysis. `text` is `None` when the range no longer
/// resolves against its chapter.
struct Claim {
    id: String,
    ticket: u64,
    text: Option<String>,
}

struct EngineState {
    index: ChunkIndex,
    active_batches: usize,
    /// Bumped by `clear`/`destroy`; results from an older epoch are dropped
    epoch: u64,
    focus: Option<String>,
    last_dirty_count: usize,
    destroyed: bool,
}

/// Shared core behind [`ChunkManager`](crate::ChunkManager) and its scheduler.
///
/// All index mutation happens under one mutex that is never held across an
/// analyzer call; the `processing` state is the per-chunk in-flight guard.
pub(crate) struct Engine {
    state: Mutex<EngineState>,
    analyzer: Arc<dyn Analyzer>,
    events: EventBus,
    max_concurrent: usize,
}

impl Engine {
    pub(crate) fn new(analyzer: Arc<dyn Analyzer>, max_concurrent: usize) -> Self {
        Self {
            state: Mutex::new(EngineState {
                index: ChunkIndex::new(),
                active_batches: 0,
                epoch: 0,
                focus: None,
                last_dirty_count: 0,
                destroyed: false,
            }),
            analyzer,
            events: EventBus::new(),
            max_concurrent: max_concurrent.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_live(&self) -> Result<MutexGuard<'_, EngineState>> {
        let state = self.lock();
        if state.destroyed {
            return Err(ManagerError::Destroyed);
        }
        Ok(state)
    }

    pub(crate) fn subscribe(&self) -> tokio::sync::broadcast::Receiver<ChunkEvent> {
        self.events.subscribe()
    }

    // ---- mutations ----

    /// Register (or re-register) a chapter under the book root or an act.
    /// Returns the ids that became dirty.
    pub(crate) fn register_chapter(
        &self,
        act_key: Option<&str>,
        chapter_key: &str,
        text: &str,
    ) -> Result<Vec<String>> {
        let mut state = self.lock_live()?;
        let parent = match act_key {
            Some(act) => {
                let act_id = act_chunk_id(act);
                let outcome = state.index.upsert_chunk(
                    &act_id,
                    ChunkLevel::Act,
                    TextRange::default(),
                    "",
                    Some(BOOK_ID),
                )?;
                if outcome.dirtied() {
                    state.index.propagate_dirty(&act_id)?;
                }
                act_id
            }
            None => BOOK_ID.to_string(),
        };
        let dirtied = state.sync_chapter(self.analyzer.as_ref(), chapter_key, text, &parent)?;
        debug!(
            "Registered chapter {chapter_key} ({} bytes, {} dirtied)",
            text.len(),
            dirtied.len()
        );
        self.notify_queue(&mut state);
        Ok(dirtied)
    }

    pub(crate) fn handle_edit(
        &self,
        chapter_key: &str,
        text: &str,
        cursor_start: usize,
        cursor_end: usize,
    ) -> Result<EditOutcome> {
        let mut state = self.lock_live()?;
        let chapter_id = chapter_chunk_id(chapter_key);
        let registered = state.index.contains(&chapter_id);
        let previous = state.index.chapter_text(chapter_key).unwrap_or_default();
        if registered && previous == text {
            debug!("Edit to {chapter_key} left text unchanged");
            return Ok(EditOutcome::ignored());
        }

        let delta = EditDelta::between(previous, text);
        let parent = state
            .index
            .get_chunk(&chapter_id)
            .and_then(|chunk| chunk.parent_id.clone())
            .unwrap_or_else(|| BOOK_ID.to_string());
        let dirtied = state.sync_chapter(self.analyzer.as_ref(), chapter_key, text, &parent)?;

        let anchor = cursor_start.min(cursor_end);
        let focus = state
            .index
            .scene_at(chapter_key, anchor)
            .or_else(|| state.index.scene_at(chapter_key, anchor.saturating_sub(1)))
            .or_else(|| delta.and_then(|d| state.index.scene_at(chapter_key, d.start)))
            .map(|scene| scene.id.clone());
        state.focus.clone_from(&focus);

        if let Some(delta) = delta {
            debug!(
                "Edit to {chapter_key}: [{}, {}) -> [{}, {}), {} dirtied",
                delta.start,
                delta.old_end,
                delta.start,
                delta.new_end,
                dirtied.len()
            );
        }
        self.notify_queue(&mut state);
        Ok(EditOutcome {
            applied: true,
            delta,
            dirtied,
            focus,
        })
    }

    /// Returns `false` when the chapter was not registered
    pub(crate) fn remove_chapter(&self, chapter_key: &str) -> Result<bool> {
        let mut state = self.lock_live()?;
        let chapter_id = chapter_chunk_id(chapter_key);
        let parent = state
            .index
            .get_chunk(&chapter_id)
            .and_then(|chunk| chunk.parent_id.clone());
        let removed = state.index.remove_subtree(&chapter_id);
        if removed == 0 {
            return Ok(false);
        }
        if let Some(parent) = parent {
            state.index.propagate_dirty(&parent)?;
        }
        if state
            .focus
            .as_deref()
            .is_some_and(|focus| !state.index.contains(focus))
        {
            state.focus = None;
        }
        info!("Removed chapter {chapter_key} ({removed} chunks)");
        self.notify_queue(&mut state);
        Ok(true)
    }

    pub(crate) fn retry_errors(&self) -> Result<Vec<String>> {
        let mut state = self.lock_live()?;
        let ids = state.index.reset_errors();
        for id in &ids {
            state.index.propagate_dirty(id)?;
        }
        if !ids.is_empty() {
            info!("Retrying {} errored chunks", ids.len());
        }
        self.notify_queue(&mut state);
        Ok(ids)
    }

    pub(crate) fn clear(&self) -> Result<()> {
        let mut state = self.lock_live()?;
        state.index.clear();
        state.epoch += 1;
        state.focus = None;
        self.notify_queue(&mut state);
        Ok(())
    }

    /// Drop everything and go silent. Idempotent.
    pub(crate) fn destroy(&self) {
        let mut state = self.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        state.index.clear();
        state.epoch += 1;
        state.focus = None;
        state.last_dirty_count = 0;
        self.events.close();
    }

    // ---- processing ----

    /// Analyze the leaves that are dirty when the batch starts (only those in
    /// `scope`, if given), then refresh parents whose children are all fresh.
    ///
    /// Each leaf is claimed at most once per batch. Leaves dirtied while the
    /// batch runs wait for the next trigger.
    pub(crate) async fn process_dirty(
        &self,
        trigger: Trigger,
        scope: Option<HashSet<String>>,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let (epoch, mut eligible) = {
            let mut state = self.lock();
            if state.destroyed {
                return report;
            }
            state.aggregate_ready();
            self.notify_queue(&mut state);
            (state.epoch, state.dirty_leaves(scope.as_ref()))
        };

        let mut started = false;
        loop {
            let claimed = {
                let mut state = self.lock();
                if state.destroyed || state.epoch != epoch {
                    break;
                }
                let claimed = state.claim_dirty_leaves(self.max_concurrent, &mut eligible);
                if claimed.is_empty() {
                    break;
                }
                if !started {
                    started = true;
                    state.active_batches += 1;
                    if state.active_batches == 1 {
                        self.events.emit(ChunkEvent::ProcessingStart);
                    }
                    debug!("Processing batch started by {}", trigger.as_str());
                }
                self.notify_queue(&mut state);
                claimed
            };
            self.run_round(claimed, epoch, &mut report).await;
        }

        if started {
            let mut state = self.lock();
            if !state.destroyed && state.epoch == epoch {
                state.aggregate_ready();
                self.notify_queue(&mut state);
            }
            state.active_batches = state.active_batches.saturating_sub(1);
            if state.active_batches == 0 {
                self.events.emit(ChunkEvent::ProcessingEnd);
            }
            info!(
                "Processing batch ({}) finished: {} processed, {} failed",
                trigger.as_str(),
                report.processed,
                report.failed
            );
        }
        report
    }

    /// Force re-analysis of `id` (a leaf, or every leaf under a parent)
    pub(crate) async fn reprocess(&self, id: &str) -> Result<BatchReport> {
        let scope = {
            let mut state = self.lock_live()?;
            if !state.index.contains(id) {
                return Err(ManagerError::UnknownChunk(id.to_string()));
            }
            let leaves = state.leaf_descendants(id);
            if leaves.is_empty() {
                state.index.propagate_dirty(id)?;
            }
            for leaf in &leaves {
                state.index.propagate_dirty(leaf)?;
            }
            self.notify_queue(&mut state);
            leaves.into_iter().collect::<HashSet<_>>()
        };
        Ok(self.process_dirty(Trigger::Manual, Some(scope)).await)
    }

    async fn run_round(&self, claimed: Vec<Claim>, epoch: u64, report: &mut BatchReport) {
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<String, u64> = HashMap::new();

        for claim in claimed {
            let Some(text) = claim.text else {
                let message = format!("Text unavailable for chunk {}", claim.id);
                self.complete(epoch, &claim.id, claim.ticket, Err(message), report);
                continue;
            };
            pending.insert(claim.id.clone(), claim.ticket);
            let analyzer = Arc::clone(&self.analyzer);
            tasks.spawn(async move {
                let result = analyzer.analyze(&text).await;
                (claim.id, claim.ticket, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, ticket, result)) => {
                    pending.remove(&id);
                    let outcome = result
                        .map(|raw| intelligence_to_chunk_analysis(&raw))
                        .map_err(|err| err.reason().to_string());
                    self.complete(epoch, &id, ticket, outcome, report);
                }
                Err(err) => warn!("Analysis task failed to join: {err}"),
            }
        }

        for (id, ticket) in pending {
            let aborted = Err("Analysis task aborted".to_string());
            self.complete(epoch, &id, ticket, aborted, report);
        }
    }

    /// Apply one analyzer outcome. The analyzer's own failure message is
    /// stored as the chunk's `error_message`. Results whose claim no longer
    /// owns the chunk (removed, re-registered or re-claimed) are dropped.
    fn complete(
        &self,
        epoch: u64,
        id: &str,
        ticket: u64,
        outcome: std::result::Result<ChunkAnalysis, String>,
        report: &mut BatchReport,
    ) {
        let mut state = self.lock();
        if state.destroyed || state.epoch != epoch {
            debug!("Dropping result for {id}: index was reset");
            return;
        }
        match outcome {
            Ok(analysis) => {
                if let Err(err) = state.index.complete_analysis(id, ticket, analysis) {
                    debug!("Dropping result for {id}: {err}");
                    return;
                }
                report.processed += 1;
                self.events.emit(ChunkEvent::ChunkProcessed {
                    chunk_id: id.to_string(),
                });
                state.roll_up(id);
            }
            Err(message) => {
                if let Err(err) = state.index.fail_analysis(id, ticket, message.as_str()) {
                    debug!("Dropping failure for {id}: {err}");
                    return;
                }
                let errored = state
                    .index
                    .get_chunk(id)
                    .is_some_and(|chunk| chunk.state == ChunkState::Error);
                if errored {
                    warn!("Chunk {id} failed: {message}");
                    report.failed += 1;
                    self.events.emit(ChunkEvent::Error {
                        chunk_id: id.to_string(),
                        message,
                    });
                } else {
                    debug!("Chunk {id} failed on text that has since changed");
                }
            }
        }
        self.notify_queue(&mut state);
    }

    fn notify_queue(&self, state: &mut EngineState) {
        let dirty = state.index.count_in_state(ChunkState::Dirty);
        if dirty != state.last_dirty_count {
            state.last_dirty_count = dirty;
            self.events.emit(ChunkEvent::QueueChange { dirty_count: dirty });
        }
    }

    // ---- reads ----

    pub(crate) fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub(crate) fn has_dirty(&self) -> bool {
        self.lock().index.count_in_state(ChunkState::Dirty) > 0
    }

    pub(crate) fn get_chunk(&self, id: &str) -> Option<Chunk> {
        self.lock().index.get_chunk(id).cloned()
    }

    pub(crate) fn get_children(&self, id: &str) -> Vec<Chunk> {
        self.lock()
            .index
            .get_children(id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The chunk's own analysis when fresh, else a live rollup of its
    /// children's last-known analyses. `None` for unknown ids.
    pub(crate) fn get_aggregate(&self, id: &str) -> Option<ChunkAnalysis> {
        let state = self.lock();
        let chunk = state.index.get_chunk(id)?;
        if chunk.state == ChunkState::Fresh {
            if let Some(analysis) = &chunk.analysis {
                return Some(analysis.clone());
            }
        }
        if chunk.level.is_leaf_level() {
            return chunk.analysis.clone();
        }
        let children = state.index.get_children(id);
        let known: Vec<&ChunkAnalysis> = children
            .iter()
            .filter_map(|child| child.analysis.as_ref())
            .collect();
        Some(aggregate(&known))
    }

    pub(crate) fn book_summary(&self) -> ChunkAnalysis {
        self.get_aggregate(BOOK_ID).unwrap_or_else(no_data)
    }

    /// Chapter key → last-known analysis, for chapters that have one
    pub(crate) fn chapter_analyses(&self) -> BTreeMap<String, ChunkAnalysis> {
        let state = self.lock();
        state
            .index
            .iter()
            .filter(|chunk| chunk.level == ChunkLevel::Chapter)
            .filter_map(|chunk| {
                let key = parse_chunk_id(&chunk.id)?.key;
                Some((key, chunk.analysis.clone()?))
            })
            .collect()
    }

    pub(crate) fn analysis_at_cursor(&self, chapter_key: &str, offset: usize) -> Option<CursorHit> {
        resolve_cursor(&self.lock().index, chapter_key, offset)
    }

    pub(crate) fn stats(&self) -> ManagerStats {
        let state = self.lock();
        ManagerStats::collect(&state.index, state.active_batches > 0)
    }
}

impl EngineState {
    /// Upsert the chapter, re-split it into scenes and dirty what changed
    fn sync_chapter(
        &mut self,
        analyzer: &dyn Analyzer,
        chapter_key: &str,
        text: &str,
        parent_id: &str,
    ) -> Result<Vec<String>> {
        let chapter_id = chapter_chunk_id(chapter_key);
        let mut dirtied = Vec::new();

        let previous_parent = self
            .index
            .get_chunk(&chapter_id)
            .and_then(|chunk| chunk.parent_id.clone());
        let outcome = self.index.upsert_chunk(
            &chapter_id,
            ChunkLevel::Chapter,
            TextRange::new(0, text.len()),
            text,
            Some(parent_id),
        )?;
        self.index.set_chapter_text(chapter_key, text);
        if outcome.dirtied() {
            dirtied.extend(self.dirty_with_ancestors(&chapter_id)?);
        }
        if let Some(old) = previous_parent.filter(|old| old != parent_id) {
            dirtied.extend(self.index.propagate_dirty(&old)?);
        }

        let ranges = analyzer.scene_boundaries(text);
        for (position, range) in ranges.iter().enumerate() {
            let scene_id = scene_chunk_id(chapter_key, position);
            let scene_text = range.slice(text).unwrap_or_default();
            let outcome = self.index.upsert_chunk(
                &scene_id,
                ChunkLevel::Scene,
                *range,
                scene_text,
                Some(&chapter_id),
            )?;
            if outcome.dirtied() {
                dirtied.extend(self.dirty_with_ancestors(&scene_id)?);
            }
        }

        let stale: Vec<String> = self
            .index
            .get_children(&chapter_id)
            .into_iter()
            .filter(|chunk| {
                parse_chunk_id(&chunk.id)
                    .and_then(|parsed| parsed.index)
                    .map_or(true, |position| position >= ranges.len())
            })
            .map(|chunk| chunk.id.clone())
            .collect();
        if !stale.is_empty() {
            for id in &stale {
                self.index.remove_subtree(id);
            }
            dirtied.extend(self.index.propagate_dirty(&chapter_id)?);
        }

        dirtied.sort();
        dirtied.dedup();
        Ok(dirtied)
    }

    /// `id` (already dirty after an upsert) plus every ancestor it dirtied
    fn dirty_with_ancestors(&mut self, id: &str) -> Result<Vec<String>> {
        let mut out = vec![id.to_string()];
        out.extend(self.index.propagate_dirty(id)?);
        Ok(out)
    }

    /// Dirty leaves, restricted to `scope` when given
    fn dirty_leaves(&self, scope: Option<&HashSet<String>>) -> HashSet<String> {
        self.index
            .iter()
            .filter(|chunk| chunk.level.is_leaf_level() && chunk.state == ChunkState::Dirty)
            .filter(|chunk| scope.map_or(true, |scope| scope.contains(&chunk.id)))
            .map(|chunk| chunk.id.clone())
            .collect()
    }

    /// Claim up to `limit` dirty leaves out of `eligible`, focus scene first,
    /// then document order. Claimed ids leave `eligible`.
    fn claim_dirty_leaves(&mut self, limit: usize, eligible: &mut HashSet<String>) -> Vec<Claim> {
        let mut candidates: Vec<&Chunk> = self
            .index
            .iter()
            .filter(|chunk| chunk.level.is_leaf_level() && chunk.state == ChunkState::Dirty)
            .filter(|chunk| eligible.contains(&chunk.id))
            .collect();
        candidates.sort_by(|a, b| {
            (a.parent_id.as_deref(), a.range.start).cmp(&(b.parent_id.as_deref(), b.range.start))
        });
        if let Some(focus) = self.focus.as_deref() {
            if let Some(pos) = candidates.iter().position(|chunk| chunk.id == focus) {
                let chunk = candidates.remove(pos);
                candidates.insert(0, chunk);
            }
        }

        let ids: Vec<String> = candidates
            .into_iter()
            .take(limit)
            .map(|chunk| chunk.id.clone())
            .collect();
        if ids.iter().any(|id| Some(id.as_str()) == self.focus.as_deref()) {
            self.focus = None;
        }

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            eligible.remove(&id);
            let ticket = match self.index.mark_processing(&id) {
                Ok(ticket) => ticket,
                Err(err) => {
                    debug!("Skipping {id}: {err}");
                    continue;
                }
            };
            let text = self
                .index
                .get_chunk(&id)
                .and_then(|chunk| self.index.get_chunk_text(chunk))
                .map(str::to_string);
            claimed.push(Claim { id, ticket, text });
        }
        claimed
    }

    /// Refresh ancestors of `id`, nearest first, while all their children are fresh
    fn roll_up(&mut self, id: &str) {
        for ancestor in self.index.ancestors(id) {
            if !self.refresh_parent(&ancestor) {
                break;
            }
        }
    }

    /// Refresh every dirty parent whose children are all fresh, deepest first
    fn aggregate_ready(&mut self) {
        let mut parents: Vec<(ChunkLevel, String)> = self
            .index
            .iter()
            .filter(|chunk| !chunk.level.is_leaf_level() && chunk.state == ChunkState::Dirty)
            .map(|chunk| (chunk.level, chunk.id.clone()))
            .collect();
        parents.sort_by(|a, b| b.cmp(a));
        for (_, id) in parents {
            self.refresh_parent(&id);
        }
    }

    /// Returns `true` when the parent is fresh afterwards
    fn refresh_parent(&mut self, id: &str) -> bool {
        let Some(parent) = self.index.get_chunk(id) else {
            return false;
        };
        match parent.state {
            ChunkState::Fresh => return true,
            ChunkState::Dirty => {}
            ChunkState::Processing | ChunkState::Error => return false,
        }

        let children = self.index.get_children(id);
        if children.iter().any(|child| child.state != ChunkState::Fresh) {
            return false;
        }
        let child_count = children.len();
        let analyses: Vec<&ChunkAnalysis> = children
            .iter()
            .filter_map(|child| child.analysis.as_ref())
            .collect();
        let merged = aggregate(&analyses);

        match self.index.update_analysis(id, merged) {
            Ok(()) => {
                debug!("Aggregated {id} from {child_count} children");
                true
            }
            Err(err) => {
                warn!("Failed to aggregate {id}: {err}");
                false
            }
        }
    }

    /// Every scene at or below `id`
    fn leaf_descendants(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            let Some(chunk) = self.index.get_chunk(&current) else {
                continue;
            };
            if chunk.level.is_leaf_level() {
                out.push(current);
                continue;
            }
            stack.extend(
                self.index
                    .get_children(&current)
                    .into_iter()
                    .map(|child| child.id.clone()),
            );
        }
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkcache_analysis::HeuristicAnalyzer;
    use pretty_assertions::assert_eq;

    fn engine() -> Engine {
        Engine::new(Arc::new(HeuristicAnalyzer::new()), 2)
    }

    #[test]
    fn register_splits_scenes_and_dirties_ancestors() {
        let engine = engine();
        let dirtied = engine
            .register_chapter(None, "ch1", "One scene.\n***\nTwo scene.\n")
            .unwrap();
        assert_eq!(dirtied, vec!["chapter:ch1", "scene:ch1:0", "scene:ch1:1"]);
        assert_eq!(engine.get_children("chapter:ch1").len(), 2);
        assert_eq!(engine.get_chunk(BOOK_ID).unwrap().state, ChunkState::Dirty);
    }

    #[test]
    fn shrinking_chapter_removes_trailing_scenes() {
        let engine = engine();
        engine
            .register_chapter(None, "ch1", "One.\n***\nTwo.\n***\nThree.\n")
            .unwrap();
        assert_eq!(engine.get_children("chapter:ch1").len(), 3);

        engine.register_chapter(None, "ch1", "One.\n").unwrap();
        assert_eq!(engine.get_children("chapter:ch1").len(), 1);
        assert!(engine.get_chunk("scene:ch1:2").is_none());
    }

    #[test]
    fn focus_scene_is_claimed_first() {
        let engine = engine();
        let text = "Alpha.\n***\nBeta.\n***\nGamma.\n";
        engine.register_chapter(None, "ch1", text).unwrap();
        let offset = text.find("Gamma").unwrap();
        let edited = text.replace("Gamma.", "Gamma!");
        let outcome = engine.handle_edit("ch1", &edited, offset, offset).unwrap();
        assert_eq!(outcome.focus.as_deref(), Some("scene:ch1:2"));

        let mut state = engine.lock();
        let mut eligible = state.dirty_leaves(None);
        let claimed = state.claim_dirty_leaves(1, &mut eligible);
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id, "scene:ch1:2");
        assert_eq!(claimed[0].text.as_deref(), Some("Gamma!\n"));
        assert!(!eligible.contains("scene:ch1:2"));
    }

    #[tokio::test]
    async fn leaf_dirtied_mid_batch_waits_for_the_next_batch() {
        let engine = engine();
        let text = "Alpha.\n***\nBeta.\n";
        engine.register_chapter(None, "ch1", text).unwrap();

        let mut eligible = engine.lock().dirty_leaves(None);
        let claimed = engine.lock().claim_dirty_leaves(2, &mut eligible);
        assert_eq!(claimed.len(), 2);
        assert!(eligible.is_empty());

        engine
            .handle_edit("ch1", "Alpha.\n***\nBeta later.\n", 15, 15)
            .unwrap();
        let mut report = BatchReport::default();
        engine.run_round(claimed, 0, &mut report).await;
        assert_eq!(report.processed, 2);
        assert_eq!(engine.get_chunk("scene:ch1:1").unwrap().state, ChunkState::Dirty);

        let mut state = engine.lock();
        assert!(state.claim_dirty_leaves(2, &mut eligible).is_empty());
        assert!(state.dirty_leaves(None).contains("scene:ch1:1"));
    }

    #[test]
    fn chapter_without_scenes_aggregates_to_no_data() {
        let engine = engine();
        engine.register_chapter(None, "empty", "").unwrap();
        engine.lock().aggregate_ready();

        let chapter = engine.get_chunk("chapter:empty").unwrap();
        assert_eq!(chapter.state, ChunkState::Fresh);
        assert_eq!(chapter.analysis.unwrap().summary, "No data");
    }

    #[test]
    fn mutations_fail_after_destroy() {
        let engine = engine();
        engine.destroy();
        assert!(matches!(
            engine.register_chapter(None, "ch1", "text"),
            Err(ManagerError::Destroyed)
        ));
        assert_eq!(engine.stats(), ManagerStats::default());
    }
}
