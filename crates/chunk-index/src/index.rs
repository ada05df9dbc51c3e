use crate::error::{IndexError, Result};
use crate::id::{chapter_key_of, BOOK_ID};
use crate::types::{Chunk, ChunkAnalysis, ChunkLevel, ChunkState, TextRange};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// What [`ChunkIndex::upsert_chunk`] did with a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// New record, starts `dirty`
    Created,
    /// Identical registration, nothing touched
    Unchanged,
    /// Same content and length at a new offset; state kept
    Moved,
    /// Content, length, level or parent changed; record is `dirty`
    Replaced,
}

impl RegisterOutcome {
    /// Whether the registration left the chunk needing analysis
    #[must_use]
    pub const fn dirtied(self) -> bool {
        matches!(self, Self::Created | Self::Replaced)
    }
}

/// Flat arena of chunks plus a parent → children lookup.
///
/// Parents never own their children: the hierarchy is a set of
/// back-references keyed by id, so dropping the maps drops everything.
#[derive(Debug, Default)]
pub struct ChunkIndex {
    chunks: HashMap<String, Chunk>,
    children: HashMap<String, Vec<String>>,
    chapter_texts: HashMap<String, String>,
    last_stamp_ms: u64,
    last_ticket: u64,
}

impl ChunkIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a chunk record; idempotent on `id`.
    pub fn register_chunk(
        &mut self,
        id: &str,
        level: ChunkLevel,
        start: usize,
        end: usize,
        text: &str,
        parent_id: Option<&str>,
    ) -> Result<&Chunk> {
        self.upsert_chunk(id, level, TextRange::new(start, end), text, parent_id)?;
        self.chunks.get(id).ok_or_else(|| IndexError::unknown(id))
    }

    /// Like [`register_chunk`](Self::register_chunk) but reports what changed.
    ///
    /// For chapter chunks a non-empty `text` also becomes the chapter's full text.
    pub fn upsert_chunk(
        &mut self,
        id: &str,
        level: ChunkLevel,
        range: TextRange,
        text: &str,
        parent_id: Option<&str>,
    ) -> Result<RegisterOutcome> {
        if id.is_empty() {
            return Err(IndexError::InvalidId(id.to_string()));
        }
        self.check_parent(id, level, parent_id)?;

        if level == ChunkLevel::Chapter && !text.is_empty() {
            let key = chapter_key_of(id).unwrap_or_else(|| id.to_string());
            self.chapter_texts.insert(key, text.to_string());
        }

        let fingerprint = fingerprint(text);
        let parent_id = parent_id.map(str::to_string);

        let Some(existing) = self.chunks.get_mut(id) else {
            let chunk = Chunk::new(id.to_string(), level, range, parent_id.clone(), fingerprint);
            self.chunks.insert(id.to_string(), chunk);
            if let Some(parent) = parent_id {
                self.link_child(&parent, id);
            }
            return Ok(RegisterOutcome::Created);
        };

        let same_shape = existing.level == level
            && existing.parent_id == parent_id
            && existing.fingerprint == fingerprint;
        if same_shape && existing.range == range {
            return Ok(RegisterOutcome::Unchanged);
        }
        if same_shape && existing.range.len() == range.len() {
            existing.range = range;
            return Ok(RegisterOutcome::Moved);
        }

        let old_parent = existing.parent_id.clone();
        existing.level = level;
        existing.range = range;
        existing.fingerprint = fingerprint;
        existing.parent_id = parent_id.clone();
        dirty_in_place(existing);

        if old_parent != parent_id {
            if let Some(old) = old_parent {
                self.unlink_child(&old, id);
            }
            if let Some(parent) = parent_id {
                self.link_child(&parent, id);
            }
        }
        Ok(RegisterOutcome::Replaced)
    }

    /// Create the book root if missing
    pub fn ensure_root(&mut self) -> &Chunk {
        self.chunks.entry(BOOK_ID.to_string()).or_insert_with(|| {
            Chunk::new(
                BOOK_ID.to_string(),
                ChunkLevel::Book,
                TextRange::default(),
                None,
                fingerprint(""),
            )
        })
    }

    fn check_parent(&mut self, id: &str, level: ChunkLevel, parent_id: Option<&str>) -> Result<()> {
        let Some(parent_id) = parent_id else {
            return if level == ChunkLevel::Book {
                Ok(())
            } else {
                Err(IndexError::MissingParent(id.to_string()))
            };
        };
        if parent_id == id {
            return Err(IndexError::InvalidHierarchy {
                id: id.to_string(),
                child: level,
                parent: level,
            });
        }
        if parent_id == BOOK_ID {
            self.ensure_root();
        }
        let parent = self
            .chunks
            .get(parent_id)
            .ok_or_else(|| IndexError::UnknownParent {
                id: id.to_string(),
                parent: parent_id.to_string(),
            })?;
        if parent.level >= level {
            return Err(IndexError::InvalidHierarchy {
                id: id.to_string(),
                child: level,
                parent: parent.level,
            });
        }
        Ok(())
    }

    fn link_child(&mut self, parent: &str, child: &str) {
        let list = self.children.entry(parent.to_string()).or_default();
        if !list.iter().any(|c| c == child) {
            list.push(child.to_string());
        }
    }

    fn unlink_child(&mut self, parent: &str, child: &str) {
        if let Some(list) = self.children.get_mut(parent) {
            list.retain(|c| c != child);
            if list.is_empty() {
                self.children.remove(parent);
            }
        }
    }

    #[must_use]
    pub fn get_chunk(&self, id: &str) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.chunks.contains_key(id)
    }

    /// Children ordered by range start (registration order breaks ties)
    #[must_use]
    pub fn get_children(&self, parent_id: &str) -> Vec<&Chunk> {
        let mut out: Vec<&Chunk> = self
            .children
            .get(parent_id)
            .map(|ids| ids.iter().filter_map(|id| self.chunks.get(id)).collect())
            .unwrap_or_default();
        out.sort_by_key(|chunk| chunk.range.start);
        out
    }

    #[must_use]
    pub fn has_children(&self, id: &str) -> bool {
        self.children.get(id).is_some_and(|ids| !ids.is_empty())
    }

    /// Parent first, root last
    #[must_use]
    pub fn ancestors(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut cursor = self.chunks.get(id).and_then(|c| c.parent_id.clone());
        while let Some(parent) = cursor {
            cursor = self.chunks.get(&parent).and_then(|c| c.parent_id.clone());
            out.push(parent);
        }
        out
    }

    /// The chunk itself when it is a chapter, else its nearest chapter ancestor
    #[must_use]
    pub fn chapter_ancestor(&self, chunk: &Chunk) -> Option<&Chunk> {
        if chunk.level == ChunkLevel::Chapter {
            return self.chunks.get(&chunk.id);
        }
        let mut cursor = chunk.parent_id.as_deref();
        while let Some(parent_id) = cursor {
            let parent = self.chunks.get(parent_id)?;
            if parent.level == ChunkLevel::Chapter {
                return Some(parent);
            }
            cursor = parent.parent_id.as_deref();
        }
        None
    }

    /// Store a fresh analysis.
    ///
    /// Leaves only accept a result while `processing`; parents take their
    /// aggregate from any state but `error`. Errored chunks must go back
    /// through `dirty` first.
    pub fn update_analysis(&mut self, id: &str, mut analysis: ChunkAnalysis) -> Result<()> {
        let stamp = self.next_stamp();
        let chunk = self
            .chunks
            .get_mut(id)
            .ok_or_else(|| IndexError::unknown(id))?;
        let allowed = if chunk.level.is_leaf_level() {
            chunk.state == ChunkState::Processing
        } else {
            chunk.state != ChunkState::Error
        };
        if !allowed {
            return Err(IndexError::transition(id, chunk.state, ChunkState::Fresh));
        }
        analysis.processed_at_ms = stamp;
        chunk.analysis = Some(analysis);
        chunk.error_message = None;
        chunk.ticket = None;
        chunk.state = if chunk.redirty {
            debug!("{id} edited while processing; stored result is already stale");
            ChunkState::Dirty
        } else {
            ChunkState::Fresh
        };
        chunk.redirty = false;
        Ok(())
    }

    /// Returns `true` when the call changed anything.
    ///
    /// A `processing` chunk stays `processing`; the dirty request is
    /// applied when its result lands.
    pub fn mark_dirty(&mut self, id: &str) -> Result<bool> {
        let chunk = self
            .chunks
            .get_mut(id)
            .ok_or_else(|| IndexError::unknown(id))?;
        Ok(dirty_in_place(chunk))
    }

    /// Claim a dirty chunk. The returned ticket must accompany its result
    /// (see [`complete_analysis`](Self::complete_analysis)).
    pub fn mark_processing(&mut self, id: &str) -> Result<u64> {
        let chunk = self
            .chunks
            .get_mut(id)
            .ok_or_else(|| IndexError::unknown(id))?;
        if chunk.state != ChunkState::Dirty {
            return Err(IndexError::transition(id, chunk.state, ChunkState::Processing));
        }
        self.last_ticket += 1;
        chunk.state = ChunkState::Processing;
        chunk.ticket = Some(self.last_ticket);
        Ok(self.last_ticket)
    }

    /// Store the result of the claim identified by `ticket`.
    ///
    /// Fails with [`IndexError::StaleClaim`] when the chunk was removed and
    /// registered again, or claimed again, since the ticket was issued.
    pub fn complete_analysis(
        &mut self,
        id: &str,
        ticket: u64,
        analysis: ChunkAnalysis,
    ) -> Result<()> {
        self.check_ticket(id, ticket)?;
        self.update_analysis(id, analysis)
    }

    /// Record the failure of the claim identified by `ticket`
    pub fn fail_analysis(
        &mut self,
        id: &str,
        ticket: u64,
        message: impl Into<String>,
    ) -> Result<()> {
        self.check_ticket(id, ticket)?;
        self.mark_error(id, message)
    }

    fn check_ticket(&self, id: &str, ticket: u64) -> Result<()> {
        let chunk = self.chunks.get(id).ok_or_else(|| IndexError::unknown(id))?;
        if chunk.state != ChunkState::Processing || chunk.ticket != Some(ticket) {
            return Err(IndexError::StaleClaim(id.to_string()));
        }
        Ok(())
    }

    /// Record a failure; the last good analysis stays readable.
    pub fn mark_error(&mut self, id: &str, message: impl Into<String>) -> Result<()> {
        let chunk = self
            .chunks
            .get_mut(id)
            .ok_or_else(|| IndexError::unknown(id))?;
        match chunk.state {
            ChunkState::Processing | ChunkState::Dirty => {}
            from => return Err(IndexError::transition(id, from, ChunkState::Error)),
        }
        chunk.ticket = None;
        if chunk.redirty {
            // The failed attempt ran on text that has since changed.
            chunk.redirty = false;
            chunk.state = ChunkState::Dirty;
            chunk.error_message = None;
            return Ok(());
        }
        chunk.state = ChunkState::Error;
        chunk.error_message = Some(message.into());
        Ok(())
    }

    /// Mark `id` and every ancestor dirty. Returns the ids that changed.
    pub fn propagate_dirty(&mut self, id: &str) -> Result<Vec<String>> {
        let mut changed = Vec::new();
        if self.mark_dirty(id)? {
            changed.push(id.to_string());
        }
        for ancestor in self.ancestors(id) {
            if self.mark_dirty(&ancestor)? {
                changed.push(ancestor);
            }
        }
        Ok(changed)
    }

    /// Move every `error` chunk back to `dirty`; returns their ids, sorted.
    pub fn reset_errors(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .chunks
            .values_mut()
            .filter(|chunk| chunk.state == ChunkState::Error)
            .map(|chunk| {
                chunk.state = ChunkState::Dirty;
                chunk.error_message = None;
                chunk.id.clone()
            })
            .collect();
        ids.sort();
        ids
    }

    /// Text indexed by `chunk`.
    ///
    /// Chapters read their own full text; scenes read `[start, end)` of
    /// their chapter ancestor's text. Out-of-bounds ranges yield `None`,
    /// never a clamped slice.
    #[must_use]
    pub fn get_chunk_text(&self, chunk: &Chunk) -> Option<&str> {
        match chunk.level {
            ChunkLevel::Book | ChunkLevel::Act => None,
            ChunkLevel::Chapter => {
                let text = self.chapter_texts.get(&chapter_key(&chunk.id))?;
                chunk.range.slice(text)
            }
            ChunkLevel::Scene => {
                let chapter = self.chapter_ancestor(chunk)?;
                let text = self.chapter_texts.get(&chapter_key(&chapter.id))?;
                chunk.range.slice(text)
            }
        }
    }

    pub fn set_chapter_text(&mut self, chapter_key: &str, text: impl Into<String>) {
        self.chapter_texts.insert(chapter_key.to_string(), text.into());
    }

    #[must_use]
    pub fn chapter_text(&self, chapter_key: &str) -> Option<&str> {
        self.chapter_texts.get(chapter_key).map(String::as_str)
    }

    #[must_use]
    pub fn chapter_count(&self) -> usize {
        self.chunks
            .values()
            .filter(|chunk| chunk.level == ChunkLevel::Chapter)
            .count()
    }

    /// Drop `id` and everything below it. Returns the number of chunks removed.
    pub fn remove_subtree(&mut self, id: &str) -> usize {
        let Some(parent) = self.chunks.get(id).map(|c| c.parent_id.clone()) else {
            return 0;
        };
        if let Some(parent) = parent {
            self.unlink_child(&parent, id);
        }

        let mut removed = 0;
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(kids) = self.children.remove(&current) {
                stack.extend(kids);
            }
            if let Some(chunk) = self.chunks.remove(&current) {
                if chunk.level == ChunkLevel::Chapter {
                    self.chapter_texts.remove(&chapter_key(&chunk.id));
                }
                removed += 1;
            }
        }
        removed
    }

    /// Reset to empty. Analysis stamps and claim tickets stay monotonic
    /// across clears.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.children.clear();
        self.chapter_texts.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    /// Ids currently in `state`, sorted
    #[must_use]
    pub fn ids_in_state(&self, state: ChunkState) -> Vec<String> {
        let mut ids: Vec<String> = self
            .chunks
            .values()
            .filter(|chunk| chunk.state == state)
            .map(|chunk| chunk.id.clone())
            .collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn count_in_state(&self, state: ChunkState) -> usize {
        self.chunks.values().filter(|c| c.state == state).count()
    }

    fn next_stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.last_stamp_ms = now.max(self.last_stamp_ms + 1);
        self.last_stamp_ms
    }
}

fn dirty_in_place(chunk: &mut Chunk) -> bool {
    match chunk.state {
        ChunkState::Dirty => false,
        ChunkState::Processing => {
            let changed = !chunk.redirty;
            chunk.redirty = true;
            changed
        }
        ChunkState::Fresh | ChunkState::Error => {
            chunk.state = ChunkState::Dirty;
            chunk.error_message = None;
            true
        }
    }
}

fn chapter_key(chapter_id: &str) -> String {
    chapter_key_of(chapter_id).unwrap_or_else(|| chapter_id.to_string())
}

fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}
