use chunkcache_index::TextRange;
use serde::Serialize;

/// The single contiguous region that differs between two versions of a text.
///
/// `[start, old_end)` in the old text was replaced by `[start, new_end)` in
/// the new one. Offsets are bytes and always fall on char boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EditDelta {
    pub start: usize,
    pub old_end: usize,
    pub new_end: usize,
}

impl EditDelta {
    /// `None` when the texts are identical
    #[must_use]
    pub fn between(old: &str, new: &str) -> Option<Self> {
        if old == new {
            return None;
        }

        let mut prefix = old
            .bytes()
            .zip(new.bytes())
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(prefix) {
            prefix -= 1;
        }

        let max_suffix = old.len().min(new.len()) - prefix;
        let mut suffix = old
            .bytes()
            .rev()
            .zip(new.bytes().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();
        while !old.is_char_boundary(old.len() - suffix) {
            suffix -= 1;
        }

        Some(Self {
            start: prefix,
            old_end: old.len() - suffix,
            new_end: new.len() - suffix,
        })
    }

    /// Changed region in new-text coordinates (empty for a pure deletion)
    #[must_use]
    pub const fn inserted(&self) -> TextRange {
        TextRange::new(self.start, self.new_end)
    }

    /// Changed region in old-text coordinates (empty for a pure insertion)
    #[must_use]
    pub const fn removed(&self) -> TextRange {
        TextRange::new(self.start, self.old_end)
    }
}

/// Result of [`ChunkManager::handle_edit`](crate::ChunkManager::handle_edit)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditOutcome {
    /// `false` when the text matched what was stored; nothing was touched
    pub applied: bool,
    pub delta: Option<EditDelta>,
    /// Chunks that went from authoritative to dirty
    pub dirtied: Vec<String>,
    /// Scene under the cursor, processed first in the next batch
    pub focus: Option<String>,
}

impl EditOutcome {
    pub(crate) fn ignored() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_text_has_no_delta() {
        assert_eq!(EditDelta::between("same", "same"), None);
    }

    #[test]
    fn insertion_in_middle() {
        let delta = EditDelta::between("hello world", "hello brave world").unwrap();
        assert_eq!(delta.start, 6);
        assert_eq!(delta.removed(), TextRange::new(6, 6));
        assert_eq!(delta.inserted(), TextRange::new(6, 12));
    }

    #[test]
    fn deletion_at_end() {
        let delta = EditDelta::between("abcdef", "abc").unwrap();
        assert_eq!(delta.removed(), TextRange::new(3, 6));
        assert!(delta.inserted().is_empty());
    }

    #[test]
    fn repeated_characters_do_not_overlap() {
        let delta = EditDelta::between("aaa", "aaaa").unwrap();
        assert_eq!(delta.start, 3);
        assert_eq!(delta.old_end, 3);
        assert_eq!(delta.new_end, 4);
    }

    #[test]
    fn multibyte_edits_stay_on_char_boundaries() {
        let old = "caf\u{e9} noir";
        let new = "caf\u{e8} noir";
        let delta = EditDelta::between(old, new).unwrap();
        assert!(old.is_char_boundary(delta.start));
        assert!(old.is_char_boundary(delta.old_end));
        assert!(new.is_char_boundary(delta.new_end));
        assert_eq!(&new[delta.start..delta.new_end], "\u{e8}");
    }
}
