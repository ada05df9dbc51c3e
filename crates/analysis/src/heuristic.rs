//! Lightweight local analyzer.
//!
//! Counts and pattern matches only; good enough to drive the cache from the
//! command line without a model behind it.

use crate::analyzer::Analyzer;
use crate::error::Result;
use crate::intelligence::{
    AttentionHeatmap, EntityGraph, EntityKind, EntityNode, HeatmapSection, ManuscriptIntelligence,
    SceneInfo, StructuralFingerprint, StructuralStats, StyleFingerprint,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use unicode_segmentation::UnicodeSegmentation;

const FILTER_WORDS: &[&str] = &[
    "felt", "feel", "feels", "saw", "see", "sees", "heard", "hear", "noticed", "notice",
    "realized", "realised", "seemed", "wondered", "watched", "knew", "thought", "decided",
];

const NOT_ADVERBS: &[&str] = &[
    "only", "family", "early", "reply", "belly", "holy", "ugly", "july", "rally", "fly",
];

const LOCATION_PREPOSITIONS: &[&str] = &["in", "at", "from", "to", "into", "toward", "towards"];

static PASSIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:was|were|is|are|been|being|be)\s+\w+ed\b").expect("valid passive pattern")
});

static TIME_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:dawn|dusk|midnight|noon|morning|evening|night|the next day|yesterday|tomorrow|later that \w+)\b",
    )
    .expect("valid time marker pattern")
});

/// Pattern-based [`Analyzer`] with no external calls
#[derive(Debug, Clone, Default)]
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Synchronous core, shared with tests
    #[must_use]
    pub fn analyze_text(&self, text: &str) -> ManuscriptIntelligence {
        let words: Vec<(usize, &str)> = text.unicode_word_indices().collect();
        let word_count = words.len();
        let sentences: Vec<&str> = text
            .split_inclusive(['.', '!', '?'])
            .filter(|s| s.chars().any(char::is_alphanumeric))
            .collect();
        let sentence_count = sentences.len();

        let dialogue_words = quoted_segments(text)
            .iter()
            .map(|segment| segment.unicode_words().count())
            .sum::<usize>();

        let adverbs = words
            .iter()
            .filter(|(_, w)| is_adverb(w))
            .count();
        let filters = words
            .iter()
            .filter(|(_, w)| FILTER_WORDS.contains(&w.to_lowercase().as_str()))
            .count();
        let passives = PASSIVE.find_iter(text).count();
        let raised = sentences
            .iter()
            .filter(|s| s.trim_end().ends_with(['!', '?']))
            .count();

        let dialogue_ratio = ratio(dialogue_words, word_count);
        let passive_voice_ratio = ratio(passives, sentence_count);
        let adverb_density = ratio(adverbs, word_count);
        let filter_word_density = ratio(filters, word_count);
        let avg_sentence_length = if sentence_count == 0 {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let avg = word_count as f64 / sentence_count as f64;
            avg
        };
        let tension = (ratio(raised, sentence_count) * 2.0).min(1.0);
        let risk = ((passive_voice_ratio / 0.3).min(1.0)
            + (adverb_density / 0.1).min(1.0)
            + (filter_word_density / 0.06).min(1.0))
            / 3.0;

        ManuscriptIntelligence {
            structural: StructuralFingerprint {
                stats: StructuralStats {
                    word_count,
                    sentence_count,
                    dialogue_ratio,
                    avg_sentence_length,
                },
                scenes: vec![SceneInfo {
                    tension,
                    time_marker: TIME_MARKER
                        .find(text)
                        .map(|m| m.as_str().to_lowercase()),
                }],
            },
            entities: EntityGraph {
                nodes: entities(text, &words),
            },
            timeline: crate::intelligence::Timeline::default(),
            style: StyleFingerprint {
                passive_voice_ratio,
                adverb_density,
                filter_word_density,
            },
            heatmap: AttentionHeatmap {
                sections: vec![HeatmapSection {
                    offset: 0,
                    overall_risk: risk,
                }],
            },
        }
    }
}

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    async fn analyze(&self, text: &str) -> Result<ManuscriptIntelligence> {
        Ok(self.analyze_text(text))
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = part as f64 / whole as f64;
    value.clamp(0.0, 1.0)
}

fn is_adverb(word: &str) -> bool {
    let lower = word.to_lowercase();
    lower.len() > 4 && lower.ends_with("ly") && !NOT_ADVERBS.contains(&lower.as_str())
}

/// Text between straight or curly double quotes
fn quoted_segments(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut open: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        match (ch, open) {
            ('"' | '\u{201C}', None) => open = Some(idx + ch.len_utf8()),
            ('"' | '\u{201D}', Some(start)) => {
                out.push(&text[start..idx]);
                open = None;
            }
            _ => {}
        }
    }
    out
}

/// Capitalised words that do not start a sentence. Names after a place
/// preposition count as locations; other names need two mentions.
fn entities(text: &str, words: &[(usize, &str)]) -> Vec<EntityNode> {
    let mut characters: BTreeMap<&str, usize> = BTreeMap::new();
    let mut locations: BTreeMap<&str, usize> = BTreeMap::new();

    for (pos, (offset, word)) in words.iter().enumerate() {
        let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
        if !starts_upper || *word == "I" || starts_sentence(text, *offset) {
            continue;
        }
        let after_preposition = pos
            .checked_sub(1)
            .and_then(|prev| words.get(prev))
            .is_some_and(|(_, prev)| LOCATION_PREPOSITIONS.contains(&prev.to_lowercase().as_str()));
        if after_preposition {
            *locations.entry(*word).or_default() += 1;
        } else {
            *characters.entry(*word).or_default() += 1;
        }
    }

    let mut nodes: Vec<EntityNode> = locations
        .into_iter()
        .map(|(name, mentions)| EntityNode {
            name: name.to_string(),
            kind: EntityKind::Location,
            mentions,
        })
        .collect();
    nodes.extend(
        characters
            .into_iter()
            .filter(|(_, mentions)| *mentions >= 2)
            .map(|(name, mentions)| EntityNode {
                name: name.to_string(),
                kind: EntityKind::Character,
                mentions,
            }),
    );
    nodes
}

fn starts_sentence(text: &str, offset: usize) -> bool {
    let before = text[..offset].trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\'')
    });
    before
        .chars()
        .last()
        .map_or(true, |c| matches!(c, '.' | '!' | '?' | ':' | '#'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::intelligence_to_chunk_analysis;

    #[test]
    fn test_counts_words_and_dialogue() {
        let raw = HeuristicAnalyzer::new().analyze_text("\"Run now,\" she said. They ran.");
        assert_eq!(raw.structural.stats.word_count, 6);
        assert_eq!(raw.structural.stats.sentence_count, 2);
        assert!((raw.structural.stats.dialogue_ratio - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_names_need_two_mentions_and_places_need_prepositions() {
        let text = "Later, Mara walked in Lisbon. Then Mara waved at Tomas.";
        let analysis = intelligence_to_chunk_analysis(&HeuristicAnalyzer::new().analyze_text(text));
        assert!(analysis.character_names.contains("Mara"));
        assert!(!analysis.character_names.contains("Later"));
        assert!(analysis.location_names.contains("Lisbon"));
    }

    #[test]
    fn test_style_signals() {
        let text = "He quickly ran. She slowly felt the door was opened. He really saw it.";
        let raw = HeuristicAnalyzer::new().analyze_text(text);
        assert!(raw.style.adverb_density > 0.05);
        assert!(raw.style.filter_word_density > 0.03);
        assert!(raw.style.passive_voice_ratio > 0.15);
        assert!(raw.heatmap.sections[0].overall_risk > 0.0);
    }

    #[test]
    fn test_time_marker_and_tension() {
        let raw = HeuristicAnalyzer::new().analyze_text("At dawn they left! Why?");
        assert_eq!(raw.structural.scenes[0].time_marker.as_deref(), Some("dawn"));
        assert_eq!(raw.structural.scenes[0].tension, 1.0);
    }

    #[test]
    fn test_empty_text_is_all_zero() {
        let raw = HeuristicAnalyzer::new().analyze_text("");
        assert_eq!(raw.structural.stats.word_count, 0);
        assert_eq!(raw.structural.stats.avg_sentence_length, 0.0);
        assert_eq!(raw.style.adverb_density, 0.0);
    }
}
