use crate::intelligence::{EntityKind, ManuscriptIntelligence};
use chunkcache_index::ChunkAnalysis;
use std::collections::BTreeSet;

const PASSIVE_VOICE_THRESHOLD: f64 = 0.15;
const ADVERB_THRESHOLD: f64 = 0.05;
const FILTER_WORD_THRESHOLD: f64 = 0.03;
const LONG_SENTENCE_WORDS: f64 = 30.0;
const SHORT_SENTENCE_WORDS: f64 = 10.0;

/// Convert a rich analyzer record into the compact per-chunk record.
///
/// Pure and deterministic; `processed_at_ms` is left at 0 for the index to stamp.
#[must_use]
pub fn intelligence_to_chunk_analysis(raw: &ManuscriptIntelligence) -> ChunkAnalysis {
    let stats = &raw.structural.stats;

    let tensions: Vec<f64> = raw.structural.scenes.iter().map(|s| s.tension).collect();
    let risks: Vec<f64> = raw.heatmap.sections.iter().map(|s| s.overall_risk).collect();

    let names_of = |kind: EntityKind| -> BTreeSet<String> {
        raw.entities
            .nodes
            .iter()
            .filter(|node| node.kind == kind)
            .map(|node| node.name.clone())
            .collect()
    };

    let time_markers: BTreeSet<String> = raw
        .structural
        .scenes
        .iter()
        .filter_map(|scene| scene.time_marker.clone())
        .collect();

    let open_promises: BTreeSet<String> = raw
        .timeline
        .promises
        .iter()
        .filter(|promise| !promise.resolved)
        .map(|promise| promise.description.clone())
        .collect();

    ChunkAnalysis {
        summary: format!(
            "{} words, {:.0}% dialogue",
            stats.word_count,
            stats.dialogue_ratio * 100.0
        ),
        word_count: stats.word_count,
        dialogue_ratio: stats.dialogue_ratio,
        avg_tension: mean(&tensions),
        character_names: names_of(EntityKind::Character),
        location_names: names_of(EntityKind::Location),
        time_markers,
        open_promises,
        style_flags: style_flags(raw),
        risk_score: mean(&risks),
        structural: serde_json::to_value(&raw.structural).ok(),
        entities: serde_json::to_value(&raw.entities).ok(),
        style: serde_json::to_value(&raw.style).ok(),
        processed_at_ms: 0,
    }
}

/// Independent threshold checks, in a fixed order
fn style_flags(raw: &ManuscriptIntelligence) -> Vec<String> {
    let style = &raw.style;
    let avg_sentence = raw.structural.stats.avg_sentence_length;

    let mut flags = Vec::new();
    if style.passive_voice_ratio > PASSIVE_VOICE_THRESHOLD {
        flags.push("passive_voice_heavy".to_string());
    }
    if style.adverb_density > ADVERB_THRESHOLD {
        flags.push("adverb_overuse".to_string());
    }
    if style.filter_word_density > FILTER_WORD_THRESHOLD {
        flags.push("filter_words".to_string());
    }
    if avg_sentence > LONG_SENTENCE_WORDS {
        flags.push("long_sentences".to_string());
    } else if avg_sentence < SHORT_SENTENCE_WORDS {
        flags.push("short_sentences".to_string());
    }
    flags
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    values.iter().sum::<f64>() / len
}
