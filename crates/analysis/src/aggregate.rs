use crate::convert::mean;
use chunkcache_index::ChunkAnalysis;

/// Summary used when there is nothing to aggregate
pub const NO_DATA_SUMMARY: &str = "No data";

/// Merge the analyses of a parent's immediate children into one record.
///
/// Sums word counts, takes the unweighted mean of the ratio fields and
/// unions the string sets. Never looks below the given children;
/// multi-level rollups call this once per level, bottom-up.
///
/// The opaque `structural`, `entities` and `style` payloads are never read
/// here and stay on the leaf records that produced them; a parent's copies
/// are always `None`.
#[must_use]
pub fn aggregate(children: &[&ChunkAnalysis]) -> ChunkAnalysis {
    if children.is_empty() {
        return no_data();
    }

    let word_count: usize = children.iter().map(|c| c.word_count).sum();
    let field_mean = |f: fn(&ChunkAnalysis) -> f64| -> f64 {
        let values: Vec<f64> = children.iter().map(|c| f(c)).collect();
        mean(&values)
    };

    let mut merged = ChunkAnalysis {
        summary: summary_line(children.len(), word_count),
        word_count,
        dialogue_ratio: field_mean(|c| c.dialogue_ratio),
        avg_tension: field_mean(|c| c.avg_tension),
        risk_score: field_mean(|c| c.risk_score),
        ..ChunkAnalysis::default()
    };

    for child in children {
        merged
            .character_names
            .extend(child.character_names.iter().cloned());
        merged
            .location_names
            .extend(child.location_names.iter().cloned());
        merged.time_markers.extend(child.time_markers.iter().cloned());
        merged
            .open_promises
            .extend(child.open_promises.iter().cloned());
        for flag in &child.style_flags {
            if !merged.style_flags.contains(flag) {
                merged.style_flags.push(flag.clone());
            }
        }
    }

    merged
}

/// Convenience over owned records
#[must_use]
pub fn aggregate_owned(children: &[ChunkAnalysis]) -> ChunkAnalysis {
    let refs: Vec<&ChunkAnalysis> = children.iter().collect();
    aggregate(&refs)
}

/// The zero-children sentinel: "No data", zeros, empty sets
#[must_use]
pub fn no_data() -> ChunkAnalysis {
    ChunkAnalysis {
        summary: NO_DATA_SUMMARY.to_string(),
        ..ChunkAnalysis::default()
    }
}

fn summary_line(parts: usize, words: usize) -> String {
    if parts == 1 {
        format!("1 part, {words} words")
    } else {
        format!("{parts} parts, {words} words")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn child(words: usize, dialogue: f64, tension: f64, risk: f64) -> ChunkAnalysis {
        ChunkAnalysis {
            summary: format!("{words} words"),
            word_count: words,
            dialogue_ratio: dialogue,
            avg_tension: tension,
            risk_score: risk,
            ..ChunkAnalysis::default()
        }
    }

    #[test]
    fn test_zero_children_is_sentinel() {
        let merged = aggregate(&[]);
        assert_eq!(merged, no_data());
        assert_eq!(merged.summary, "No data");
        assert_eq!(merged.word_count, 0);
        assert_eq!(merged.dialogue_ratio, 0.0);
        assert!(merged.character_names.is_empty());
        assert!(merged.style_flags.is_empty());
    }

    #[test]
    fn test_single_child_identity() {
        let only = child(321, 0.37, 0.81, 0.13);
        let merged = aggregate(&[&only]);
        assert_eq!(merged.dialogue_ratio, only.dialogue_ratio);
        assert_eq!(merged.avg_tension, only.avg_tension);
        assert_eq!(merged.risk_score, only.risk_score);
        assert_eq!(merged.word_count, 321);
        assert!(merged.summary.contains("321 words"));
    }

    #[test]
    fn test_word_counts_sum_and_ratios_average_unweighted() {
        let a = child(100, 0.5, 0.2, 0.0);
        let b = child(50, 0.1, 0.6, 1.0);
        let merged = aggregate(&[&a, &b]);
        assert_eq!(merged.word_count, 150);
        assert!(merged.summary.contains("150 words"));
        assert!((merged.dialogue_ratio - 0.3).abs() < 1e-9);
        assert!((merged.avg_tension - 0.4).abs() < 1e-9);
        assert!((merged.risk_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_sets_are_unioned_without_duplicates() {
        let mut a = child(10, 0.0, 0.0, 0.0);
        a.character_names.insert("Mara".to_string());
        a.time_markers.insert("dawn".to_string());
        a.style_flags = vec!["filter_words".to_string(), "long_sentences".to_string()];
        a.structural = Some(serde_json::json!({ "opaque": true }));

        let mut b = child(10, 0.0, 0.0, 0.0);
        b.character_names.insert("Mara".to_string());
        b.character_names.insert("Ilya".to_string());
        b.open_promises.insert("the letter".to_string());
        b.style_flags = vec!["long_sentences".to_string(), "adverb_overuse".to_string()];
        b.entities = Some(serde_json::json!(["Mara", "Ilya"]));

        let merged = aggregate(&[&a, &b]);
        assert_eq!(
            merged.character_names.iter().collect::<Vec<_>>(),
            vec!["Ilya", "Mara"]
        );
        assert_eq!(merged.time_markers.len(), 1);
        assert_eq!(merged.open_promises.len(), 1);
        assert_eq!(
            merged.style_flags,
            vec!["filter_words", "long_sentences", "adverb_overuse"]
        );
    }

    #[test]
    fn test_opaque_payloads_stay_on_leaves() {
        let mut a = child(10, 0.0, 0.0, 0.0);
        a.structural = Some(serde_json::json!({ "opaque": true }));
        a.style = Some(serde_json::json!({ "voice": "close third" }));
        let mut b = child(5, 0.0, 0.0, 0.0);
        b.entities = Some(serde_json::json!(["Mara"]));

        let merged = aggregate(&[&a, &b]);
        assert_eq!(merged.structural, None);
        assert_eq!(merged.entities, None);
        assert_eq!(merged.style, None);
        assert_eq!(a.structural, Some(serde_json::json!({ "opaque": true })));
    }

    #[test]
    fn test_two_level_rollup_uses_only_immediate_children() {
        let scenes = [child(100, 0.0, 0.0, 0.0), child(50, 0.0, 0.0, 0.0)];
        let chapter_one = aggregate_owned(&scenes);
        let chapter_two = aggregate_owned(&[child(25, 0.0, 0.0, 0.0)]);
        let book = aggregate(&[&chapter_one, &chapter_two]);
        assert_eq!(book.word_count, 175);
        assert!(book.summary.contains("175 words"));
        assert!(book.summary.starts_with("2 parts"));
    }
}
