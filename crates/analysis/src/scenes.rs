use chunkcache_index::TextRange;
use once_cell::sync::Lazy;
use regex::Regex;

/// A line holding only a scene break marker: `***`, `* * *`, `#`, `---`, `~~~`
static SCENE_BREAK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:\*[ \t]*\*[ \t]*\*|#|-{3,}|~{3,})[ \t]*(?:\r?\n|$)")
        .expect("valid scene break pattern")
});

/// Split chapter text into scene ranges.
///
/// The ranges partition `text`: they are contiguous, start at 0 and end at
/// `text.len()`. A break line belongs to the scene it closes. Empty text
/// yields no scenes; text without breaks is a single scene.
#[must_use]
pub fn split_scenes(text: &str) -> Vec<TextRange> {
    if text.is_empty() {
        return Vec::new();
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    for found in SCENE_BREAK.find_iter(text) {
        let end = found.end();
        if end > start && !text[start..found.start()].trim().is_empty() {
            ranges.push(TextRange::new(start, end));
            start = end;
        }
    }
    if start < text.len() {
        if text[start..].trim().is_empty() {
            // Trailing whitespace after the last break joins the last scene.
            match ranges.last_mut() {
                Some(last) => last.end = text.len(),
                None => ranges.push(TextRange::new(start, text.len())),
            }
        } else {
            ranges.push(TextRange::new(start, text.len()));
        }
    } else if let Some(last) = ranges.last_mut() {
        last.end = text.len();
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_partition(text: &str, ranges: &[TextRange]) {
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(text.len()));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_no_breaks_is_one_scene() {
        let text = "She opened the door.\nNobody was there.";
        assert_eq!(split_scenes(text), vec![TextRange::new(0, text.len())]);
    }

    #[test]
    fn test_empty_text_has_no_scenes() {
        assert!(split_scenes("").is_empty());
    }

    #[test]
    fn test_breaks_partition_text() {
        let text = "First scene.\n***\nSecond scene.\n* * *\nThird scene.\n";
        let ranges = split_scenes(text);
        assert_eq!(ranges.len(), 3);
        assert_partition(text, &ranges);
        assert!(ranges[0].slice(text).unwrap().starts_with("First"));
        assert!(ranges[1].slice(text).unwrap().starts_with("Second"));
        assert!(ranges[2].slice(text).unwrap().starts_with("Third"));
    }

    #[test]
    fn test_leading_and_doubled_breaks_do_not_make_empty_scenes() {
        let text = "***\nOpening.\n#\n\n---\nClosing.";
        let ranges = split_scenes(text);
        assert_eq!(ranges.len(), 2);
        assert_partition(text, &ranges);
    }

    #[test]
    fn test_trailing_break_joins_last_scene() {
        let text = "Only scene.\n***\n\n";
        let ranges = split_scenes(text);
        assert_eq!(ranges, vec![TextRange::new(0, text.len())]);
    }
}
