use serde::Serialize;

/// One `# ` section of a manuscript file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterText {
    /// `ch1`, `ch2`, ... in file order
    pub key: String,
    pub title: String,
    /// Body below the heading line; cursor offsets are relative to this
    pub text: String,
}

/// Split a manuscript on lines starting with `# `.
///
/// Text before the first heading becomes an untitled first chapter unless it
/// is blank. A file without headings is a single chapter.
#[must_use]
pub fn split_chapters(source: &str) -> Vec<ChapterText> {
    let mut sections: Vec<(String, String)> = Vec::new();
    let mut title: Option<String> = None;
    let mut body = String::new();

    for line in source.split_inclusive('\n') {
        if let Some(heading) = line.strip_prefix("# ") {
            if title.is_some() || !body.trim().is_empty() {
                sections.push((title.take().unwrap_or_default(), std::mem::take(&mut body)));
            }
            body.clear();
            title = Some(heading.trim().to_string());
            continue;
        }
        body.push_str(line);
    }
    if title.is_some() || !body.trim().is_empty() {
        sections.push((title.unwrap_or_default(), body));
    }

    sections
        .into_iter()
        .enumerate()
        .map(|(i, (title, text))| ChapterText {
            key: format!("ch{}", i + 1),
            title,
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn headings_start_numbered_chapters() {
        let chapters = split_chapters("# Arrival\nThey came.\n# Departure\nThey left.\n");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].key, "ch1");
        assert_eq!(chapters[0].title, "Arrival");
        assert_eq!(chapters[0].text, "They came.\n");
        assert_eq!(chapters[1].key, "ch2");
        assert_eq!(chapters[1].text, "They left.\n");
    }

    #[test]
    fn preamble_becomes_untitled_chapter() {
        let chapters = split_chapters("Prologue text.\n# One\nBody.\n");
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title, "");
        assert_eq!(chapters[0].text, "Prologue text.\n");
        assert_eq!(chapters[1].title, "One");
    }

    #[test]
    fn blank_preamble_is_dropped() {
        let chapters = split_chapters("\n\n# One\nBody.\n");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].key, "ch1");
    }

    #[test]
    fn scene_break_hash_is_not_a_heading() {
        let chapters = split_chapters("# One\nFirst.\n#\nSecond.\n");
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].text, "First.\n#\nSecond.\n");
    }

    #[test]
    fn empty_file_has_no_chapters() {
        assert!(split_chapters("").is_empty());
    }
}
