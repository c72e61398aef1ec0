//! Migration of inline highlight markers into stored comment records.
//!
//! Older notes carried their annotations inside the markdown itself:
//! `%%highlight-start%%TEXT%%highlight-end%%%%comment-start%%COMMENT%%comment-end%%`.
//! Migration strips the markers, renders the cleaned document and locates each
//! highlighted text, in document order, in the rendered plain text.

use regex::Regex;

use crate::config::OverlayClasses;
use crate::host::MarkdownRenderer;
use crate::overlay::plain_text;
use crate::types::{CommentRecord, char_len};

/// Inline marker syntax. Non-greedy, spanning newlines.
const MARKER_PATTERN: &str =
    r"%%highlight-start%%([\s\S]*?)%%highlight-end%%%%comment-start%%([\s\S]*?)%%comment-end%%";

/// One inline marker pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHighlight {
    /// The comment between the comment markers.
    pub comment: String,
    /// Markdown source between the highlight markers.
    pub text: String,
}

/// A document with its markers removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The document with every marker replaced by its highlighted text.
    pub cleaned: String,
    /// Markers in document order.
    pub highlights: Vec<LegacyHighlight>,
}

/// Result of migrating one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// The rewritten document source.
    pub cleaned: String,
    /// Records for every highlight that was located.
    pub records: Vec<CommentRecord>,
    /// Highlights whose text could not be found or whose comment was blank.
    pub unlocated: Vec<LegacyHighlight>,
}

/// Pull all inline markers out of `source`.
///
/// # Panics
///
/// Panics if the hardcoded marker regex is invalid (compile-time invariant).
pub fn extract(source: &str) -> Extraction {
    let pattern = Regex::new(MARKER_PATTERN).expect("valid regex");
    let mut highlights = Vec::new();
    let cleaned = pattern
        .replace_all(source, |caps: &regex::Captures<'_>| {
            let text = caps.get(1).map_or("", |m| return m.as_str());
            let comment = caps.get(2).map_or("", |m| return m.as_str());
            highlights.push(LegacyHighlight { comment: comment.to_string(), text: text.to_string() });
            return text.to_string();
        })
        .into_owned();
    return Extraction { cleaned, highlights };
}

/// Migrate a document: strip markers and build records against the rendered text.
///
/// Each highlight is rendered on its own to get its plain text, then searched
/// for after the end of the previous located highlight. Anything not found is
/// returned in `unlocated` rather than guessed at.
pub fn migrate(
    source: &str,
    path: &str,
    renderer: &dyn MarkdownRenderer,
    classes: &OverlayClasses,
) -> Migration {
    let extraction = extract(source);
    let content = plain_text(&renderer.render_markdown(&extraction.cleaned, path), classes);

    let mut records = Vec::new();
    let mut unlocated = Vec::new();
    let mut cursor_byte = 0usize;

    for highlight in extraction.highlights {
        let needle = plain_text(&renderer.render_markdown(&highlight.text, path), classes);
        let needle = needle.trim();
        let found = content
            .get(cursor_byte..)
            .filter(|_| return !needle.is_empty())
            .and_then(|rest| return rest.find(needle))
            .map(|pos| return cursor_byte.saturating_add(pos));

        let record = found.and_then(|byte_start| {
            let start = content.get(..byte_start).map_or(0, char_len);
            let end = start.saturating_add(char_len(needle));
            return CommentRecord::new(highlight.comment.trim(), start, end).ok().map(|r| return (byte_start, r));
        });

        match record {
            None => {
                tracing::warn!(path, text = %highlight.text, "legacy highlight not located");
                unlocated.push(highlight);
            },
            Some((byte_start, r)) => {
                cursor_byte = byte_start.saturating_add(needle.len());
                records.push(r);
            },
        }
    }

    return Migration { cleaned: extraction.cleaned, records, unlocated };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;
    use crate::dom::Fragment;
    use crate::markdown;

    struct Pulldown;

    impl MarkdownRenderer for Pulldown {
        fn render_markdown(&self, text: &str, _source_path: &str) -> Fragment {
            return markdown::render(text);
        }
    }

    fn marker(text: &str, comment: &str) -> String {
        return format!("%%highlight-start%%{text}%%highlight-end%%%%comment-start%%{comment}%%comment-end%%");
    }

    #[test]
    fn extract_replaces_markers_with_text() {
        let source = format!("The {} fox", marker("quick", "nice adjective"));
        let extraction = extract(&source);

        assert_eq!(extraction.cleaned, "The quick fox");
        assert_eq!(extraction.highlights, [LegacyHighlight {
            comment: "nice adjective".to_string(),
            text: "quick".to_string(),
        }]);
    }

    #[test]
    fn extract_spans_newlines() {
        let source = marker("line one\nline two", "multi\nline");
        let extraction = extract(&source);

        assert_eq!(extraction.cleaned, "line one\nline two");
        assert_eq!(extraction.highlights.first().map(|h| return h.comment.as_str()), Some("multi\nline"));
    }

    #[test]
    fn migrate_locates_highlights_in_rendered_text() {
        let source = format!("# Notes\n\nThe {} fox", marker("**quick**", "bold claim"));
        let migration = migrate(&source, "fox.md", &Pulldown, &OverlayClasses::default());

        assert_eq!(migration.cleaned, "# Notes\n\nThe **quick** fox");
        assert_eq!(migration.records, [CommentRecord { end: 14, start: 9, text: "bold claim".to_string() }]);
        assert!(migration.unlocated.is_empty());
    }

    #[test]
    fn repeated_text_is_located_in_order() {
        let source = format!("{} and {}", marker("fox", "first"), marker("fox", "second"));
        let migration = migrate(&source, "fox.md", &Pulldown, &OverlayClasses::default());

        let starts: Vec<usize> = migration.records.iter().map(|r| return r.start).collect();
        assert_eq!(starts, [0, 8]);
    }

    #[test]
    fn blank_comments_are_left_out() {
        let source = format!("The {} fox", marker("quick", "  "));
        let migration = migrate(&source, "fox.md", &Pulldown, &OverlayClasses::default());

        assert!(migration.records.is_empty());
        assert_eq!(migration.unlocated.len(), 1);
        assert_eq!(migration.cleaned, "The quick fox");
    }

    #[test]
    fn document_without_markers_is_unchanged() {
        let migration = migrate("plain text", "fox.md", &Pulldown, &OverlayClasses::default());
        assert_eq!(migration.cleaned, "plain text");
        assert!(migration.records.is_empty());
    }
}
