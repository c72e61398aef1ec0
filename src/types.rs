/// Core domain types for marginalia comments, selections, and placements.
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A comment attached to a character range of a document's plain text.
/// Offsets count Unicode scalar values, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// Exclusive end offset.
    pub end: usize,
    /// Inclusive start offset.
    pub start: usize,
    /// The comment body as the user typed it.
    pub text: String,
}

impl CommentRecord {
    /// Build a record, rejecting empty comment text and empty ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyComment` if `text` is blank,
    /// or `Error::DegenerateRange` if `start >= end`.
    pub fn new(text: &str, start: usize, end: usize) -> Result<Self, Error> {
        if text.trim().is_empty() {
            return Err(Error::EmptyComment);
        }
        if start >= end {
            return Err(Error::DegenerateRange { end, start });
        }
        return Ok(Self {
            end,
            start,
            text: text.to_string(),
        });
    }

    /// Whether the range still fits inside content of `len` characters.
    pub const fn fits(&self, len: usize) -> bool {
        return self.start < self.end && self.end <= len;
    }
}

/// How a placement is drawn in the rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    /// Zero-width marker at `start`, used when the range lost ownership to an earlier comment.
    Point,
    /// Wrap `start..end` in a highlight container.
    Range,
}

/// A resolved instruction to wrap or mark a span of rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Exclusive end offset. Equal to `start` for point placements.
    pub end: usize,
    /// Position of the record in the document's comment list.
    pub index: usize,
    /// Range or point.
    pub kind: PlacementKind,
    /// Inclusive start offset.
    pub start: usize,
    /// Comment body carried onto the highlight.
    pub text: String,
}

/// Text selected in an editor view, with plain-text offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Exclusive end offset.
    pub end: usize,
    /// Inclusive start offset.
    pub start: usize,
    /// The selected text itself.
    pub text: String,
}

impl Selection {
    /// True when nothing meaningful is selected.
    pub fn is_empty(&self) -> bool {
        return self.start >= self.end || self.text.is_empty();
    }
}

/// Character length of a string, the unit all offsets are measured in.
pub fn char_len(text: &str) -> usize {
    return text.chars().count();
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_range() {
        let err = CommentRecord::new("note", 4, 4).unwrap_err();
        assert!(matches!(err, Error::DegenerateRange { start: 4, end: 4 }));
        assert_eq!(err.to_string(), "empty range 4..4");
    }

    #[test]
    fn rejects_blank_comment() {
        let err = CommentRecord::new("   ", 0, 3).unwrap_err();
        assert!(matches!(err, Error::EmptyComment));
    }

    #[test]
    fn fits_checks_upper_bound() {
        let record = CommentRecord::new("c", 2, 6).unwrap();
        assert!(record.fits(6));
        assert!(!record.fits(5));
    }

    #[test]
    fn offsets_count_chars() {
        assert_eq!(char_len("héllo"), 5);
    }
}
