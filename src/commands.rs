//! CLI commands for marginalia: add, list, text, render, migrate, remove.

use std::path::Path;

use crate::capture::{self, CaptureOutcome};
use crate::error::Error;
use crate::host::{DocumentSource as _, MarkdownRenderer as _};
use crate::legacy;
use crate::overlay::{self, ScopedStyle};
use crate::pipeline::render_document;
use crate::scanner;
use crate::types::CommentRecord;
use crate::vault::{ArgPrompt, ArgSelection, Vault};

/// Characters per line when printing plain text with offsets.
const TEXT_WIDTH: usize = 64;

/// How the `add` command picks its selection.
pub enum Target {
    /// Explicit character offsets.
    Offsets {
        /// Exclusive end.
        end: usize,
        /// Inclusive start.
        start: usize,
    },
    /// The n-th occurrence (1-based) of a quoted string.
    Quote {
        /// Which occurrence to select.
        occurrence: usize,
        /// Text to find in the rendered document.
        text: String,
    },
}

/// Attach a comment to a selection of `document`.
///
/// # Errors
///
/// Returns selection, validation, or storage errors from the capture flow.
pub fn add(root: &Path, document: &str, target: Target, comment: Option<String>) -> Result<(), Error> {
    let mut vault = Vault::open(root)?;
    let document = vault.document(document)?;
    let mut store = vault.open_store()?;
    let content = vault.plain_text(&document)?;

    let editor = match target {
        Target::Offsets { end, start } => ArgSelection::from_offsets(&document, &content, start, end)?,
        Target::Quote { occurrence, text } => ArgSelection::from_quote(&document, &content, &text, occurrence)?,
    };

    let mut prompt = ArgPrompt::new(comment);
    match capture::add_highlight_and_comment(&editor, &mut prompt, &mut vault, &mut store)? {
        CaptureOutcome::Cancelled => eprintln!("cancelled, nothing saved"),
        CaptureOutcome::Saved { path, record } => {
            let index = store.comments(&path).len().saturating_sub(1);
            println!("Added comment #{index} to {path} ({}..{})", record.start, record.end);
        },
    }
    return Ok(());
}

/// Format one record for listing, quoting the text it currently covers.
/// `content` is `None` when the document could not be read.
fn describe_record(index: usize, record: &CommentRecord, content: Option<&str>) -> String {
    let quoted = match content {
        None => "(document missing)".to_string(),
        Some(c) if !record.fits(c.chars().count()) => "(out of range)".to_string(),
        Some(c) => {
            let text: String = c.chars().skip(record.start).take(record.end.saturating_sub(record.start)).collect();
            format!("\"{text}\"")
        },
    };
    return format!("  #{index}  {}..{}  {quoted}  {}", record.start, record.end, record.text);
}

/// Print stored comments, for one document or all of them.
///
/// # Errors
///
/// Returns store loading errors.
pub fn list(root: &Path, document: Option<&str>) -> Result<(), Error> {
    let vault = Vault::open(root)?;
    let store = vault.open_store()?;
    let documents: Vec<String> = match document {
        Some(d) => vec![vault.document(d)?],
        None => store.documents().map(str::to_string).collect(),
    };

    if documents.iter().all(|d| return store.comments(d).is_empty()) {
        println!("No comments.");
        return Ok(());
    }

    for document in &documents {
        let records = store.comments(document);
        if records.is_empty() {
            continue;
        }
        println!("{document}");
        let content = vault.plain_text(document);
        if let Err(e) = &content {
            tracing::debug!(document, error = %e, "document unreadable while listing");
        }
        let content = content.ok();
        for (index, record) in records.iter().enumerate() {
            println!("{}", describe_record(index, record, content.as_deref()));
        }
    }
    return Ok(());
}

/// Migrate inline highlight markers in `document` into stored comments.
///
/// Records are stored in one write before the document is rewritten, so a
/// failed save leaves the markers in place and stores nothing.
///
/// # Errors
///
/// Returns document read, store, or write errors.
pub fn migrate(root: &Path, document: &str, dry_run: bool) -> Result<(), Error> {
    let vault = Vault::open(root)?;
    let document = vault.document(document)?;
    let source = vault.read_document(&document)?;
    let migration = legacy::migrate(&source, &document, &vault, &vault.config().classes);

    if migration.records.is_empty() && migration.unlocated.is_empty() {
        println!("No inline highlights in {document}");
        return Ok(());
    }

    for highlight in &migration.unlocated {
        eprintln!("not migrated: \"{}\" ({})", highlight.text, highlight.comment);
    }
    if dry_run {
        let cleaned = overlay::plain_text(&vault.render_markdown(&migration.cleaned, &document), &vault.config().classes);
        for (index, record) in migration.records.iter().enumerate() {
            println!("{}", describe_record(index, record, Some(&cleaned)));
        }
        return Ok(());
    }

    let mut store = vault.open_store()?;
    let migrated = migration.records.len();
    store.add_comments(&document, migration.records)?;
    vault.write_document(&document, &migration.cleaned)?;
    println!("Migrated {migrated} highlights in {document} ({} not located)", migration.unlocated.len());
    return Ok(());
}

/// Delete one comment.
///
/// # Errors
///
/// Returns `Error::NoSuchComment` or storage errors.
pub fn remove(root: &Path, document: &str, index: usize) -> Result<(), Error> {
    let vault = Vault::open(root)?;
    let document = vault.document(document)?;
    let mut store = vault.open_store()?;
    let removed = store.remove_comment(&document, index)?;
    println!("Removed comment #{index} from {document}: {}", removed.text);
    return Ok(());
}

/// Render documents with their comments overlaid.
///
/// With `stdout`, the single page is printed instead of written to the output
/// directory. Without a document, every discovered document is rendered.
///
/// # Errors
///
/// Returns store loading, document read, or output write errors.
pub fn render(root: &Path, document: Option<&str>, stdout: bool) -> Result<(), Error> {
    let mut vault = Vault::open(root)?;
    let store = vault.open_store()?;
    let classes = vault.config().classes.clone();
    let documents = match document {
        Some(d) => vec![vault.document(d)?],
        None => scanner::discover(root, vault.config()),
    };

    let style = ScopedStyle::acquire(&mut vault, &classes);
    let mut result = Ok(());
    for document in &documents {
        let rendered = render_document(&vault, &store, document, &classes).and_then(|(fragment, report)| {
            if stdout {
                print!("{}", vault.page(document, &fragment));
                return Ok(());
            }
            let path = vault.write_page(document, &fragment)?;
            eprintln!(
                "rendered {document} -> {} ({} highlighted, {} marked, {} skipped)",
                path.display(),
                report.ranges,
                report.points,
                report.skipped
            );
            return Ok(());
        });
        if let Err(e) = rendered {
            result = Err(e);
            break;
        }
    }
    style.release(&mut vault);
    return result;
}

/// Print a document's rendered plain text with character offsets.
///
/// # Errors
///
/// Returns `Error::DocumentNotFound` or `Error::Io`.
pub fn text(root: &Path, document: &str) -> Result<(), Error> {
    let vault = Vault::open(root)?;
    let document = vault.document(document)?;
    let source = vault.read_document(&document)?;
    let content = overlay::plain_text(&vault.render_markdown(&source, &document), &vault.config().classes);
    for line in offset_lines(&content, TEXT_WIDTH) {
        println!("{line}");
    }
    return Ok(());
}

/// Split `content` into fixed-width lines, each prefixed with its starting offset.
fn offset_lines(content: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    return chars
        .chunks(width.max(1))
        .enumerate()
        .map(|(n, chunk)| {
            let offset = n.saturating_mul(width.max(1));
            let text: String = chunk.iter().map(|c| return if *c == '\n' { ' ' } else { *c }).collect();
            return format!("{offset:>6}  {text}");
        })
        .collect();
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;

    #[test]
    fn offset_lines_prefix_each_chunk() {
        let lines = offset_lines("abcdefgh", 3);
        assert_eq!(lines, ["     0  abc", "     3  def", "     6  gh"]);
    }

    #[test]
    fn describe_quotes_covered_text() {
        let record = CommentRecord { end: 9, start: 4, text: "nice adjective".to_string() };
        assert_eq!(describe_record(0, &record, Some("The quick fox")), "  #0  4..9  \"quick\"  nice adjective");
        assert_eq!(describe_record(0, &record, Some("The")), "  #0  4..9  (out of range)  nice adjective");
        assert_eq!(describe_record(0, &record, None), "  #0  4..9  (document missing)  nice adjective");
    }
}
