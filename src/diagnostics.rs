use std::fmt::Write as _;

use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is one,
/// how to fix it.
pub fn render_error(e: &Error) -> String {
    match e {
        Error::CorruptStore { blob, reason } => render_corrupt_store(blob, reason),
        Error::DegenerateRange { end, start } => render_degenerate_range(*start, *end),
        Error::DocumentNotFound { path } => render_document_not_found(&path.display().to_string()),
        Error::InvalidRange { end, len, start } => render_invalid_range(*start, *end, *len),
        Error::NoSuchComment { index, path } => render_no_such_comment(*index, path),
        Error::QuoteNotFound { path, quote } => render_quote_not_found(path, quote),
        Error::Storage { blob, source } => render_storage(blob, source),
        _ => render_generic(e),
    }
}

fn render_generic(e: &Error) -> String {
    match e {
        Error::ConfigInvalid { path, reason } => format!("\
# Error: Invalid Config

`{}`: {reason}

## Fix

Correct the file or delete it to use the defaults.
", path.display()),

        Error::EmptyComment => "\
# Error: Empty Comment

A comment needs some text. Nothing was saved.
".to_string(),

        Error::EmptySelection => "\
# Error: Nothing Selected

Pass `--quote <text>` or `--start <n> --end <n>` to choose the text to comment on.
".to_string(),

        Error::WatchFailed { reason } => format!("\
# Error: Watch Failed

{reason}
"),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),
        // Already handled in render_error, but need exhaustive match.
        _ => format!("\
# Error

{e}
"),
    }
}

fn render_corrupt_store(blob: &str, reason: &str) -> String {
    format!("\
# Error: Comment Store Corrupt

`{blob}` could not be parsed: {reason}

Comments were not loaded and nothing was written.

## Fix

Repair the JSON by hand, or move the file aside to start over.
")
}

fn render_degenerate_range(start: usize, end: usize) -> String {
    format!("\
# Error: Empty Range

`{start}..{end}` selects nothing. The start must come before the end.
")
}

fn render_document_not_found(path: &str) -> String {
    format!("\
# Error: Document Not Found

`{path}` does not exist in the vault.

## Fix

Document paths are relative to the vault root:

    marginalia list
")
}

fn render_invalid_range(start: usize, end: usize, len: usize) -> String {
    format!("\
# Error: Invalid Range

`{start}..{end}` is not a non-empty range inside the document ({len} characters).

## Fix

Print the document's text with offsets:

    marginalia text <path>
")
}

fn render_no_such_comment(index: usize, path: &str) -> String {
    format!("\
# Error: No Such Comment

`{path}` has no comment #{index}.

## Fix

List the document's comments:

    marginalia list {path}
")
}

fn render_quote_not_found(path: &str, quote: &str) -> String {
    let mut out = format!("\
# Error: Quote Not Found

`{quote}` does not occur in the rendered text of `{path}`.
");
    if quote.contains(['*', '_', '`', '[']) {
        out.push_str("\nQuotes match the rendered text, so leave markdown syntax out.\n");
    }
    let _ = write!(out, "\n## Fix\n\n    marginalia text {path}\n");
    out
}

fn render_storage(blob: &str, source: &std::io::Error) -> String {
    format!("\
# Error: Storage

`{blob}`: {source}

Comments added in this session may not have been saved.
")
}
