//! Comment capture: selection, prompt, record, store.

use crate::error::Error;
use crate::host::{BlobStore, CommentPrompt, EditorView, Notifier};
use crate::store::CommentStore;
use crate::types::CommentRecord;

/// Command identifier a host registers for comment capture.
pub const ADD_COMMENT_COMMAND: &str = "add-highlight-and-comment";

/// Human-readable command name.
pub const ADD_COMMENT_COMMAND_NAME: &str = "Add Highlight and Comment";

/// What a capture attempt ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The user dismissed the dialog; nothing changed.
    Cancelled,
    /// A record was stored for this document.
    Saved {
        /// Document identity.
        path: String,
        /// The stored record.
        record: CommentRecord,
    },
}

/// Run the "Add Highlight and Comment" command against the active editor.
///
/// Validation failures and storage failures are both shown as notices and
/// returned. After a storage failure the record is still cached in `store`.
///
/// # Errors
///
/// Returns `Error::EmptySelection`, `Error::EmptyComment`, or the store's save error.
pub fn add_highlight_and_comment<B: BlobStore>(
    editor: &dyn EditorView,
    prompt: &mut dyn CommentPrompt,
    notifier: &mut dyn Notifier,
    store: &mut CommentStore<B>,
) -> Result<CaptureOutcome, Error> {
    let Some(selection) = editor.selection().filter(|s| return !s.is_empty()) else {
        notifier.notice("Select some text to comment on first.");
        return Err(Error::EmptySelection);
    };

    let Some(text) = prompt.prompt(&selection.text) else {
        tracing::debug!("comment prompt cancelled");
        return Ok(CaptureOutcome::Cancelled);
    };

    let record = match CommentRecord::new(text.trim(), selection.start, selection.end) {
        Err(e) => {
            notifier.notice(&format!("Comment not added: {e}"));
            return Err(e);
        },
        Ok(r) => r,
    };

    let path = editor.document().to_string();
    if let Err(e) = store.add_comment(&path, record.clone()) {
        notifier.notice(&format!("Comment may not have been saved: {e}"));
        return Err(e);
    }
    tracing::info!(path = %path, start = record.start, end = record.end, "comment captured");
    return Ok(CaptureOutcome::Saved { path, record });
}
