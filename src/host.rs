//! Capability traits the engine consumes from its host application.
//!
//! The engine never depends on concrete editor or view types. A host exposes
//! plain text, selections, rendering, persistence and notices through these
//! seams, and the engine composes them.

use crate::dom::Fragment;
use crate::error::Error;
use crate::types::Selection;

/// Named-blob persistence. Implementations must make `write_blob` appear
/// atomic to any other reader of the same blob.
pub trait BlobStore {
    /// Read a blob. `Ok(None)` means it has never been written.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` when the blob exists but cannot be read.
    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>, Error>;

    /// Replace a blob's contents.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` when the write fails.
    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> Result<(), Error>;
}

/// The dialog that collects comment text from the user.
pub trait CommentPrompt {
    /// Ask for a comment on `selected`. `None` means the user cancelled.
    fn prompt(&mut self, selected: &str) -> Option<String>;
}

/// Access to the current content of documents by identity.
pub trait DocumentSource {
    /// Current markdown source of a document. Hosts may serve this from cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` or `Error::Io`.
    fn read_document(&self, path: &str) -> Result<String, Error>;
}

/// The active editor: selection in plain-text offsets.
pub trait EditorView {
    /// Identity of the document being edited.
    fn document(&self) -> &str;

    /// Current selection, if any.
    fn selection(&self) -> Option<Selection>;
}

/// Markdown rendering into a DOM fragment.
pub trait MarkdownRenderer {
    /// Render `text` as it would appear for `source_path`.
    fn render_markdown(&self, text: &str, source_path: &str) -> Fragment;
}

/// Transient user-visible messages.
pub trait Notifier {
    /// Show a short notice.
    fn notice(&mut self, message: &str);
}

/// Stylesheet registration owned by whichever component needs the style.
pub trait StyleHost {
    /// Install a stylesheet under `id`, replacing any previous one.
    fn add_style(&mut self, id: &str, css: &str);

    /// Remove the stylesheet registered under `id`.
    fn remove_style(&mut self, id: &str);
}
