/// Crate-level error types for marginalia diagnostics.
use std::path::PathBuf;

/// Coarse grouping of errors, used by hosts to decide how to surface them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The persisted comment blob exists but cannot be parsed.
    CorruptStore,
    /// Anything else: config, watcher, document lookup.
    Runtime,
    /// Reading or writing the persistent store failed.
    Storage,
    /// The user's input was rejected before any state changed.
    Validation,
}

/// All errors in marginalia carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the blob, document, or offsets involved.
#[allow(clippy::error_impl_error, reason = "crate-level error type re-exported from lib")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `.marginalia.toml` exists but is not valid TOML for the config schema.
    #[error("config invalid: {}: {reason}", path.display())]
    ConfigInvalid {
        /// Path to the config file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The comment store blob exists but does not deserialize.
    #[error("comment store corrupt: {blob}: {reason}")]
    CorruptStore {
        /// Name of the blob that failed to parse.
        blob: String,
        /// Parser message.
        reason: String,
    },

    /// A range whose start is not before its end, before any document is consulted.
    #[error("empty range {start}..{end}")]
    DegenerateRange {
        /// Exclusive end offset.
        end: usize,
        /// Inclusive start offset.
        start: usize,
    },

    /// A document path does not exist in the vault.
    #[error("document not found: {}", path.display())]
    DocumentNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The comment prompt returned only whitespace.
    #[error("comment text is empty")]
    EmptyComment,

    /// No text is selected in the active view.
    #[error("selection is empty")]
    EmptySelection,

    /// Offsets do not describe a non-empty range inside the document.
    #[error("invalid range {start}..{end} (document has {len} characters)")]
    InvalidRange {
        /// Exclusive end offset.
        end: usize,
        /// Character length of the document's plain text.
        len: usize,
        /// Inclusive start offset.
        start: usize,
    },

    /// Underlying I/O error outside the comment store.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// No comment exists at the requested position.
    #[error("no comment #{index} on {path}")]
    NoSuchComment {
        /// Zero-based position in the document's list.
        index: usize,
        /// Document identity.
        path: String,
    },

    /// Quoted selection text does not occur in the document.
    #[error("quote not found in {path}: `{quote}`")]
    QuoteNotFound {
        /// Document identity.
        path: String,
        /// The text that was searched for.
        quote: String,
    },

    /// Serializing the comment map failed.
    #[error("json serialize: {0}")]
    Serialize(
        /// The wrapped serde error.
        #[from]
        serde_json::Error,
    ),

    /// Reading or writing the persistent store failed.
    #[error("storage: {blob}: {source}")]
    Storage {
        /// Name of the blob being read or written.
        blob: String,
        /// The wrapped I/O error.
        source: std::io::Error,
    },

    /// The filesystem watcher could not be created or attached.
    #[error("watch setup failed: {reason}")]
    WatchFailed {
        /// Description of the watcher failure.
        reason: String,
    },
}

impl Error {
    /// Classify this error for notice routing and exit codes.
    pub const fn class(&self) -> ErrorClass {
        return match self {
            Self::CorruptStore { .. } => ErrorClass::CorruptStore,
            Self::DegenerateRange { .. }
            | Self::EmptyComment
            | Self::EmptySelection
            | Self::InvalidRange { .. }
            | Self::QuoteNotFound { .. } => {
                ErrorClass::Validation
            },
            Self::Storage { .. } => ErrorClass::Storage,
            Self::ConfigInvalid { .. }
            | Self::DocumentNotFound { .. }
            | Self::Io(_)
            | Self::NoSuchComment { .. }
            | Self::Serialize(_)
            | Self::WatchFailed { .. } => ErrorClass::Runtime,
        };
    }
}
