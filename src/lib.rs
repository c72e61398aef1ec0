//! Durable highlight comments for markdown documents.
//!
//! Comments live outside the documents, keyed by document identity and
//! plain-text character offsets. On every render they are mapped onto the
//! rendered text and drawn as highlight wrappers, with overlapping comments
//! degraded to point markers.

pub mod capture;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod dom;
pub mod error;
pub mod host;
pub mod legacy;
pub mod mapper;
pub mod markdown;
pub mod overlay;
pub mod pipeline;
pub mod scanner;
pub mod store;
pub mod types;
pub mod vault;
pub mod watch;

pub use error::{Error, ErrorClass};
pub use types::{CommentRecord, Placement, PlacementKind, Selection};
