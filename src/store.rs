//! Comment persistence: the in-memory cache and the single blob behind it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::host::BlobStore;
use crate::types::CommentRecord;

/// Blob name, relative to the vault root, used when `.marginalia.toml` does not set `store`.
pub const DEFAULT_BLOB: &str = ".marginalia/comments.json";

/// Serialized shape of the blob: document identity to ordered comments.
/// `BTreeMap` keeps keys sorted so the file diffs cleanly.
pub type CommentMap = BTreeMap<String, Vec<CommentRecord>>;

/// Blob storage on the local filesystem, one file per blob name under `root`.
pub struct FsBlobStore {
    /// Directory blob names are resolved against.
    root: PathBuf,
}

impl FsBlobStore {
    /// Store blobs relative to `root`.
    pub fn new(root: &Path) -> Self {
        return Self { root: root.to_path_buf() };
    }

    /// Full path for a blob name.
    fn path_for(&self, name: &str) -> PathBuf {
        return self.root.join(name);
    }
}

impl BlobStore for FsBlobStore {
    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>, Error> {
        return match std::fs::read(self.path_for(name)) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(Error::Storage { blob: name.to_string(), source }),
            Ok(bytes) => Ok(Some(bytes)),
        };
    }

    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> Result<(), Error> {
        let path = self.path_for(name);
        return write_atomically(&path, bytes).map_err(|source| {
            return Error::Storage { blob: name.to_string(), source };
        });
    }
}

/// In-memory blob storage for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    /// Blob contents by name.
    pub blobs: BTreeMap<String, Vec<u8>>,
}

impl BlobStore for MemoryBlobStore {
    fn read_blob(&self, name: &str) -> Result<Option<Vec<u8>>, Error> {
        return Ok(self.blobs.get(name).cloned());
    }

    fn write_blob(&mut self, name: &str, bytes: &[u8]) -> Result<(), Error> {
        self.blobs.insert(name.to_string(), bytes.to_vec());
        return Ok(());
    }
}

/// Write `bytes` to a sibling temp file, then rename over `path`.
/// Readers see either the old contents or the new, never a partial file.
///
/// # Errors
///
/// Returns the underlying I/O error from directory creation, write, or rename.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    std::fs::write(&tmp, bytes)?;
    return std::fs::rename(&tmp, path);
}

/// Owner of every comment. The blob is the source of truth; the map is a
/// cache filled by `load` and refreshed only by `reload`.
pub struct CommentStore<B: BlobStore> {
    /// Persistence backend.
    backend: B,
    /// Blob name within the backend.
    blob: String,
    /// Cached mapping.
    comments: CommentMap,
}

impl<B: BlobStore> CommentStore<B> {
    /// Create a store with an empty cache. Call `load` to populate it.
    pub fn new(backend: B, blob: &str) -> Self {
        return Self {
            backend,
            blob: blob.to_string(),
            comments: CommentMap::new(),
        };
    }

    /// Create a store and load it immediately.
    ///
    /// # Errors
    ///
    /// Same as `load`.
    pub fn open(backend: B, blob: &str) -> Result<Self, Error> {
        let mut store = Self::new(backend, blob);
        store.load()?;
        return Ok(store);
    }

    /// Append a comment to `path` and write through.
    ///
    /// The cache is updated before the write, so a failed save still leaves the
    /// record visible for the rest of the session.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` or `Error::Serialize` if the save fails.
    pub fn add_comment(&mut self, path: &str, record: CommentRecord) -> Result<(), Error> {
        self.comments.entry(path.to_string()).or_default().push(record);
        tracing::debug!(path, "comment added");
        return self.save();
    }

    /// Append several comments to `path` with a single write.
    ///
    /// Either every record reaches the blob or none does, so a caller that
    /// retries after a failure does not store duplicates.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` or `Error::Serialize` if the save fails.
    pub fn add_comments(&mut self, path: &str, records: Vec<CommentRecord>) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        let count = records.len();
        self.comments.entry(path.to_string()).or_default().extend(records);
        tracing::debug!(path, count, "comments added");
        return self.save();
    }

    /// The persistence backend.
    pub const fn backend(&self) -> &B {
        return &self.backend;
    }

    /// Comments for `path` in creation order. Empty if there are none.
    pub fn comments(&self, path: &str) -> &[CommentRecord] {
        return self.comments.get(path).map_or(&[], Vec::as_slice);
    }

    /// Every document that has at least one comment.
    pub fn documents(&self) -> impl Iterator<Item = &str> {
        return self.comments.iter().filter(|(_, v)| return !v.is_empty()).map(|(k, _)| return k.as_str());
    }

    /// Read the blob into the cache. A missing blob means no comments yet.
    /// On any failure the existing cache is left as it was.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the blob cannot be read,
    /// or `Error::CorruptStore` if it does not parse.
    pub fn load(&mut self) -> Result<(), Error> {
        let Some(bytes) = self.backend.read_blob(&self.blob)? else {
            self.comments = CommentMap::new();
            tracing::debug!(blob = %self.blob, "no comment store yet");
            return Ok(());
        };
        let parsed: CommentMap = serde_json::from_slice(&bytes).map_err(|e| {
            return Error::CorruptStore {
                blob: self.blob.clone(),
                reason: e.to_string(),
            };
        })?;
        self.comments = parsed;
        return Ok(());
    }

    /// Explicit cache invalidation: re-read the blob.
    ///
    /// # Errors
    ///
    /// Same as `load`.
    pub fn reload(&mut self) -> Result<(), Error> {
        return self.load();
    }

    /// Remove the comment at `index` for `path` and write through.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoSuchComment` if there is no comment at `index`,
    /// or `Error::Storage`/`Error::Serialize` if the save fails.
    pub fn remove_comment(&mut self, path: &str, index: usize) -> Result<CommentRecord, Error> {
        let Some(list) = self.comments.get_mut(path).filter(|l| return index < l.len()) else {
            return Err(Error::NoSuchComment { index, path: path.to_string() });
        };
        let removed = list.remove(index);
        if list.is_empty() {
            self.comments.remove(path);
        }
        self.save()?;
        return Ok(removed);
    }

    /// Serialize the whole map and overwrite the blob.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialize` or `Error::Storage`.
    pub fn save(&mut self) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(&self.comments)?;
        if let Err(e) = self.backend.write_blob(&self.blob, &bytes) {
            tracing::warn!(blob = %self.blob, error = %e, "comment store save failed");
            return Err(e);
        }
        tracing::info!(blob = %self.blob, documents = self.comments.len(), "comment store saved");
        return Ok(());
    }
}
