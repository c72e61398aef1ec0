use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::store::DEFAULT_BLOB;

/// Name of the config file looked up in the vault root.
pub const CONFIG_FILE: &str = ".marginalia.toml";

/// Default debounce window between change events and re-render.
const DEFAULT_DEBOUNCE_MS: u64 = 1000;

/// CSS class names the overlay stamps onto generated elements.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct OverlayClasses {
    /// Container wrapping highlighted text.
    pub highlight: String,
    /// Element holding the comment text, shown on hover.
    pub indicator: String,
    /// Zero-width marker for point annotations.
    pub marker: String,
}

impl Default for OverlayClasses {
    fn default() -> Self {
        return Self {
            highlight: "highlight-comment".to_string(),
            indicator: "tooltip".to_string(),
            marker: "comment-marker".to_string(),
        };
    }
}

/// Vault configuration loaded from `.marginalia.toml`.
/// Include/exclude patterns are path prefixes applied to markdown documents.
#[derive(Debug, Clone)]
pub struct Config {
    /// Class names for overlay elements.
    pub classes: OverlayClasses,
    /// Quiet period after the last change event before re-rendering.
    pub debounce: Duration,
    /// Document path prefixes never scanned.
    exclude: Vec<String>,
    /// Document path prefixes to scan. Empty means everything.
    include: Vec<String>,
    /// Directory, relative to the vault root, receiving rendered HTML.
    pub output: PathBuf,
    /// Comment blob, relative to the vault root.
    pub store: PathBuf,
}

/// Raw TOML structure for `.marginalia.toml`.
#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MarginaliaTomlConfig {
    #[serde(default)]
    classes: OverlayClasses,
    debounce_ms: Option<u64>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    output: Option<PathBuf>,
    store: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        return Self {
            classes: OverlayClasses::default(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            exclude: Vec::new(),
            include: Vec::new(),
            output: PathBuf::from(".marginalia/rendered"),
            store: PathBuf::from(DEFAULT_BLOB),
        };
    }
}

impl Config {
    /// Load config from `.marginalia.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist.
    /// Returns an error if the file exists but is malformed. Never silently
    /// falls back to defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::ConfigInvalid` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };
        return Self::parse(&path, &content);
    }

    /// Parse config content. `path` is only used for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigInvalid` if the TOML is malformed.
    pub fn parse(path: &Path, content: &str) -> Result<Self, Error> {
        let raw: MarginaliaTomlConfig = toml::from_str(content).map_err(|e| {
            return Error::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.message().to_string(),
            };
        })?;
        let defaults = Self::default();
        return Ok(Self {
            classes: raw.classes,
            debounce: raw.debounce_ms.map_or(defaults.debounce, Duration::from_millis),
            exclude: raw.exclude,
            include: raw.include,
            output: raw.output.unwrap_or(defaults.output),
            store: raw.store.unwrap_or(defaults.store),
        });
    }

    /// Check whether a document path should be scanned.
    ///
    /// A path is included if no include patterns are set (scan everything),
    /// or if the path starts with at least one include pattern.
    /// An included path is then excluded if it starts with any exclude pattern.
    pub fn should_scan(&self, relative_path: &str) -> bool {
        let included = self.include.is_empty()
            || self.include.iter().any(|p| return relative_path.starts_with(p.as_str()));

        if !included {
            return false;
        }

        return !self.exclude.iter().any(|p| return relative_path.starts_with(p.as_str()));
    }
}
