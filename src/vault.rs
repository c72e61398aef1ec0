//! Filesystem host: a directory of markdown documents with a comment store beside them.

use std::collections::BTreeMap;
use std::io::BufRead as _;
use std::path::{Path, PathBuf};

use pulldown_cmark_escape::escape_html;

use crate::config::Config;
use crate::dom::Fragment;
use crate::error::Error;
use crate::host::{CommentPrompt, DocumentSource, EditorView, MarkdownRenderer, Notifier, StyleHost};
use crate::markdown;
use crate::overlay::{OverlayReport, plain_text};
use crate::pipeline::{ViewId, ViewPresenter};
use crate::scanner::contained_id;
use crate::store::{CommentStore, FsBlobStore, write_atomically};
use crate::types::{Selection, char_len};

/// A vault rooted at a directory.
pub struct Vault {
    /// Loaded `.marginalia.toml`, or defaults.
    config: Config,
    /// Vault root directory.
    root: PathBuf,
    /// Stylesheets registered through `StyleHost`, emitted into every page.
    styles: BTreeMap<String, String>,
}

impl Vault {
    /// Open the vault at `root`, loading its config.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigInvalid` or `Error::Io` from config loading.
    pub fn open(root: &Path) -> Result<Self, Error> {
        let config = Config::load(root)?;
        return Ok(Self { config, root: root.to_path_buf(), styles: BTreeMap::new() });
    }

    /// The vault's configuration.
    pub const fn config(&self) -> &Config {
        return &self.config;
    }

    /// Open the comment store configured for this vault.
    ///
    /// # Errors
    ///
    /// Returns `Error::CorruptStore` or `Error::Storage` from the initial load.
    pub fn open_store(&self) -> Result<CommentStore<FsBlobStore>, Error> {
        let blob = self.config.store.to_string_lossy();
        return CommentStore::open(FsBlobStore::new(&self.root), &blob);
    }

    /// Vault-relative identity for a user-supplied document path.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for absolute paths or paths that leave the vault.
    pub fn document(&self, path: &str) -> Result<String, Error> {
        return contained_id(Path::new(path)).ok_or_else(|| return Error::DocumentNotFound { path: PathBuf::from(path) });
    }

    /// Where the rendered page for `document` is written.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` if `document` is not inside the vault.
    pub fn output_path(&self, document: &str) -> Result<PathBuf, Error> {
        let id = self.document(document)?;
        let mut path = self.root.join(&self.config.output).join(id);
        path.set_extension("html");
        return Ok(path);
    }

    /// A standalone HTML page holding every registered stylesheet and `fragment`.
    pub fn page(&self, document: &str, fragment: &Fragment) -> String {
        let mut title = String::new();
        let _ = escape_html(&mut title, document);
        let mut out = format!("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n");
        for (id, css) in &self.styles {
            out.push_str("<style id=\"");
            let _ = escape_html(&mut out, id);
            out.push_str("\">\n");
            out.push_str(css);
            out.push_str("</style>\n");
        }
        out.push_str("</head>\n<body>\n<article>");
        out.push_str(&fragment.to_html());
        out.push_str("</article>\n</body>\n</html>\n");
        return out;
    }

    /// Plain text of a document as rendered, the space all offsets live in.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` or `Error::Io`.
    pub fn plain_text(&self, document: &str) -> Result<String, Error> {
        let source = self.read_document(document)?;
        return Ok(plain_text(&self.render_markdown(&source, document), &self.config.classes));
    }

    /// Vault root directory.
    pub fn root(&self) -> &Path {
        return &self.root;
    }

    /// Write the rendered page for `document` and return its path.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for paths outside the vault,
    /// or `Error::Io` if the output directory or file cannot be written.
    pub fn write_page(&self, document: &str, fragment: &Fragment) -> Result<PathBuf, Error> {
        let path = self.output_path(document)?;
        write_atomically(&path, self.page(document, fragment).as_bytes())?;
        return Ok(path);
    }

    /// Replace a document's source, atomically.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` for paths outside the vault,
    /// or `Error::Io` if the write fails.
    pub fn write_document(&self, document: &str, source: &str) -> Result<(), Error> {
        let id = self.document(document)?;
        write_atomically(&self.root.join(id), source.as_bytes())?;
        return Ok(());
    }
}

impl DocumentSource for Vault {
    fn read_document(&self, path: &str) -> Result<String, Error> {
        let id = self.document(path)?;
        return match std::fs::read_to_string(self.root.join(&id)) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::DocumentNotFound { path: PathBuf::from(id) }),
            Err(e) => Err(Error::Io(e)),
            Ok(source) => Ok(source),
        };
    }
}

impl MarkdownRenderer for Vault {
    fn render_markdown(&self, text: &str, _source_path: &str) -> Fragment {
        return markdown::render(text);
    }
}

impl Notifier for Vault {
    fn notice(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

impl StyleHost for Vault {
    fn add_style(&mut self, id: &str, css: &str) {
        self.styles.insert(id.to_string(), css.to_string());
    }

    fn remove_style(&mut self, id: &str) {
        self.styles.remove(id);
    }
}

impl ViewPresenter for Vault {
    fn present(&mut self, view: ViewId, document: &str, fragment: Fragment, report: OverlayReport) {
        match self.write_page(document, &fragment) {
            Err(e) => tracing::warn!(view = view.0, document, error = %e, "could not write rendered page"),
            Ok(path) => {
                eprintln!(
                    "rendered {document} -> {} ({} highlighted, {} marked)",
                    path.display(),
                    report.ranges,
                    report.points
                );
            },
        }
    }
}

/// Editor selection built from command-line arguments.
#[derive(Debug, Clone)]
pub struct ArgSelection {
    /// Document identity.
    document: String,
    /// The resolved selection.
    selection: Selection,
}

impl ArgSelection {
    /// Select the `occurrence`-th (1-based) appearance of `quote` in `content`.
    ///
    /// # Errors
    ///
    /// Returns `Error::QuoteNotFound` if the quote is empty or does not occur
    /// that many times.
    pub fn from_quote(document: &str, content: &str, quote: &str, occurrence: usize) -> Result<Self, Error> {
        let not_found = || return Error::QuoteNotFound { path: document.to_string(), quote: quote.to_string() };
        if quote.is_empty() || occurrence == 0 {
            return Err(not_found());
        }
        let (byte_start, _) = content.match_indices(quote).nth(occurrence.saturating_sub(1)).ok_or_else(not_found)?;
        let start = content.get(..byte_start).map_or(0, char_len);
        let end = start.saturating_add(char_len(quote));
        return Ok(Self {
            document: document.to_string(),
            selection: Selection { end, start, text: quote.to_string() },
        });
    }

    /// Select `start..end` of `content` by character offset.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRange` unless `start < end <= len`.
    pub fn from_offsets(document: &str, content: &str, start: usize, end: usize) -> Result<Self, Error> {
        let len = char_len(content);
        if start >= end || end > len {
            return Err(Error::InvalidRange { end, len, start });
        }
        let text: String = content.chars().skip(start).take(end.saturating_sub(start)).collect();
        return Ok(Self {
            document: document.to_string(),
            selection: Selection { end, start, text },
        });
    }
}

impl EditorView for ArgSelection {
    fn document(&self) -> &str {
        return &self.document;
    }

    fn selection(&self) -> Option<Selection> {
        return Some(self.selection.clone());
    }
}

/// Comment prompt answered by a `--comment` argument or, failing that, one line of stdin.
pub struct ArgPrompt {
    /// Comment passed on the command line.
    comment: Option<String>,
}

impl ArgPrompt {
    /// Prompt that answers with `comment` when given.
    pub const fn new(comment: Option<String>) -> Self {
        return Self { comment };
    }
}

impl CommentPrompt for ArgPrompt {
    fn prompt(&mut self, selected: &str) -> Option<String> {
        if let Some(comment) = self.comment.take() {
            return Some(comment);
        }
        eprintln!("Comment on \"{selected}\" (empty line or EOF cancels):");
        let mut line = String::new();
        return match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line).filter(|l| return !l.trim().is_empty()),
        };
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use super::*;
    use crate::overlay::ScopedStyle;

    fn vault_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Vault) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        return (dir, vault);
    }

    #[test]
    fn reads_documents_by_normalized_id() {
        let (_dir, vault) = vault_with(&[("notes/fox.md", "The *quick* fox")]);
        assert_eq!(vault.read_document("./notes/fox.md").unwrap(), "The *quick* fox");
        assert_eq!(vault.plain_text("notes/fox.md").unwrap(), "The quick fox");
    }

    #[test]
    fn missing_and_escaping_documents_are_not_found() {
        let (_dir, vault) = vault_with(&[]);
        assert!(matches!(vault.read_document("nope.md"), Err(Error::DocumentNotFound { .. })));
        assert!(matches!(vault.read_document("../etc/passwd"), Err(Error::DocumentNotFound { .. })));
    }

    #[test]
    fn absolute_paths_stay_outside_the_vault() {
        let (_dir, vault) = vault_with(&[]);
        let elsewhere = tempfile::tempdir().unwrap();
        let secret = elsewhere.path().join("secret.md");
        std::fs::write(&secret, "outside the vault").unwrap();
        let secret = secret.to_string_lossy();

        assert!(matches!(vault.read_document(&secret), Err(Error::DocumentNotFound { .. })));
        assert!(matches!(vault.output_path(&secret), Err(Error::DocumentNotFound { .. })));
        assert!(matches!(vault.write_document(&secret, "clobbered"), Err(Error::DocumentNotFound { .. })));
        assert_eq!(std::fs::read_to_string(elsewhere.path().join("secret.md")).unwrap(), "outside the vault");
    }

    #[test]
    fn quote_selection_counts_characters() {
        let selection = ArgSelection::from_quote("a.md", "café quick, quick", "quick", 2).unwrap();
        assert_eq!(selection.selection(), Some(Selection { end: 17, start: 12, text: "quick".to_string() }));
    }

    #[test]
    fn missing_quote_is_rejected() {
        let err = ArgSelection::from_quote("a.md", "The quick fox", "slow", 1).unwrap_err();
        assert!(matches!(err, Error::QuoteNotFound { .. }));
        let err = ArgSelection::from_quote("a.md", "The quick fox", "quick", 2).unwrap_err();
        assert!(matches!(err, Error::QuoteNotFound { .. }));
    }

    #[test]
    fn offset_selection_checks_bounds() {
        let selection = ArgSelection::from_offsets("a.md", "The quick fox", 4, 9).unwrap();
        assert_eq!(selection.selection().map(|s| return s.text), Some("quick".to_string()));
        let err = ArgSelection::from_offsets("a.md", "The quick fox", 4, 40).unwrap_err();
        assert!(matches!(err, Error::InvalidRange { len: 13, .. }));
    }

    #[test]
    fn page_carries_registered_style_until_released() {
        let (_dir, mut vault) = vault_with(&[]);
        let classes = vault.config().classes.clone();
        let fragment = markdown::render("hello");

        let style = ScopedStyle::acquire(&mut vault, &classes);
        assert!(vault.page("a.md", &fragment).contains(".highlight-comment"));
        style.release(&mut vault);
        let page = vault.page("a.md", &fragment);
        assert!(!page.contains("<style"));
        assert!(page.contains("<article><p>hello</p></article>"));
    }

    #[test]
    fn output_path_mirrors_document_tree() {
        let (dir, vault) = vault_with(&[]);
        assert_eq!(vault.output_path("notes/fox.md").unwrap(), dir.path().join(".marginalia/rendered/notes/fox.html"));
    }
}
