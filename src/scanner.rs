use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;

/// Find every markdown document under `root` that the config allows.
/// Returns vault-relative identities with `/` separators, sorted.
/// Hidden directories (the store and rendered output live there) are skipped.
pub fn discover(root: &Path, config: &Config) -> Vec<String> {
    let mut documents: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(root).ok()?;
            let id = document_id(relative);
            is_document(&id, config).then_some(id)
        })
        .collect();
    documents.sort();
    tracing::debug!(count = documents.len(), root = %root.display(), "documents discovered");
    documents
}

/// Whether a document identity names a markdown file the config allows,
/// outside any hidden directory.
pub fn is_document(id: &str, config: &Config) -> bool {
    id.ends_with(".md") && !id.split('/').any(|part| part.starts_with('.')) && config.should_scan(id)
}

/// Normalize a user-supplied path into a document identity.
/// `./notes/../notes/fox.md` and `notes/fox.md` name the same document.
pub fn document_id(path: &Path) -> String {
    let normalized = normalize_path(path);
    let parts: Vec<String> = normalized
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// Document identity for a path that must stay inside the vault.
/// Returns `None` for absolute paths, drive prefixes, or anything that still
/// climbs out with `..` after normalization.
pub fn contained_id(path: &Path) -> Option<String> {
    let normalized = normalize_path(path);
    let mut components = normalized.components().peekable();
    components.peek()?;
    if !components.all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(document_id(&normalized))
}

/// Collapse `.` and `..` components in a path without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        push_normalized_component(&mut components, component);
    }
    components.iter().collect()
}

/// Handle a single path component during normalization.
fn push_normalized_component<'a>(components: &mut Vec<Component<'a>>, component: Component<'a>) {
    match component {
        Component::CurDir => {}
        Component::ParentDir => {
            let can_pop = matches!(components.last(), Some(c) if !matches!(c, Component::ParentDir));
            if can_pop { components.pop(); } else { components.push(component); }
        }
        other => components.push(other),
    }
}
