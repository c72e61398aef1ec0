//! File watcher: renders every document on startup, then re-renders on changes.
//!
//! Filesystem events become `ContentChanged` for the affected document.
//! Documents created while watching get a view of their own, and deleted ones
//! lose theirs. The comment blob changing triggers a store reload and a change
//! for every view.
//! The loop sleeps on the channel until the pipeline's next deadline.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use notify::{RecursiveMode, Watcher as _};

use crate::error::Error;
use crate::overlay::ScopedStyle;
use crate::pipeline::{ChangePipeline, PipelineEvent, ViewId};
use crate::scanner;
use crate::vault::Vault;

/// Create a filesystem watcher that forwards changed paths on the given channel.
///
/// # Errors
///
/// Returns `Error::WatchFailed` if the watcher cannot be created.
fn create_watcher(tx: crossbeam_channel::Sender<PathBuf>) -> Result<notify::RecommendedWatcher, Error> {
    return notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
        if let Ok(event) = res
            && matches!(
                event.kind,
                notify::EventKind::Create(_) | notify::EventKind::Modify(_) | notify::EventKind::Remove(_)
            )
        {
            for path in event.paths {
                let _ = tx.send(path);
            }
        }
    })
    .map_err(|e| {
        return Error::WatchFailed { reason: e.to_string() };
    });
}

/// Views the watcher has opened, one per document.
#[derive(Debug, Default)]
struct WatchedViews {
    /// View of each document.
    ids: BTreeMap<String, ViewId>,
    /// Id for the next view opened.
    next: u32,
}

impl WatchedViews {
    /// Open a view of `document` and schedule its first render.
    fn open(&mut self, pipeline: &mut ChangePipeline, document: &str, now: Instant) {
        if self.ids.contains_key(document) {
            return;
        }
        let view = ViewId(self.next);
        self.next = self.next.saturating_add(1);
        pipeline.open_view(view, document);
        pipeline.handle(&PipelineEvent::ContentVisible { view }, now);
        self.ids.insert(document.to_string(), view);
    }

    /// Feed one changed filesystem path into the pipeline.
    ///
    /// The comment blob touches every view. A new document gets a view, an
    /// edited one is re-rendered, and a deleted one has its view closed.
    fn on_path(&mut self, pipeline: &mut ChangePipeline, vault: &Vault, root: &Path, path: &Path, now: Instant) {
        let relative = path.strip_prefix(root).unwrap_or(path);
        if relative == vault.config().store {
            for document in self.ids.keys() {
                pipeline.handle(&PipelineEvent::ContentChanged { path: document.clone() }, now);
            }
            return;
        }
        let Some(id) = scanner::contained_id(relative) else {
            return;
        };

        match (self.ids.get(&id).copied(), path.is_file()) {
            (Some(_), true) => pipeline.handle(&PipelineEvent::ContentChanged { path: id }, now),
            (Some(view), false) => {
                pipeline.close_view(view);
                self.ids.remove(&id);
                tracing::info!(path = %id, "document removed, view closed");
            },
            (None, true) if scanner::is_document(&id, vault.config()) => {
                tracing::info!(path = %id, "document created, view opened");
                self.open(pipeline, &id, now);
            },
            (None, _) => {},
        }
    }
}

/// Entry point for the watch command.
///
/// Opens one view per discovered document, renders each immediately, then
/// re-renders after edits settle for the configured debounce window.
///
/// # Errors
///
/// Returns errors from store loading or watcher setup.
pub fn run(mut vault: Vault) -> Result<(), Error> {
    let root = std::fs::canonicalize(vault.root()).unwrap_or_else(|_| return vault.root().to_path_buf());
    let mut store = vault.open_store()?;
    let classes = vault.config().classes.clone();

    let documents = scanner::discover(&root, vault.config());
    let mut pipeline = ChangePipeline::new(vault.config().debounce, classes.clone());
    let mut views = WatchedViews::default();
    let now = Instant::now();
    for document in &documents {
        views.open(&mut pipeline, document, now);
    }

    let (tx, rx) = crossbeam_channel::unbounded();
    let mut watcher = create_watcher(tx)?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| return Error::WatchFailed { reason: e.to_string() })?;

    let style = ScopedStyle::acquire(&mut vault, &classes);
    eprintln!("watch: {} documents, press Ctrl+C to stop", documents.len());

    loop {
        pipeline.poll(Instant::now(), &mut vault, &store);

        let received = match pipeline.next_deadline() {
            None => rx.recv().ok(),
            Some(due) => match rx.recv_deadline(due) {
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Ok(path) => Some(path),
            },
        };
        let Some(path) = received else {
            break;
        };

        let output = root.join(&vault.config().output);
        if path.starts_with(&output) {
            continue;
        }
        if path.strip_prefix(&root).is_ok_and(|r| return r == vault.config().store)
            && let Err(e) = store.reload()
        {
            tracing::warn!(error = %e, "comment store reload failed, keeping cached comments");
        }
        views.on_path(&mut pipeline, &vault, &root, &path, Instant::now());
    }

    style.release(&mut vault);
    return Ok(());
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, reason = "test code")]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::pipeline::Phase;

    const WINDOW: Duration = Duration::from_millis(100);

    fn setup(dir: &Path) -> (Vault, ChangePipeline, WatchedViews) {
        let vault = Vault::open(dir).unwrap();
        let pipeline = ChangePipeline::new(WINDOW, vault.config().classes.clone());
        return (vault, pipeline, WatchedViews::default());
    }

    #[test]
    fn document_change_schedules_its_view() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fox.md"), "fox").unwrap();
        std::fs::write(dir.path().join("dog.md"), "dog").unwrap();
        let (vault, mut pipeline, mut views) = setup(dir.path());
        let now = Instant::now();
        views.open(&mut pipeline, "fox.md", now);
        views.open(&mut pipeline, "dog.md", now);

        let later = now + Duration::from_secs(5);
        views.on_path(&mut pipeline, &vault, dir.path(), &dir.path().join("dog.md"), later);
        assert_eq!(pipeline.phase(ViewId(1)), Some(Phase::PendingRender { due: later + WINDOW }));
        assert_eq!(pipeline.phase(ViewId(0)), Some(Phase::PendingRender { due: now }));
    }

    #[test]
    fn created_document_opens_a_view() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, mut pipeline, mut views) = setup(dir.path());
        std::fs::create_dir_all(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("notes/new.md"), "fresh").unwrap();
        std::fs::write(dir.path().join("notes/image.png"), "png").unwrap();

        let now = Instant::now();
        views.on_path(&mut pipeline, &vault, dir.path(), &dir.path().join("notes/image.png"), now);
        assert_eq!(pipeline.views().count(), 0);

        views.on_path(&mut pipeline, &vault, dir.path(), &dir.path().join("notes/new.md"), now);
        assert_eq!(pipeline.views().collect::<Vec<_>>(), [ViewId(0)]);
        assert_eq!(pipeline.phase(ViewId(0)), Some(Phase::PendingRender { due: now }));
    }

    #[test]
    fn rendered_output_does_not_open_views() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, mut pipeline, mut views) = setup(dir.path());
        let page = dir.path().join(".marginalia/rendered/fox.md");
        std::fs::create_dir_all(page.parent().unwrap()).unwrap();
        std::fs::write(&page, "x").unwrap();

        views.on_path(&mut pipeline, &vault, dir.path(), &page, Instant::now());
        assert_eq!(pipeline.views().count(), 0);
    }

    #[test]
    fn deleted_document_closes_its_view() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("fox.md");
        std::fs::write(&doc, "fox").unwrap();
        let (vault, mut pipeline, mut views) = setup(dir.path());
        let now = Instant::now();
        views.on_path(&mut pipeline, &vault, dir.path(), &doc, now);
        assert_eq!(pipeline.views().count(), 1);

        std::fs::remove_file(&doc).unwrap();
        views.on_path(&mut pipeline, &vault, dir.path(), &doc, now);
        assert_eq!(pipeline.views().count(), 0);
        assert!(views.ids.is_empty());
    }

    #[test]
    fn store_change_touches_every_view() {
        let dir = tempfile::tempdir().unwrap();
        let (vault, mut pipeline, mut views) = setup(dir.path());
        let now = Instant::now();
        views.open(&mut pipeline, "a.md", now);
        views.open(&mut pipeline, "b.md", now);

        let later = now + Duration::from_secs(5);
        let blob = dir.path().join(".marginalia/comments.json");
        views.on_path(&mut pipeline, &vault, dir.path(), &blob, later);
        for view in [ViewId(0), ViewId(1)] {
            assert_eq!(pipeline.phase(view), Some(Phase::PendingRender { due: later + WINDOW }));
        }
    }
}
