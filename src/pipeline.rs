//! Change pipeline: debounce change/visibility events and re-render visible views.
//!
//! Each view moves `Idle -> PendingRender -> Rendering -> Idle`. Every event
//! for a view pushes its deadline to `now + window`, so a burst collapses into
//! one trailing render that reads the content current at that moment. A view
//! that becomes visible for the first time is due immediately.
//!
//! Time is passed in by the caller. The pipeline never sleeps or spawns; the
//! driver asks for `next_deadline` and calls `poll` when it passes.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::config::OverlayClasses;
use crate::dom::Fragment;
use crate::error::Error;
use crate::host::{BlobStore, DocumentSource, MarkdownRenderer};
use crate::overlay::{OverlayReport, post_render};
use crate::store::CommentStore;

/// Identity of one visible render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(pub u32);

/// Notifications the host feeds into the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A document's content changed; every view of it must re-render.
    ContentChanged {
        /// Document identity.
        path: String,
    },
    /// A view was shown (opened, focused, scrolled into view).
    ContentVisible {
        /// The view that became visible.
        view: ViewId,
    },
}

/// Where a view is in its render cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing scheduled.
    Idle,
    /// A render is scheduled for `due`.
    PendingRender {
        /// Deadline after which `poll` renders the view.
        due: Instant,
    },
    /// A render is executing.
    Rendering,
}

/// Receives finished renders. Multiple views of one document get separate fragments.
pub trait ViewPresenter {
    /// Replace what `view` shows with `fragment`.
    fn present(&mut self, view: ViewId, document: &str, fragment: Fragment, report: OverlayReport);
}

/// Bookkeeping for one visible view.
#[derive(Debug, Clone)]
struct ViewState {
    /// Document shown by the view.
    document: String,
    /// Current render phase.
    phase: Phase,
    /// Whether the view has been rendered at least once.
    rendered: bool,
}

/// The debounced re-render scheduler.
#[derive(Debug)]
pub struct ChangePipeline {
    /// Overlay class names.
    classes: OverlayClasses,
    /// Visible views by id.
    views: BTreeMap<ViewId, ViewState>,
    /// Quiet period before a pending render fires.
    window: Duration,
}

impl ChangePipeline {
    /// Create a pipeline with the given debounce window.
    pub const fn new(window: Duration, classes: OverlayClasses) -> Self {
        return Self { classes, views: BTreeMap::new(), window };
    }

    /// Stop tracking a view. Pending renders for it are dropped.
    pub fn close_view(&mut self, view: ViewId) {
        self.views.remove(&view);
    }

    /// Record an event at `now`.
    pub fn handle(&mut self, event: &PipelineEvent, now: Instant) {
        let due = now.checked_add(self.window).unwrap_or(now);
        match event {
            PipelineEvent::ContentChanged { path } => {
                for (id, state) in self.views.iter_mut().filter(|(_, s)| return &s.document == path) {
                    state.phase = Phase::PendingRender { due };
                    tracing::debug!(view = id.0, path = %path, "render scheduled");
                }
            },
            PipelineEvent::ContentVisible { view } => {
                let Some(state) = self.views.get_mut(view) else {
                    tracing::debug!(view = view.0, "visibility event for unknown view");
                    return;
                };
                let due = if state.rendered { due } else { now };
                state.phase = Phase::PendingRender { due };
            },
        }
    }

    /// Earliest pending deadline across all views.
    pub fn next_deadline(&self) -> Option<Instant> {
        return self
            .views
            .values()
            .filter_map(|s| {
                return match s.phase {
                    Phase::PendingRender { due } => Some(due),
                    Phase::Idle | Phase::Rendering => None,
                };
            })
            .min();
    }

    /// Start tracking a view of `document`. It renders on its first visibility event.
    pub fn open_view(&mut self, view: ViewId, document: &str) {
        self.views.insert(view, ViewState {
            document: document.to_string(),
            phase: Phase::Idle,
            rendered: false,
        });
    }

    /// Current phase of a view.
    pub fn phase(&self, view: ViewId) -> Option<Phase> {
        return self.views.get(&view).map(|s| return s.phase);
    }

    /// Render every view whose deadline has passed. Returns the views rendered.
    /// A view whose document cannot be read is logged and returned to idle.
    pub fn poll<H, B>(&mut self, now: Instant, host: &mut H, store: &CommentStore<B>) -> Vec<ViewId>
    where
        H: DocumentSource + MarkdownRenderer + ViewPresenter,
        B: BlobStore,
    {
        let due: Vec<ViewId> = self
            .views
            .iter()
            .filter(|(_, s)| return matches!(s.phase, Phase::PendingRender { due } if due <= now))
            .map(|(id, _)| return *id)
            .collect();

        let mut rendered = Vec::with_capacity(due.len());
        for view in due {
            let Some(state) = self.views.get_mut(&view) else {
                continue;
            };
            state.phase = Phase::Rendering;
            let document = state.document.clone();

            match render_document(host, store, &document, &self.classes) {
                Err(e) => tracing::warn!(view = view.0, path = %document, error = %e, "render failed"),
                Ok((fragment, report)) => {
                    host.present(view, &document, fragment, report);
                    rendered.push(view);
                },
            }

            if let Some(state) = self.views.get_mut(&view) {
                state.phase = Phase::Idle;
                state.rendered = true;
            }
        }
        return rendered;
    }

    /// Ids of every tracked view.
    pub fn views(&self) -> impl Iterator<Item = ViewId> + '_ {
        return self.views.keys().copied();
    }
}

/// Read, render and overlay one document.
///
/// # Errors
///
/// Returns the host's error when the document cannot be read.
pub fn render_document<H, B>(
    host: &H,
    store: &CommentStore<B>,
    path: &str,
    classes: &OverlayClasses,
) -> Result<(Fragment, OverlayReport), Error>
where
    H: DocumentSource + MarkdownRenderer,
    B: BlobStore,
{
    let source = host.read_document(path)?;
    let mut fragment = host.render_markdown(&source, path);
    let report = post_render(&mut fragment, store.comments(path), classes);
    tracing::info!(path, ranges = report.ranges, points = report.points, skipped = report.skipped, "rendered");
    return Ok((fragment, report));
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::arithmetic_side_effects, reason = "test code")]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::markdown;
    use crate::overlay::plain_text;
    use crate::store::{DEFAULT_BLOB, MemoryBlobStore};
    use crate::types::CommentRecord;

    #[derive(Default)]
    struct FakeHost {
        documents: HashMap<String, String>,
        presented: Vec<(ViewId, String)>,
    }

    impl DocumentSource for FakeHost {
        fn read_document(&self, path: &str) -> Result<String, Error> {
            return self
                .documents
                .get(path)
                .cloned()
                .ok_or_else(|| Error::DocumentNotFound { path: path.into() });
        }
    }

    impl MarkdownRenderer for FakeHost {
        fn render_markdown(&self, text: &str, _source_path: &str) -> Fragment {
            return markdown::render(text);
        }
    }

    impl ViewPresenter for FakeHost {
        fn present(&mut self, view: ViewId, _document: &str, fragment: Fragment, _report: OverlayReport) {
            self.presented.push((view, plain_text(&fragment, &OverlayClasses::default())));
        }
    }

    fn setup() -> (ChangePipeline, FakeHost, CommentStore<MemoryBlobStore>) {
        let mut host = FakeHost::default();
        host.documents.insert("fox.md".to_string(), "The quick fox".to_string());
        let mut store = CommentStore::open(MemoryBlobStore::default(), DEFAULT_BLOB).unwrap();
        store.add_comment("fox.md", CommentRecord::new("nice adjective", 4, 9).unwrap()).unwrap();
        let pipeline = ChangePipeline::new(Duration::from_millis(1000), OverlayClasses::default());
        return (pipeline, host, store);
    }

    #[test]
    fn first_visibility_renders_immediately() {
        let (mut pipeline, mut host, store) = setup();
        let t0 = Instant::now();
        pipeline.open_view(ViewId(1), "fox.md");
        pipeline.handle(&PipelineEvent::ContentVisible { view: ViewId(1) }, t0);

        assert_eq!(pipeline.poll(t0, &mut host, &store), [ViewId(1)]);
        assert_eq!(pipeline.phase(ViewId(1)), Some(Phase::Idle));
    }

    #[test]
    fn burst_of_changes_renders_once_with_latest_content() {
        let (mut pipeline, mut host, store) = setup();
        let t0 = Instant::now();
        pipeline.open_view(ViewId(1), "fox.md");
        let changed = PipelineEvent::ContentChanged { path: "fox.md".to_string() };

        pipeline.handle(&changed, t0);
        host.documents.insert("fox.md".to_string(), "The quick brown fox".to_string());
        pipeline.handle(&changed, t0 + Duration::from_millis(200));

        assert!(pipeline.poll(t0 + Duration::from_millis(1000), &mut host, &store).is_empty());
        assert_eq!(pipeline.next_deadline(), Some(t0 + Duration::from_millis(1200)));
        assert_eq!(pipeline.poll(t0 + Duration::from_millis(1200), &mut host, &store), [ViewId(1)]);
        assert!(pipeline.poll(t0 + Duration::from_millis(5000), &mut host, &store).is_empty());

        assert_eq!(host.presented, [(ViewId(1), "The quick brown fox".to_string())]);
    }

    #[test]
    fn every_view_of_a_document_renders_independently() {
        let (mut pipeline, mut host, store) = setup();
        host.documents.insert("other.md".to_string(), "unrelated".to_string());
        let t0 = Instant::now();
        pipeline.open_view(ViewId(1), "fox.md");
        pipeline.open_view(ViewId(2), "fox.md");
        pipeline.open_view(ViewId(3), "other.md");

        pipeline.handle(&PipelineEvent::ContentChanged { path: "fox.md".to_string() }, t0);
        let rendered = pipeline.poll(t0 + Duration::from_secs(1), &mut host, &store);

        assert_eq!(rendered, [ViewId(1), ViewId(2)]);
        assert_eq!(pipeline.phase(ViewId(3)), Some(Phase::Idle));
    }

    #[test]
    fn later_visibility_is_debounced() {
        let (mut pipeline, mut host, store) = setup();
        let t0 = Instant::now();
        pipeline.open_view(ViewId(1), "fox.md");
        pipeline.handle(&PipelineEvent::ContentVisible { view: ViewId(1) }, t0);
        pipeline.poll(t0, &mut host, &store);

        pipeline.handle(&PipelineEvent::ContentVisible { view: ViewId(1) }, t0 + Duration::from_millis(10));
        assert!(pipeline.poll(t0 + Duration::from_millis(10), &mut host, &store).is_empty());
        assert_eq!(pipeline.poll(t0 + Duration::from_millis(1010), &mut host, &store), [ViewId(1)]);
    }

    #[test]
    fn unreadable_document_returns_to_idle() {
        let (mut pipeline, mut host, store) = setup();
        let t0 = Instant::now();
        pipeline.open_view(ViewId(7), "missing.md");
        pipeline.handle(&PipelineEvent::ContentVisible { view: ViewId(7) }, t0);

        assert!(pipeline.poll(t0, &mut host, &store).is_empty());
        assert_eq!(pipeline.phase(ViewId(7)), Some(Phase::Idle));
        assert_eq!(pipeline.next_deadline(), None);
    }

    #[test]
    fn closed_views_are_forgotten() {
        let (mut pipeline, mut host, store) = setup();
        let t0 = Instant::now();
        pipeline.open_view(ViewId(1), "fox.md");
        pipeline.handle(&PipelineEvent::ContentChanged { path: "fox.md".to_string() }, t0);
        pipeline.close_view(ViewId(1));

        assert!(pipeline.poll(t0 + Duration::from_secs(2), &mut host, &store).is_empty());
        assert_eq!(pipeline.views().count(), 0);
    }
}
