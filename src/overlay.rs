//! Overlay rendering: splice highlight wrappers and markers into a rendered fragment.
//!
//! Rendering is two-phase. First the text nodes are snapshotted with their
//! running character offsets and every placement is resolved to per-node
//! edits, without touching the tree. Only then is each affected text node
//! replaced, once, by its run of plain text, wrappers and markers. Offsets
//! therefore never drift while mutations are applied.

use std::iter::Peekable;
use std::slice::Iter;

use crate::config::OverlayClasses;
use crate::dom::{Fragment, NodeId};
use crate::host::StyleHost;
use crate::mapper::map_placements;
use crate::types::{CommentRecord, Placement, PlacementKind};

/// Identity under which the overlay stylesheet is registered with the host.
pub const STYLE_ID: &str = "marginalia-overlay";

/// Counts from one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayReport {
    /// Point markers inserted.
    pub points: usize,
    /// Range placements wrapped.
    pub ranges: usize,
    /// Placements that could not be resolved against the tree.
    pub skipped: usize,
}

/// Planned edits for one text node, in node-local character offsets.
#[derive(Debug, Default)]
struct NodeEdits {
    /// `(offset, placement)` pairs, sorted by offset.
    points: Vec<(usize, usize)>,
    /// Non-overlapping wrapped segments, sorted by start.
    segments: Vec<Segment>,
}

/// Part of a range placement that falls inside one text node.
#[derive(Debug, Clone, Copy)]
struct Segment {
    /// Exclusive local end.
    end: usize,
    /// Whether this is the final piece of its placement; it carries the indicator.
    last: bool,
    /// Index into the placement slice.
    placement: usize,
    /// Inclusive local start.
    start: usize,
}

/// A text node with its position in the running character count.
#[derive(Debug, Clone, Copy)]
struct TextSpan {
    /// Character length of the node's text.
    len: usize,
    /// The text node.
    node: NodeId,
    /// Offset of the node's first character.
    start: usize,
}

impl TextSpan {
    /// Offset one past the node's last character.
    const fn end(&self) -> usize {
        return self.start.saturating_add(self.len);
    }
}

/// Registration of the overlay stylesheet, released explicitly on teardown.
#[must_use = "the stylesheet stays installed until released"]
pub struct ScopedStyle {
    /// Whether `release` already ran.
    released: bool,
}

impl ScopedStyle {
    /// Install the overlay stylesheet for `classes`.
    pub fn acquire(host: &mut dyn StyleHost, classes: &OverlayClasses) -> Self {
        host.add_style(STYLE_ID, &stylesheet(classes));
        return Self { released: false };
    }

    /// Remove the stylesheet from the host.
    pub fn release(mut self, host: &mut dyn StyleHost) {
        host.remove_style(STYLE_ID);
        self.released = true;
    }
}

impl Drop for ScopedStyle {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(id = STYLE_ID, "overlay stylesheet dropped without release");
        }
    }
}

/// Remove any previous overlay, then wrap and mark every placement.
/// Never fails; unresolved placements are skipped and counted.
pub fn apply(fragment: &mut Fragment, placements: &[Placement], classes: &OverlayClasses) -> OverlayReport {
    clear(fragment, classes);

    let spans = snapshot(fragment, classes);
    let (edits, unresolved) = plan(&spans, placements);

    for (span, node_edits) in spans.iter().zip(edits) {
        if node_edits.points.is_empty() && node_edits.segments.is_empty() {
            continue;
        }
        let text = fragment.text(span.node).unwrap_or_default().to_string();
        let chars: Vec<char> = text.chars().collect();
        let replacements = build_replacements(fragment, &chars, &node_edits, placements, classes);
        fragment.replace_with(span.node, &replacements);
    }

    let ranges = placements.iter().filter(|p| return p.kind == PlacementKind::Range).count();
    let points = placements.len().saturating_sub(ranges);
    let report = OverlayReport {
        points: points.saturating_sub(unresolved.points),
        ranges: ranges.saturating_sub(unresolved.ranges),
        skipped: unresolved.points.saturating_add(unresolved.ranges),
    };
    tracing::debug!(ranges = report.ranges, points = report.points, skipped = report.skipped, "overlay applied");
    return report;
}

/// Build the nodes replacing one text node.
fn build_replacements(
    fragment: &mut Fragment,
    chars: &[char],
    edits: &NodeEdits,
    placements: &[Placement],
    classes: &OverlayClasses,
) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut points = edits.points.iter().peekable();
    let mut cursor = 0_usize;

    for segment in &edits.segments {
        emit_run(fragment, chars, cursor, segment.start, &mut points, true, placements, classes, &mut out);

        let Some(placement) = placements.get(segment.placement) else {
            continue;
        };
        let wrapper = fragment.create_element("span");
        fragment.set_attr(wrapper, "class", &classes.highlight);
        fragment.set_attr(wrapper, "data-comment", &placement.index.to_string());
        fragment.set_attr(wrapper, "title", &placement.text);

        let mut inner = Vec::new();
        emit_run(fragment, chars, segment.start, segment.end, &mut points, false, placements, classes, &mut inner);
        for node in inner {
            fragment.append_child(wrapper, node);
        }
        if segment.last {
            let indicator = fragment.create_element("span");
            fragment.set_attr(indicator, "class", &classes.indicator);
            let body = fragment.create_text(&placement.text);
            fragment.append_child(indicator, body);
            fragment.append_child(wrapper, indicator);
        }
        out.push(wrapper);
        cursor = segment.end;
    }

    emit_run(fragment, chars, cursor, chars.len(), &mut points, true, placements, classes, &mut out);
    return out;
}

/// Remove wrappers, indicators and markers left by an earlier render,
/// restoring the text nodes they replaced.
pub fn clear(fragment: &mut Fragment, classes: &OverlayClasses) {
    let mut parents = Vec::new();
    for id in fragment.descendants(fragment.root()) {
        if fragment.has_class(id, &classes.indicator) || fragment.has_class(id, &classes.marker) {
            if let Some(parent) = fragment.parent(id) {
                parents.push(parent);
            }
            fragment.detach(id);
        }
    }
    for id in fragment.descendants(fragment.root()) {
        if fragment.has_class(id, &classes.highlight) {
            if let Some(parent) = fragment.parent(id) {
                parents.push(parent);
            }
            let children = fragment.children(id).to_vec();
            fragment.replace_with(id, &children);
        }
    }
    parents.sort();
    parents.dedup();
    for parent in parents {
        fragment.merge_adjacent_text(parent);
    }
}

/// Push plain text from `from` to `to`, interleaving markers for points at or
/// before `to` (or strictly before it when `inclusive` is false).
#[allow(clippy::too_many_arguments, reason = "private helper threading render state")]
fn emit_run(
    fragment: &mut Fragment,
    chars: &[char],
    from: usize,
    to: usize,
    points: &mut Peekable<Iter<'_, (usize, usize)>>,
    inclusive: bool,
    placements: &[Placement],
    classes: &OverlayClasses,
    out: &mut Vec<NodeId>,
) {
    let mut start = from;
    while let Some(&(offset, placement)) =
        points.next_if(|(offset, _)| return if inclusive { *offset <= to } else { *offset < to })
    {
        let at = offset.clamp(start, to);
        push_text(fragment, chars, start, at, out);
        if let Some(p) = placements.get(placement) {
            let marker = fragment.create_element("span");
            fragment.set_attr(marker, "class", &classes.marker);
            fragment.set_attr(marker, "data-comment", &p.index.to_string());
            fragment.set_attr(marker, "title", &p.text);
            out.push(marker);
        }
        start = at;
    }
    push_text(fragment, chars, start, to, out);
}

/// Whether a node is document content rather than overlay chrome.
fn is_content(fragment: &Fragment, id: NodeId, classes: &OverlayClasses) -> bool {
    return !fragment.has_class(id, &classes.indicator) && !fragment.has_class(id, &classes.marker);
}

/// Resolve placements to per-node edits. Pure: reads the snapshot only.
fn plan(spans: &[TextSpan], placements: &[Placement]) -> (Vec<NodeEdits>, PlanReport) {
    let mut edits: Vec<NodeEdits> = spans.iter().map(|_| return NodeEdits::default()).collect();
    let mut report = PlanReport::default();

    let mut order: Vec<usize> = (0..placements.len()).collect();
    order.sort_by_key(|&i| {
        return placements.get(i).map(|p| return (p.start, p.kind == PlacementKind::Point));
    });

    let mut claimed = 0_usize;
    for i in order {
        let Some(placement) = placements.get(i) else {
            continue;
        };
        match placement.kind {
            PlacementKind::Point => {
                if !plan_point(spans, &mut edits, placement.start, i) {
                    tracing::debug!(index = placement.index, at = placement.start, "point placement not resolvable");
                    report.points = report.points.saturating_add(1);
                }
            },
            PlacementKind::Range => {
                if placement.start < claimed || !plan_range(spans, &mut edits, placement, i) {
                    tracing::debug!(
                        index = placement.index,
                        start = placement.start,
                        end = placement.end,
                        "range placement not resolvable"
                    );
                    report.ranges = report.ranges.saturating_add(1);
                    continue;
                }
                claimed = placement.end;
            },
        }
    }

    for node_edits in &mut edits {
        node_edits.points.sort_by_key(|(offset, _)| return *offset);
        node_edits.segments.sort_by_key(|s| return s.start);
    }
    return (edits, report);
}

/// Record a point edit. Returns false if the offset is outside the text.
fn plan_point(spans: &[TextSpan], edits: &mut [NodeEdits], at: usize, placement: usize) -> bool {
    let found = spans
        .iter()
        .position(|s| return s.start <= at && at < s.end())
        .or_else(|| {
            let last = spans.len().checked_sub(1)?;
            return spans.get(last).filter(|s| return s.end() == at).map(|_| return last);
        });
    let Some(position) = found else {
        return false;
    };
    let (Some(span), Some(node_edits)) = (spans.get(position), edits.get_mut(position)) else {
        return false;
    };
    node_edits.points.push((at.saturating_sub(span.start), placement));
    return true;
}

/// Record wrapped segments for a range. Returns false, recording nothing,
/// unless the text nodes cover the whole range.
fn plan_range(spans: &[TextSpan], edits: &mut [NodeEdits], placement: &Placement, index: usize) -> bool {
    let mut pieces: Vec<(usize, Segment)> = Vec::new();
    let mut covered = 0_usize;
    for (position, span) in spans.iter().enumerate() {
        if span.end() <= placement.start || span.start >= placement.end {
            continue;
        }
        let start = placement.start.max(span.start);
        let end = placement.end.min(span.end());
        covered = covered.saturating_add(end.saturating_sub(start));
        pieces.push((position, Segment {
            end: end.saturating_sub(span.start),
            last: false,
            placement: index,
            start: start.saturating_sub(span.start),
        }));
    }
    if covered != placement.end.saturating_sub(placement.start) || pieces.is_empty() {
        return false;
    }
    if let Some((_, last)) = pieces.last_mut() {
        last.last = true;
    }
    for (position, segment) in pieces {
        if let Some(node_edits) = edits.get_mut(position) {
            node_edits.segments.push(segment);
        }
    }
    return true;
}

/// Plain-text content of a fragment, excluding overlay chrome.
pub fn plain_text(fragment: &Fragment, classes: &OverlayClasses) -> String {
    let keep = |f: &Fragment, id: NodeId| return is_content(f, id, classes);
    return fragment.text_content_filtered(fragment.root(), &keep);
}

/// Post-render hook: overlay a document's comments onto its freshly rendered fragment.
/// Placements are computed against the fragment's own plain text.
pub fn post_render(fragment: &mut Fragment, records: &[CommentRecord], classes: &OverlayClasses) -> OverlayReport {
    let content = plain_text(fragment, classes);
    let placements = map_placements(&content, records);
    return apply(fragment, &placements, classes);
}

/// Append a text node for `chars[from..to]` when non-empty.
fn push_text(fragment: &mut Fragment, chars: &[char], from: usize, to: usize, out: &mut Vec<NodeId>) {
    let Some(slice) = chars.get(from..to).filter(|s| return !s.is_empty()) else {
        return;
    };
    let text: String = slice.iter().collect();
    out.push(fragment.create_text(&text));
}

/// Text nodes with their running offsets, skipping overlay chrome and empty nodes.
fn snapshot(fragment: &Fragment, classes: &OverlayClasses) -> Vec<TextSpan> {
    let keep = |f: &Fragment, id: NodeId| return is_content(f, id, classes);
    let mut spans = Vec::new();
    let mut offset = 0_usize;
    for node in fragment.text_nodes(fragment.root(), &keep) {
        let len = fragment.text(node).map_or(0, |t| return t.chars().count());
        if len == 0 {
            continue;
        }
        spans.push(TextSpan { len, node, start: offset });
        offset = offset.saturating_add(len);
    }
    return spans;
}

/// The overlay stylesheet for a set of class names.
pub fn stylesheet(classes: &OverlayClasses) -> String {
    let OverlayClasses { highlight, indicator, marker } = classes;
    return format!(
        "\
.{highlight} {{
  background-color: rgba(255, 208, 0, 0.35);
  border-radius: 2px;
  cursor: pointer;
  position: relative;
}}
.{highlight} .{indicator} {{
  background: #333;
  border-radius: 4px;
  bottom: 125%;
  color: #fff;
  display: none;
  left: 0;
  padding: 4px 8px;
  position: absolute;
  white-space: pre-wrap;
  z-index: 10;
}}
.{highlight}:hover .{indicator} {{
  display: block;
}}
.{marker} {{
  border-left: 2px solid rgba(255, 140, 0, 0.9);
  cursor: pointer;
  display: inline-block;
  height: 1em;
  vertical-align: text-top;
  width: 0;
}}
"
    );
}

/// Placements the planner could not resolve, split by kind.
#[derive(Debug, Clone, Copy, Default)]
struct PlanReport {
    /// Unresolved point placements.
    points: usize,
    /// Unresolved range placements.
    ranges: usize,
}
