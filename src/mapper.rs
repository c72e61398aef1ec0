//! Offset mapping: turn stored comment ranges into placements over current text.
//!
//! Range ownership is first-accepted-wins. Records are ordered by start offset
//! (ties keep creation order) and a record becomes a range placement only when
//! it starts at or after the end of the last accepted range. Any record that
//! overlaps an accepted range degrades to a point placement at its start, so the
//! comment is still surfaced without producing crossing wrappers.

use crate::types::{CommentRecord, Placement, PlacementKind, char_len};

/// Compute placements for `records` over `content`.
///
/// Records that no longer fit the content (stale offsets) or that describe an
/// empty range are dropped. Every other record yields exactly one placement.
/// The result is sorted by start; at equal starts ranges precede points and
/// each group keeps creation order.
pub fn map_placements(content: &str, records: &[CommentRecord]) -> Vec<Placement> {
    let len = char_len(content);

    let mut candidates: Vec<(usize, &CommentRecord)> = records
        .iter()
        .enumerate()
        .filter(|(index, record)| {
            let fits = record.fits(len);
            if !fits {
                tracing::debug!(index, start = record.start, end = record.end, len, "skipping stale comment");
            }
            return fits;
        })
        .collect();
    candidates.sort_by_key(|(_, record)| return record.start);

    let mut placements = Vec::with_capacity(candidates.len());
    let mut cursor = 0_usize;
    for (index, record) in candidates {
        let kind = if record.start >= cursor {
            cursor = record.end;
            PlacementKind::Range
        } else {
            PlacementKind::Point
        };
        placements.push(Placement {
            end: if kind == PlacementKind::Range { record.end } else { record.start },
            index,
            kind,
            start: record.start,
            text: record.text.clone(),
        });
    }

    placements.sort_by_key(|p| return (p.start, p.kind == PlacementKind::Point));
    return placements;
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc, clippy::indexing_slicing, reason = "test code")]
mod tests {
    use super::*;

    fn record(text: &str, start: usize, end: usize) -> CommentRecord {
        return CommentRecord { end, start, text: text.to_string() };
    }

    fn assert_well_formed(placements: &[Placement]) {
        for pair in placements.windows(2) {
            assert!(pair[0].start <= pair[1].start, "placements out of order: {pair:?}");
        }
        let ranges: Vec<&Placement> = placements.iter().filter(|p| p.kind == PlacementKind::Range).collect();
        for pair in ranges.windows(2) {
            assert!(pair[0].end <= pair[1].start, "ranges overlap: {pair:?}");
        }
    }

    #[test]
    fn single_comment_becomes_range() {
        let placements = map_placements("The quick fox", &[record("nice adjective", 4, 9)]);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].kind, PlacementKind::Range);
        assert_eq!((placements[0].start, placements[0].end), (4, 9));
        assert_eq!(placements[0].text, "nice adjective");
    }

    #[test]
    fn overlap_degrades_to_point() {
        let placements = map_placements("abcdefgh", &[record("first", 0, 5), record("second", 3, 8)]);
        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].kind, PlacementKind::Range);
        assert_eq!((placements[0].start, placements[0].end), (0, 5));
        assert_eq!(placements[1].kind, PlacementKind::Point);
        assert_eq!((placements[1].start, placements[1].end), (3, 3));
        assert_eq!(placements[1].index, 1);
    }

    #[test]
    fn touching_ranges_both_own_their_span() {
        let placements = map_placements("abcdefgh", &[record("b", 4, 8), record("a", 0, 4)]);
        assert!(placements.iter().all(|p| p.kind == PlacementKind::Range));
        assert_eq!(placements[0].index, 1);
        assert_eq!(placements[1].index, 0);
    }

    #[test]
    fn equal_starts_keep_creation_order() {
        let placements = map_placements("abcdefgh", &[record("older", 2, 4), record("newer", 2, 6)]);
        assert_eq!(placements[0].text, "older");
        assert_eq!(placements[0].kind, PlacementKind::Range);
        assert_eq!(placements[1].text, "newer");
        assert_eq!(placements[1].kind, PlacementKind::Point);
    }

    #[test]
    fn stale_and_degenerate_records_are_skipped() {
        let records = [record("past end", 3, 40), record("empty", 2, 2), record("ok", 0, 2)];
        let placements = map_placements("short", &records);
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].index, 2);
    }

    #[test]
    fn range_ending_at_content_end_is_kept() {
        let placements = map_placements("héllo", &[record("all", 0, 5)]);
        assert_eq!(placements.len(), 1);
    }

    #[test]
    fn nested_and_chained_overlaps_stay_well_formed() {
        let records = [
            record("outer", 0, 10),
            record("inner", 2, 4),
            record("tail", 8, 12),
            record("after", 10, 14),
            record("late", 13, 15),
        ];
        let placements = map_placements("0123456789abcdef", &records);
        assert_eq!(placements.len(), records.len());
        assert_well_formed(&placements);

        let kinds: Vec<(usize, PlacementKind)> = placements.iter().map(|p| (p.index, p.kind)).collect();
        assert_eq!(
            kinds,
            [
                (0, PlacementKind::Range),
                (1, PlacementKind::Point),
                (2, PlacementKind::Point),
                (3, PlacementKind::Range),
                (4, PlacementKind::Point),
            ]
        );
    }

    #[test]
    fn point_sorts_after_range_at_same_start() {
        let records = [record("wide", 0, 6), record("late", 3, 5), record("next", 6, 7), record("clash", 6, 8)];
        let placements = map_placements("abcdefgh", &records);
        assert_well_formed(&placements);
        assert_eq!(placements[2].index, 2);
        assert_eq!(placements[2].kind, PlacementKind::Range);
        assert_eq!(placements[3].index, 3);
        assert_eq!(placements[3].kind, PlacementKind::Point);
    }
}
