//! Immutable warp map snapshots for lock-free readers
//!
//! Each committed edit publishes a complete marker sequence through an
//! atomic cell swap. A playback/render thread grabs one snapshot per
//! audio block and queries it without locks or allocation; it can never
//! observe a sequence mid-mutation. Retired snapshots are reclaimed
//! through the writer's collector, so nothing is freed on the reader.

use basedrop::{Shared, SharedCell};

use crate::marker::WarpMarker;

/// An immutable, ordering-consistent view of the marker sequence
///
/// Markers are sorted by original position; because warped positions are
/// kept non-decreasing in that order, the same array serves binary search
/// in the warped domain too.
#[derive(Debug)]
pub struct WarpSnapshot {
    markers: Vec<WarpMarker>,
    revision: u64,
}

impl WarpSnapshot {
    pub(crate) fn new(markers: Vec<WarpMarker>, revision: u64) -> Self {
        Self { markers, revision }
    }

    /// Markers sorted by original position
    pub fn markers(&self) -> &[WarpMarker] {
        &self.markers
    }

    /// Number of markers (at least the two anchors)
    #[inline]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// True when the snapshot holds no markers
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Edit revision that produced this snapshot
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Map a warped-timeline position to the original-timeline position
    ///
    /// Pure function of the snapshot and its argument: no mutation, no
    /// allocation, no hidden state. Interior positions interpolate
    /// linearly between the bracketing marker pair; positions outside the
    /// marker span extrapolate with the nearest segment's slope instead
    /// of clamping, so playback degrades to unwarped 1:1 rather than
    /// desynchronizing at the edges.
    #[inline]
    pub fn map_warped_to_original(&self, warped_pos: i64) -> i64 {
        map_warped(&self.markers, warped_pos)
    }
}

/// Forward query over a marker sequence sorted by original position
///
/// Shared by the snapshot and the editing map so both sides answer
/// identically for the same marker state.
pub(crate) fn map_warped(markers: &[WarpMarker], warped_pos: i64) -> i64 {
    match markers.len() {
        0 => return warped_pos,
        1 => {
            let m = &markers[0];
            return m.original_pos + (warped_pos - m.warped_pos);
        }
        _ => {}
    }

    // First marker whose warped position exceeds the query; the pair
    // (hi-1, hi) is then the earliest bracketing pair even when several
    // markers share a warped position.
    let hi = markers.partition_point(|m| m.warped_pos <= warped_pos);

    if hi == 0 {
        return extrapolate(&markers[0], &markers[1], warped_pos);
    }
    if hi == markers.len() {
        let n = markers.len();
        return extrapolate(&markers[n - 1], &markers[n - 2], warped_pos);
    }

    let a = &markers[hi - 1];
    let b = &markers[hi];
    debug_assert!(a.warped_pos <= warped_pos && warped_pos < b.warped_pos);

    let warped_span = b.warped_pos - a.warped_pos;
    if warped_span == 0 {
        return a.original_pos;
    }
    let t = (warped_pos - a.warped_pos) as f64 / warped_span as f64;
    let original_span = (b.original_pos - a.original_pos) as f64;
    a.original_pos + (t * original_span).round() as i64
}

/// Extend the segment through `anchor` and `other` past `anchor`
///
/// A degenerate segment (both markers at the same warped position) has no
/// slope, so it falls back to 1:1 through the anchor.
fn extrapolate(anchor: &WarpMarker, other: &WarpMarker, warped_pos: i64) -> i64 {
    let warped_span = (anchor.warped_pos - other.warped_pos) as f64;
    if warped_span == 0.0 {
        return anchor.original_pos + (warped_pos - anchor.warped_pos);
    }
    let slope = (anchor.original_pos - other.original_pos) as f64 / warped_span;
    let offset = (warped_pos - anchor.warped_pos) as f64;
    anchor.original_pos + (slope * offset).round() as i64
}

/// Cloneable handle for wait-free snapshot access from a reader thread
///
/// Holding a reader does not pin any particular snapshot; each call to
/// [`WarpReader::snapshot`] observes the latest committed state.
pub struct WarpReader {
    cell: Shared<SharedCell<WarpSnapshot>>,
}

impl WarpReader {
    pub(crate) fn new(cell: Shared<SharedCell<WarpSnapshot>>) -> Self {
        Self { cell }
    }

    /// Grab the current snapshot (wait-free; call once per audio block)
    #[inline]
    pub fn snapshot(&self) -> Shared<WarpSnapshot> {
        self.cell.get()
    }

    /// Query the current snapshot directly
    ///
    /// Convenience for callers that only need one lookup; block-rate
    /// consumers should grab [`WarpReader::snapshot`] once per block and
    /// query that, so every lookup in the block sees the same state.
    #[inline]
    pub fn map_warped_to_original(&self, warped_pos: i64) -> i64 {
        self.snapshot().map_warped_to_original(warped_pos)
    }
}

impl Clone for WarpReader {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MarkerId, MarkerKind};

    fn marker(id: u64, original_pos: i64, warped_pos: i64) -> WarpMarker {
        let mut m = WarpMarker::at_identity(MarkerId(id), original_pos, MarkerKind::User);
        m.warped_pos = warped_pos;
        m
    }

    #[test]
    fn test_interpolates_between_markers() {
        // Audio compressed 2x in the first segment, untouched after.
        let markers = vec![
            marker(0, 0, 0),
            marker(1, 44100, 22050),
            marker(2, 88199, 88199),
        ];

        assert_eq!(map_warped(&markers, 0), 0);
        assert_eq!(map_warped(&markers, 11025), 22050);
        assert_eq!(map_warped(&markers, 22050), 44100);
    }

    #[test]
    fn test_extrapolates_before_first_marker() {
        // First segment maps 2 original samples per warped sample.
        let markers = vec![marker(0, 1000, 500), marker(1, 3000, 1500)];

        assert_eq!(map_warped(&markers, 400), 800);
        assert_eq!(map_warped(&markers, 0), 0);
        assert_eq!(map_warped(&markers, -100), -200);
    }

    #[test]
    fn test_extrapolates_past_last_marker() {
        // Last segment is 1:1; positions past the end keep advancing
        // instead of sticking to the final marker.
        let markers = vec![marker(0, 0, 0), marker(1, 1000, 500), marker(2, 2000, 1500)];

        assert_eq!(map_warped(&markers, 1500), 2000);
        assert_eq!(map_warped(&markers, 1600), 2100);
        assert_eq!(map_warped(&markers, 2500), 3000);
    }

    #[test]
    fn test_equal_warped_positions_pick_earliest_pair() {
        // Two markers sharing a warped position: the query at that
        // position resolves through the earliest valid bracketing pair.
        let markers = vec![
            marker(0, 0, 0),
            marker(1, 1000, 500),
            marker(2, 1200, 500),
            marker(3, 2000, 900),
        ];

        assert_eq!(map_warped(&markers, 500), 1200);
        // Just before the shared position: interpolating in the first segment.
        assert_eq!(map_warped(&markers, 499), 998);
    }

    #[test]
    fn test_identity_map_is_identity() {
        let markers = vec![marker(0, 0, 0), marker(1, 9999, 9999)];
        for &w in &[0, 1, 5000, 9999, 12000] {
            assert_eq!(map_warped(&markers, w), w);
        }
    }

    #[test]
    fn test_snapshot_accessors() {
        let snapshot = WarpSnapshot::new(vec![marker(0, 0, 0), marker(1, 100, 100)], 7);
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.revision(), 7);
        assert_eq!(snapshot.markers()[1].original_pos, 100);
        assert_eq!(snapshot.map_warped_to_original(50), 50);
    }
}
