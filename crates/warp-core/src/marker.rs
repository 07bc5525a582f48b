//! Warp marker entity
//!
//! A warp marker pins a specific original-timeline sample to a specific
//! warped-timeline sample. Markers are passive data: all invariant
//! enforcement lives in the map, because the validity of one marker's
//! warped position depends on its neighbors.

use serde::{Deserialize, Serialize};

use crate::types::{MarkerId, MarkerKind};

/// A pinned correspondence point between the original and warped timelines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpMarker {
    /// Identity, assigned at creation, never reused
    pub id: MarkerId,
    /// Sample offset into the source recording (fixed after creation)
    pub original_pos: i64,
    /// Sample offset on the performance timeline (what the user drags)
    pub warped_pos: i64,
    /// Marker classification
    pub kind: MarkerKind,
    /// Locked markers ignore interactive moves but still interpolate
    pub locked: bool,
    /// Map revision of the latest mutation (observability only, never
    /// used for ordering)
    pub last_modified: u64,
}

impl WarpMarker {
    /// Create a marker with the identity mapping (warped == original)
    pub fn at_identity(id: MarkerId, original_pos: i64, kind: MarkerKind) -> Self {
        Self {
            id,
            original_pos,
            warped_pos: original_pos,
            kind,
            locked: false,
            last_modified: 0,
        }
    }

    /// True for the Start/End anchors
    #[inline]
    pub fn is_anchor(&self) -> bool {
        self.kind.is_anchor()
    }

    /// Record the map revision of the mutation that last touched this marker
    pub fn touch(&mut self, revision: u64) {
        self.last_modified = revision;
    }
}

/// Plain marker descriptor for full-set replacement
///
/// Hosts persist these through their own storage layer and hand them back
/// via the map's set-replacement operation, which normalizes the set
/// before use. Anchor identity is derived from position on load, so a
/// stale or hand-edited set can never smuggle in a broken mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    /// Sample offset into the source recording
    pub original_pos: i64,
    /// Sample offset on the performance timeline
    pub warped_pos: i64,
    /// Marker classification
    pub kind: MarkerKind,
    /// Locked markers ignore interactive moves
    #[serde(default)]
    pub locked: bool,
}

impl MarkerSpec {
    /// Create a descriptor
    pub fn new(original_pos: i64, warped_pos: i64, kind: MarkerKind) -> Self {
        Self {
            original_pos,
            warped_pos,
            kind,
            locked: false,
        }
    }
}

impl From<&WarpMarker> for MarkerSpec {
    fn from(marker: &WarpMarker) -> Self {
        Self {
            original_pos: marker.original_pos,
            warped_pos: marker.warped_pos,
            kind: marker.kind,
            locked: marker.locked,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_creation() {
        let marker = WarpMarker::at_identity(MarkerId(3), 44100, MarkerKind::User);
        assert_eq!(marker.original_pos, 44100);
        assert_eq!(marker.warped_pos, 44100);
        assert!(!marker.locked);
        assert_eq!(marker.last_modified, 0);
    }

    #[test]
    fn test_touch_records_revision() {
        let mut marker = WarpMarker::at_identity(MarkerId(0), 0, MarkerKind::Start);
        marker.touch(17);
        assert_eq!(marker.last_modified, 17);
    }

    #[test]
    fn test_spec_from_marker() {
        let mut marker = WarpMarker::at_identity(MarkerId(5), 1000, MarkerKind::Beat);
        marker.warped_pos = 1500;
        marker.locked = true;

        let spec = MarkerSpec::from(&marker);
        assert_eq!(spec.original_pos, 1000);
        assert_eq!(spec.warped_pos, 1500);
        assert_eq!(spec.kind, MarkerKind::Beat);
        assert!(spec.locked);
    }
}
