//! Common types for Warp
//!
//! This module contains the fundamental identifiers, marker kinds, and
//! tuning constants shared by the warp engine modules.

use serde::{Deserialize, Serialize};

/// Default sample rate (48kHz - standard professional audio rate)
/// This is the default; hosts pass the actual rate at map construction.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Minimum tempo accepted by live retunes
pub const MIN_BPM: f64 = 30.0;

/// Maximum tempo accepted by live retunes
pub const MAX_BPM: f64 = 300.0;

/// Default tempo when a host has no better value
pub const DEFAULT_BPM: f64 = 120.0;

/// Minimum warped-position gap (in samples) kept between a marker and its
/// neighbors during interactive moves, so no warp segment collapses to
/// zero or negative length
pub const MIN_WARP_GAP_SAMPLES: i64 = 1;

/// Audio sample type for analysis input (mono, 32-bit float)
pub type Sample = f32;

/// Opaque warp marker identifier
///
/// Assigned from a per-map counter at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Marker classification
///
/// Anchor-ness is decided here once; edit operations match on
/// [`MarkerKind::is_anchor`] instead of re-deriving it from position
/// comparisons at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerKind {
    /// Anchor pinned to original sample 0
    Start,
    /// Anchor pinned to the final original sample
    End,
    /// Marker placed on a beat-grid line
    Beat,
    /// Marker placed by transient detection
    Transient,
    /// Marker placed manually
    User,
}

impl MarkerKind {
    /// All kinds in declaration order
    pub const ALL: [MarkerKind; 5] = [
        MarkerKind::Start,
        MarkerKind::End,
        MarkerKind::Beat,
        MarkerKind::Transient,
        MarkerKind::User,
    ];

    /// True for the Start/End anchors that bound the mapping
    #[inline]
    pub fn is_anchor(&self) -> bool {
        matches!(self, MarkerKind::Start | MarkerKind::End)
    }

    /// Get the display name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            MarkerKind::Start => "Start",
            MarkerKind::End => "End",
            MarkerKind::Beat => "Beat",
            MarkerKind::Transient => "Transient",
            MarkerKind::User => "User",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_kinds() {
        assert!(MarkerKind::Start.is_anchor());
        assert!(MarkerKind::End.is_anchor());
        assert!(!MarkerKind::Beat.is_anchor());
        assert!(!MarkerKind::Transient.is_anchor());
        assert!(!MarkerKind::User.is_anchor());
    }

    #[test]
    fn test_kind_enumeration() {
        assert_eq!(MarkerKind::ALL.len(), 5);
        assert_eq!(MarkerKind::Transient.name(), "Transient");
    }

    #[test]
    fn test_marker_id_display() {
        assert_eq!(MarkerId(7).to_string(), "#7");
    }
}
