//! Lock-free command queue for driving a warp map from another thread
//!
//! Marker edits are single-writer: one thread owns the [`WarpMap`] and
//! applies every mutation. When the gesture source lives elsewhere (a UI
//! thread, a controller surface), it pushes commands through this queue
//! and the owner drains them at its own cadence. Push and pop are
//! wait-free and allocation-free, so neither side can stall the other.
//!
//! # Usage
//!
//! ```ignore
//! // At startup
//! let (mut tx, mut rx) = command_channel();
//!
//! // Gesture thread: send edits (non-blocking)
//! tx.push(WarpCommand::RemoveMarker { id });
//!
//! // Owner thread: apply pending edits
//! map.process_commands(&mut rx);
//! ```
//!
//! [`WarpMap`]: crate::map::WarpMap

use crate::marker::MarkerSpec;
use crate::tempo::TempoChangePolicy;
use crate::types::{MarkerId, MarkerKind};

/// Commands applied by the warp map owner
///
/// Each variant maps to one [`WarpMap`] method. Rejections (unknown id,
/// anchor removal, bad arguments) are logged by the owner and otherwise
/// ignored; the queue carries no reply path.
///
/// [`WarpMap`]: crate::map::WarpMap
pub enum WarpCommand {
    // ─────────────────────────────────────────────────────────────
    // Marker Placement
    // ─────────────────────────────────────────────────────────────
    /// Add a marker at an original-timeline sample position
    AddMarker {
        original_pos: i64,
        kind: MarkerKind,
    },
    /// Add a marker at a beat position on the warped timeline
    AddMarkerAtBeat { beat: f64, kind: MarkerKind },
    /// Add transient markers at detected onset positions
    ///
    /// Positions ride in a single Vec so a whole detection pass is one
    /// pointer-sized command instead of hundreds of queue slots.
    AddTransientMarkers(Vec<i64>),

    // ─────────────────────────────────────────────────────────────
    // Marker Editing
    // ─────────────────────────────────────────────────────────────
    /// Drag a marker to a new warped beat position
    MoveMarker { id: MarkerId, warped_beat: f64 },
    /// Remove a marker (anchors are rejected by the map)
    RemoveMarker { id: MarkerId },
    /// Remove every non-anchor marker
    ClearMarkers,
    /// Replace the whole marker set (e.g. on project load)
    SetMarkers(Vec<MarkerSpec>),
    /// Set or clear the lock flag on a marker
    SetLocked { id: MarkerId, locked: bool },
    /// Change which marker is selected for editing (None deselects)
    SelectMarker { id: Option<MarkerId> },

    // ─────────────────────────────────────────────────────────────
    // Timebase
    // ─────────────────────────────────────────────────────────────
    /// Change the map tempo (clamped to the supported BPM range)
    SetTempo { bpm: f64, policy: TempoChangePolicy },
    /// Change the map sample rate
    SetSampleRate {
        sample_rate: u32,
        policy: TempoChangePolicy,
    },
}

/// Capacity of the command queue
///
/// Interactive gestures arrive one command at a time, and bulk edits
/// (transient detection, project load) ride inside a single Vec-carrying
/// command, so a modest capacity covers even a badly stalled owner.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create a new command channel (producer/consumer pair)
///
/// Returns `(Producer, Consumer)` where the producer belongs to the
/// gesture source and the consumer to the map owner. The channel is
/// bounded with capacity for [`COMMAND_QUEUE_CAPACITY`] commands.
pub fn command_channel() -> (rtrb::Producer<WarpCommand>, rtrb::Consumer<WarpCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_creation() {
        let (mut tx, mut rx) = command_channel();

        tx.push(WarpCommand::RemoveMarker { id: MarkerId(4) }).unwrap();

        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, WarpCommand::RemoveMarker { id: MarkerId(4) }));
    }

    #[test]
    fn test_command_channel_empty() {
        let (_tx, mut rx) = command_channel();

        // Empty queue should return error
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_size() {
        // Keep WarpCommand small for cache efficiency in the ringbuffer.
        // Largest variants are the Vec carriers (24 bytes + discriminant).
        let size = std::mem::size_of::<WarpCommand>();
        assert!(size <= 32, "WarpCommand is {} bytes, expected <= 32", size);
    }
}
