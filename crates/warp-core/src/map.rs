//! Warp map editing engine
//!
//! The map owns the ordered marker collection and is the only place
//! mutation happens, so the ordering rules cannot be bypassed: original
//! positions stay strictly increasing, warped positions stay
//! non-decreasing in that order, and the Start/End anchors bound the
//! collection for the map's whole lifetime. Every committed edit bumps a
//! revision, publishes an immutable snapshot for lock-free readers, and
//! then notifies subscribers.
//!
//! Edits either fully commit or reject before touching anything; a
//! rejected edit leaves the map byte-for-byte unchanged so callers can
//! treat failure as "no change occurred".

use basedrop::{Collector, Handle, Shared, SharedCell};

use crate::command::WarpCommand;
use crate::error::{WarpError, WarpResult};
use crate::events::{EventBus, MarkerEvent};
use crate::marker::{MarkerSpec, WarpMarker};
use crate::snapshot::{map_warped, WarpReader, WarpSnapshot};
use crate::tempo::{Tempo, TempoChangePolicy};
use crate::types::{MarkerId, MarkerKind, MAX_BPM, MIN_BPM, MIN_WARP_GAP_SAMPLES};

/// Ordered warp marker collection with invariant-preserving edits
///
/// Single-writer: one thread owns the map and performs all edits.
/// Playback threads query through [`WarpMap::reader`] handles, which see
/// a complete committed snapshot and never block the writer.
pub struct WarpMap {
    /// Markers sorted by original position, anchors first and last
    markers: Vec<WarpMarker>,
    /// Source length in samples, fixed at construction
    total_samples: i64,
    /// Beat<->sample conversion context
    tempo: Tempo,
    /// Next marker id to hand out, never reused
    next_id: u64,
    /// Monotonic edit counter, bumped once per committed edit
    revision: u64,
    /// Marker currently selected for editing in a host UI
    selected: Option<MarkerId>,
    /// Committed-edit notifications
    events: EventBus,
    /// Reclaims snapshots that readers have released
    collector: Collector,
    /// Allocation handle for publishing snapshots
    gc_handle: Handle,
    /// Latest committed snapshot, swapped atomically on each edit
    cell: Shared<SharedCell<WarpSnapshot>>,
}

impl WarpMap {
    /// Create a map over a source recording
    ///
    /// Installs the two anchor markers at original/warped sample 0 and
    /// `total_samples - 1` with the identity mapping between them. Fails
    /// with `InvalidArgument` for a source shorter than 2 samples, a bad
    /// BPM, or a zero sample rate.
    pub fn new(total_samples: i64, sample_rate: u32, bpm: f64) -> WarpResult<Self> {
        if total_samples < 2 {
            return Err(WarpError::InvalidArgument(format!(
                "source must be at least 2 samples long, got {}",
                total_samples
            )));
        }
        let tempo = Tempo::new(bpm, sample_rate)?;

        let markers = vec![
            WarpMarker::at_identity(MarkerId(0), 0, MarkerKind::Start),
            WarpMarker::at_identity(MarkerId(1), total_samples - 1, MarkerKind::End),
        ];

        let collector = Collector::new();
        let gc_handle = collector.handle();
        let snapshot = Shared::new(&gc_handle, WarpSnapshot::new(markers.clone(), 0));
        let cell = Shared::new(&gc_handle, SharedCell::new(snapshot));

        log::debug!(
            "created warp map: {} samples at {} Hz, {} BPM",
            total_samples,
            sample_rate,
            bpm
        );

        Ok(Self {
            markers,
            total_samples,
            tempo,
            next_id: 2,
            revision: 0,
            selected: None,
            events: EventBus::default(),
            collector,
            gc_handle,
            cell,
        })
    }

    /// Add a marker at an original-timeline sample position
    ///
    /// The position must lie strictly between the anchors and must not
    /// coincide with an existing marker. The new marker starts
    /// unstretched (warped == original); if the surrounding markers are
    /// already warped past that value, the warped position is clamped
    /// next to the colliding neighbor instead of rejecting the add, since
    /// original-position spacing and warped-position spacing are
    /// independent axes. Returns the new marker's id.
    pub fn add_marker(&mut self, original_pos: i64, kind: MarkerKind) -> WarpResult<MarkerId> {
        if kind.is_anchor() {
            return Err(WarpError::InvalidArgument(format!(
                "{} markers are created by the map itself",
                kind.name()
            )));
        }
        if original_pos <= 0 || original_pos >= self.total_samples - 1 {
            return Err(WarpError::InvalidArgument(format!(
                "marker position {} is not strictly between the anchors at 0 and {}",
                original_pos,
                self.total_samples - 1
            )));
        }
        let idx = match self
            .markers
            .binary_search_by_key(&original_pos, |m| m.original_pos)
        {
            Ok(_) => {
                return Err(WarpError::InvalidArgument(format!(
                    "a marker already exists at original position {}",
                    original_pos
                )))
            }
            Err(idx) => idx,
        };

        // The anchors bound every accepted position, so idx is interior
        // and both neighbors exist.
        let warped = clamp_between_neighbors(
            original_pos,
            self.markers[idx - 1].warped_pos,
            self.markers[idx].warped_pos,
        );

        let id = self.alloc_id();
        self.revision += 1;
        let mut marker = WarpMarker::at_identity(id, original_pos, kind);
        marker.warped_pos = warped;
        marker.touch(self.revision);
        self.markers.insert(idx, marker);
        self.publish();
        self.events.publish(MarkerEvent::Added {
            id,
            kind,
            original_pos,
        });
        log::debug!("added {} marker {} at original {}", kind.name(), id, original_pos);
        Ok(id)
    }

    /// Add a marker at a beat position, converted via the current tempo
    pub fn add_marker_at_beat(&mut self, beat: f64, kind: MarkerKind) -> WarpResult<MarkerId> {
        let original_pos = self.tempo.beat_to_samples(beat);
        self.add_marker(original_pos, kind)
    }

    /// Add transient markers at detected onset positions
    ///
    /// Positions that collide with an existing marker or fall outside the
    /// insertable range are skipped with a warning instead of aborting
    /// the batch. Returns the number of markers actually added.
    pub fn add_transient_markers(&mut self, positions: &[i64]) -> usize {
        let mut added = 0;
        for &pos in positions {
            match self.add_marker(pos, MarkerKind::Transient) {
                Ok(_) => added += 1,
                Err(e) => log::warn!("skipping transient at {}: {}", pos, e),
            }
        }
        added
    }

    /// Drag a marker to a new warped beat position
    ///
    /// The requested position is converted to samples and clamped into
    /// the open interval between the neighbors' warped positions, keeping
    /// a minimum one-sample gap on each side so no warp segment collapses
    /// to zero or negative length. Anchors are pinned and locked markers
    /// are inert; a drag on either reports the unchanged position rather
    /// than failing, so a host UI can reconcile without a rollback path.
    /// Returns the effective (possibly clamped) beat position.
    pub fn move_marker(&mut self, id: MarkerId, new_warped_beat: f64) -> WarpResult<f64> {
        let idx = self.index_of(id).ok_or(WarpError::NotFound { id })?;

        let (kind, locked, current_warped) = {
            let m = &self.markers[idx];
            (m.kind, m.locked, m.warped_pos)
        };
        if kind.is_anchor() || locked {
            return Ok(self.tempo.samples_to_beat(current_warped));
        }

        let candidate = self.tempo.beat_to_samples(new_warped_beat);

        // Interior markers always have both neighbors.
        let lo = self.markers[idx - 1].warped_pos + MIN_WARP_GAP_SAMPLES;
        let hi = self.markers[idx + 1].warped_pos - MIN_WARP_GAP_SAMPLES;
        if lo > hi {
            // The neighbors leave no legal room to stand in.
            return Ok(self.tempo.samples_to_beat(current_warped));
        }

        let new_warped = candidate.clamp(lo, hi);
        if new_warped == current_warped {
            return Ok(self.tempo.samples_to_beat(current_warped));
        }

        self.revision += 1;
        let revision = self.revision;
        let marker = &mut self.markers[idx];
        marker.warped_pos = new_warped;
        marker.touch(revision);
        self.publish();

        let beat = self.tempo.samples_to_beat(new_warped);
        self.events.publish(MarkerEvent::Moved {
            id,
            warped_pos: new_warped,
            beat,
        });
        Ok(beat)
    }

    /// Remove a marker
    ///
    /// Fails with `InvalidOperation` for the Start/End anchors. Removal
    /// needs no re-validation: the remaining sequence is a subsequence of
    /// a valid one, and monotonic subsequences stay monotonic.
    pub fn remove_marker(&mut self, id: MarkerId) -> WarpResult<()> {
        let idx = self.index_of(id).ok_or(WarpError::NotFound { id })?;
        if self.markers[idx].is_anchor() {
            return Err(WarpError::InvalidOperation(
                "anchor markers cannot be removed",
            ));
        }

        self.revision += 1;
        self.markers.remove(idx);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.publish();
        self.events.publish(MarkerEvent::Deleted { id });
        Ok(())
    }

    /// Remove every non-anchor marker
    ///
    /// The anchors are retained unchanged. Does nothing (and notifies
    /// nobody) when only the anchors remain.
    pub fn clear_markers(&mut self) {
        let removed = self.markers.iter().filter(|m| !m.is_anchor()).count();
        if removed == 0 {
            return;
        }

        self.revision += 1;
        self.markers.retain(|m| m.is_anchor());
        if let Some(id) = self.selected {
            if self.markers.iter().all(|m| m.id != id) {
                self.selected = None;
            }
        }
        self.publish();
        self.events.publish(MarkerEvent::Cleared { removed });
        log::debug!("cleared {} markers", removed);
    }

    /// Replace the whole marker set, normalizing it to a valid mapping
    ///
    /// Accepts previously persisted descriptors in any order and repairs
    /// rather than rejects: positions outside the source are dropped,
    /// duplicate original positions keep their first occurrence, anchor
    /// identity is re-derived from position (with anchors synthesized at
    /// the bounds when missing), and warped positions are raised where
    /// needed so the sorted sequence stays non-decreasing. Every repair
    /// is logged; a loaded set can never leave the map in a broken state.
    pub fn set_markers(&mut self, specs: Vec<MarkerSpec>) {
        let last = self.total_samples - 1;

        let mut specs: Vec<MarkerSpec> = specs
            .into_iter()
            .filter(|spec| {
                let in_range = spec.original_pos >= 0 && spec.original_pos <= last;
                if !in_range {
                    log::warn!(
                        "dropping marker outside source range: original {}",
                        spec.original_pos
                    );
                }
                in_range
            })
            .collect();

        // Stable sort, then keep the first of each original position.
        specs.sort_by_key(|spec| spec.original_pos);
        specs.dedup_by(|dup, kept| {
            if dup.original_pos == kept.original_pos {
                log::warn!("dropping duplicate marker at original {}", dup.original_pos);
                true
            } else {
                false
            }
        });

        self.revision += 1;
        let revision = self.revision;

        let mut markers: Vec<WarpMarker> = Vec::with_capacity(specs.len() + 2);
        for spec in specs {
            let kind = if spec.original_pos == 0 {
                MarkerKind::Start
            } else if spec.original_pos == last {
                MarkerKind::End
            } else if spec.kind.is_anchor() {
                log::warn!(
                    "demoting stray {} marker at original {} to User",
                    spec.kind.name(),
                    spec.original_pos
                );
                MarkerKind::User
            } else {
                spec.kind
            };

            let mut marker = WarpMarker::at_identity(self.alloc_id(), spec.original_pos, kind);
            marker.warped_pos = spec.warped_pos;
            marker.locked = !kind.is_anchor() && spec.locked;
            marker.touch(revision);
            markers.push(marker);
        }

        if markers.first().map_or(true, |m| m.kind != MarkerKind::Start) {
            log::warn!("marker set has no Start anchor, synthesizing one");
            let mut start = WarpMarker::at_identity(self.alloc_id(), 0, MarkerKind::Start);
            start.touch(revision);
            markers.insert(0, start);
        }
        if markers.last().map_or(true, |m| m.kind != MarkerKind::End) {
            log::warn!("marker set has no End anchor, synthesizing one");
            let mut end = WarpMarker::at_identity(self.alloc_id(), last, MarkerKind::End);
            end.touch(revision);
            markers.push(end);
        }

        // Forward pass: raise any warped position that would run time
        // backward relative to its predecessor.
        let mut max_warped = i64::MIN;
        for marker in &mut markers {
            if marker.warped_pos < max_warped {
                log::warn!(
                    "raising warped position of marker at original {} from {} to {}",
                    marker.original_pos,
                    marker.warped_pos,
                    max_warped
                );
                marker.warped_pos = max_warped;
            }
            max_warped = marker.warped_pos;
        }

        self.markers = markers;
        self.selected = None;
        self.publish();
        self.events.publish(MarkerEvent::Replaced {
            count: self.markers.len(),
        });
        log::debug!("replaced marker set: {} markers", self.markers.len());
    }

    /// Change which marker is selected for editing (None deselects)
    ///
    /// Selection is editor state, not mapping state: it bumps no revision
    /// and publishes no snapshot.
    pub fn select_marker(&mut self, id: Option<MarkerId>) -> WarpResult<()> {
        if let Some(id) = id {
            if self.index_of(id).is_none() {
                return Err(WarpError::NotFound { id });
            }
        }
        self.selected = id;
        Ok(())
    }

    /// Currently selected marker, if any
    pub fn selected_marker(&self) -> Option<MarkerId> {
        self.selected
    }

    /// Set or clear the lock flag on a marker
    ///
    /// Locked markers ignore interactive moves but still interpolate.
    /// Anchors are rejected: they are already immovable.
    pub fn set_locked(&mut self, id: MarkerId, locked: bool) -> WarpResult<()> {
        let idx = self.index_of(id).ok_or(WarpError::NotFound { id })?;
        if self.markers[idx].is_anchor() {
            return Err(WarpError::InvalidOperation(
                "anchor markers do not take the lock flag",
            ));
        }
        if self.markers[idx].locked == locked {
            return Ok(());
        }

        self.revision += 1;
        let revision = self.revision;
        let marker = &mut self.markers[idx];
        marker.locked = locked;
        marker.touch(revision);
        self.publish();
        Ok(())
    }

    /// Change the map tempo
    ///
    /// The requested BPM is clamped to the supported range and the
    /// effective value returned. `policy` decides what happens to
    /// existing warped positions: by default they stay sample-exact and
    /// only the beat labels shift; `KeepBeatPositions` rescales every
    /// warped position (anchors included, so the map keeps its shape)
    /// so markers stay glued to their beats.
    pub fn set_tempo(&mut self, bpm: f64, policy: TempoChangePolicy) -> WarpResult<f64> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(WarpError::InvalidArgument(format!(
                "BPM must be positive and finite, got {}",
                bpm
            )));
        }
        let clamped = bpm.clamp(MIN_BPM, MAX_BPM);
        let old_bpm = self.tempo.bpm();
        if clamped == old_bpm {
            return Ok(clamped);
        }

        // One beat spans more samples at a slower tempo.
        self.retime(policy, old_bpm / clamped);
        self.tempo = self.tempo.with_bpm(clamped);
        log::debug!("tempo changed from {} to {} BPM", old_bpm, clamped);
        Ok(clamped)
    }

    /// Change the map sample rate
    ///
    /// `policy` works as for [`WarpMap::set_tempo`]: warped positions
    /// stay sample-exact by default, or rescale to keep beat positions
    /// fixed at the new rate.
    pub fn set_sample_rate(
        &mut self,
        sample_rate: u32,
        policy: TempoChangePolicy,
    ) -> WarpResult<()> {
        if sample_rate == 0 {
            return Err(WarpError::InvalidArgument(
                "sample rate must be non-zero".to_string(),
            ));
        }
        let old_rate = self.tempo.sample_rate();
        if sample_rate == old_rate {
            return Ok(());
        }

        self.retime(policy, sample_rate as f64 / old_rate as f64);
        self.tempo = self.tempo.with_sample_rate(sample_rate);
        log::debug!("sample rate changed from {} to {} Hz", old_rate, sample_rate);
        Ok(())
    }

    /// Map a warped-timeline position to the original-timeline position
    ///
    /// Answers from the live marker sequence. Readers on other threads
    /// query through [`WarpMap::reader`] instead; both sides share the
    /// same lookup, so they agree for the same committed state.
    #[inline]
    pub fn map_warped_to_original(&self, warped_pos: i64) -> i64 {
        map_warped(&self.markers, warped_pos)
    }

    /// Markers sorted by original position (anchors included)
    pub fn markers(&self) -> &[WarpMarker] {
        &self.markers
    }

    /// Look up a marker by id
    pub fn marker(&self, id: MarkerId) -> Option<&WarpMarker> {
        self.markers.iter().find(|m| m.id == id)
    }

    /// Number of markers (at least the two anchors)
    #[inline]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// True when the map holds no markers (never, once constructed)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Total length of the source material in samples
    #[inline]
    pub fn total_samples(&self) -> i64 {
        self.total_samples
    }

    /// Current beat<->sample conversion context
    #[inline]
    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Monotonic edit counter, bumped once per committed edit
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Create a reader handle for lock-free queries from another thread
    pub fn reader(&self) -> WarpReader {
        WarpReader::new(self.cell.clone())
    }

    /// Subscribe to committed-edit notifications
    ///
    /// Events fire only after a commit; a subscriber that re-reads the
    /// map on receipt always sees the post-edit state.
    pub fn subscribe(&self) -> crossbeam::channel::Receiver<MarkerEvent> {
        self.events.subscribe()
    }

    /// Apply a single queued command
    ///
    /// Rejections are logged and dropped; the queue carries no reply
    /// path, and a rejected edit leaves the map unchanged anyway.
    pub fn apply(&mut self, command: WarpCommand) {
        let result = match command {
            WarpCommand::AddMarker { original_pos, kind } => {
                self.add_marker(original_pos, kind).map(|_| ())
            }
            WarpCommand::AddMarkerAtBeat { beat, kind } => {
                self.add_marker_at_beat(beat, kind).map(|_| ())
            }
            WarpCommand::AddTransientMarkers(positions) => {
                self.add_transient_markers(&positions);
                Ok(())
            }
            WarpCommand::MoveMarker { id, warped_beat } => {
                self.move_marker(id, warped_beat).map(|_| ())
            }
            WarpCommand::RemoveMarker { id } => self.remove_marker(id),
            WarpCommand::ClearMarkers => {
                self.clear_markers();
                Ok(())
            }
            WarpCommand::SetMarkers(specs) => {
                self.set_markers(specs);
                Ok(())
            }
            WarpCommand::SetLocked { id, locked } => self.set_locked(id, locked),
            WarpCommand::SelectMarker { id } => self.select_marker(id),
            WarpCommand::SetTempo { bpm, policy } => self.set_tempo(bpm, policy).map(|_| ()),
            WarpCommand::SetSampleRate {
                sample_rate,
                policy,
            } => self.set_sample_rate(sample_rate, policy),
        };
        if let Err(e) = result {
            log::warn!("command rejected: {}", e);
        }
    }

    /// Drain and apply all pending commands from a channel
    pub fn process_commands(&mut self, commands: &mut rtrb::Consumer<WarpCommand>) {
        while let Ok(command) = commands.pop() {
            self.apply(command);
        }
    }

    /// Next marker id, never reused within a map
    fn alloc_id(&mut self) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        id
    }

    fn index_of(&self, id: MarkerId) -> Option<usize> {
        self.markers.iter().position(|m| m.id == id)
    }

    /// Publish the current marker sequence to readers, then reclaim
    /// snapshots every reader has released
    fn publish(&mut self) {
        let snapshot = Shared::new(
            &self.gc_handle,
            WarpSnapshot::new(self.markers.clone(), self.revision),
        );
        self.cell.set(snapshot);
        self.collector.collect();
    }

    /// Rescale every warped position when the policy keeps beat positions
    ///
    /// Positive scaling and rounding both preserve ordering, so the
    /// non-decreasing warped sequence survives unchanged.
    fn retime(&mut self, policy: TempoChangePolicy, factor: f64) {
        if policy == TempoChangePolicy::KeepSamplePositions {
            return;
        }

        self.revision += 1;
        let revision = self.revision;
        for marker in &mut self.markers {
            marker.warped_pos = (marker.warped_pos as f64 * factor).round() as i64;
            marker.touch(revision);
        }
        self.publish();
        log::debug!("rescaled warped positions by {}", factor);
    }
}

/// Clamp a warped-position candidate into `[prev, next]`, standing one
/// sample off the neighbor it collided with when there is room
fn clamp_between_neighbors(candidate: i64, prev: i64, next: i64) -> i64 {
    if candidate < prev {
        (prev + MIN_WARP_GAP_SAMPLES).min(next)
    } else if candidate > next {
        (next - MIN_WARP_GAP_SAMPLES).max(prev)
    } else {
        candidate
    }
}
