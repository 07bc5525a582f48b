//! Energy-based transient detection for automatic marker placement
//!
//! Scans a mono clip in fixed-size blocks and reports onset positions
//! where short-term energy spikes against the preceding blocks. The
//! positions feed [`WarpMap::add_transient_markers`]; block granularity
//! is plenty for warp markers, which the user nudges afterwards anyway.
//!
//! [`WarpMap::add_transient_markers`]: crate::map::WarpMap::add_transient_markers

use std::collections::VecDeque;

use crate::types::Sample;

/// Analysis block size in samples
const BLOCK_SIZE: usize = 512;

/// Energy history window, in blocks: two recent against two older
const HISTORY_BLOCKS: usize = 4;

/// Absolute energy floor; spikes in near-silence are noise, not onsets
const ENERGY_FLOOR: f64 = 0.01;

/// Onset detector over block-wise signal energy
///
/// An onset is reported when the average energy of the two most recent
/// blocks exceeds the average of the two before them by `sensitivity`
/// and clears the absolute floor. Fires at most once per
/// `min_spacing_samples`, so one drum hit yields one marker instead of a
/// cluster.
#[derive(Debug, Clone)]
pub struct TransientDetector {
    /// Spike ratio required between recent and older energy
    pub sensitivity: f64,
    /// Minimum sample distance between reported onsets
    pub min_spacing_samples: i64,
}

impl Default for TransientDetector {
    fn default() -> Self {
        Self {
            sensitivity: 1.5,
            min_spacing_samples: 4800,
        }
    }
}

impl TransientDetector {
    /// Create a detector with the default tuning
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect onset positions in a mono clip
    ///
    /// Returns sample offsets of the blocks where onsets begin, in
    /// ascending order. Positions are block-aligned, so each reported
    /// onset lies within one block of the true attack.
    pub fn detect(&self, samples: &[Sample]) -> Vec<i64> {
        let mut onsets = Vec::new();
        let mut history: VecDeque<f64> = VecDeque::with_capacity(HISTORY_BLOCKS);
        let mut last_onset: Option<i64> = None;
        let mut position: i64 = 0;

        for block in samples.chunks(BLOCK_SIZE) {
            let energy: f64 =
                block.iter().map(|&s| s as f64 * s as f64).sum::<f64>() / block.len() as f64;

            if history.len() == HISTORY_BLOCKS {
                history.pop_front();
            }
            history.push_back(energy);

            if history.len() == HISTORY_BLOCKS {
                let recent: f64 = history.iter().rev().take(2).sum::<f64>() / 2.0;
                let older: f64 = history.iter().rev().skip(2).take(2).sum::<f64>() / 2.0;

                let spaced = last_onset
                    .map_or(true, |prev| position - prev >= self.min_spacing_samples);
                if spaced && recent > older * self.sensitivity && recent > ENERGY_FLOOR {
                    onsets.push(position);
                    last_onset = Some(position);
                }
            }

            position += block.len() as i64;
        }

        onsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Silence with 64-sample full-scale bursts at the given positions
    fn clicks(len: usize, positions: &[usize]) -> Vec<Sample> {
        let mut samples = vec![0.0; len];
        for &pos in positions {
            for sample in samples.iter_mut().skip(pos).take(64) {
                *sample = 1.0;
            }
        }
        samples
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let detector = TransientDetector::new();
        assert!(detector.detect(&vec![0.0; 48000]).is_empty());
        assert!(detector.detect(&[]).is_empty());
    }

    #[test]
    fn test_detects_each_click_once() {
        let detector = TransientDetector::new();
        let samples = clicks(96000, &[24000, 48000, 72000]);

        let onsets = detector.detect(&samples);
        assert_eq!(onsets.len(), 3, "got onsets at {:?}", onsets);
        for (onset, expected) in onsets.iter().zip([24000i64, 48000, 72000]) {
            assert!(
                (onset - expected).abs() <= BLOCK_SIZE as i64,
                "onset {} too far from click at {}",
                onset,
                expected
            );
        }
    }

    #[test]
    fn test_min_spacing_suppresses_close_onsets() {
        // Two clicks 2560 samples apart: far enough that the energy
        // comparison sees both, closer than the default spacing.
        let samples = clicks(48000, &[10000, 12560]);

        let detector = TransientDetector::new();
        assert_eq!(detector.detect(&samples).len(), 1);

        let eager = TransientDetector {
            min_spacing_samples: 1000,
            ..TransientDetector::new()
        };
        assert_eq!(eager.detect(&samples).len(), 2);
    }

    #[test]
    fn test_quiet_material_stays_below_floor() {
        // A sustained step at amplitude 0.08 spikes relative to silence
        // but never clears the absolute energy floor.
        let mut samples = vec![0.0; 48000];
        for sample in samples.iter_mut().skip(24000) {
            *sample = 0.08;
        }

        let detector = TransientDetector::new();
        assert!(detector.detect(&samples).is_empty());
    }
}
