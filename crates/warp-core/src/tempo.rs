//! Constant-tempo beat and sample conversions
//!
//! The warp engine works in samples internally; hosts and their grids
//! think in beats. This module holds the conversion math and the policy
//! for what happens to existing warped positions when the tempo or
//! sample rate of a live map changes.

use serde::{Deserialize, Serialize};

use crate::error::{WarpError, WarpResult};

/// How existing warped positions are treated when tempo or sample rate
/// changes on a live map
///
/// The two interpretations are genuinely different products: keeping
/// sample positions leaves the rendered audio identical and lets beat
/// labels drift; keeping beat positions rescales every warped position so
/// markers stay glued to their beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TempoChangePolicy {
    /// Warped sample positions stay exact; only the conversion math changes
    #[default]
    KeepSamplePositions,
    /// Warped positions are rescaled so beat positions stay fixed
    KeepBeatPositions,
}

/// Tempo context for beat<->sample conversion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
    sample_rate: u32,
}

impl Tempo {
    /// Create a tempo context
    ///
    /// Fails with `InvalidArgument` for a non-finite or non-positive BPM
    /// and for a zero sample rate.
    pub fn new(bpm: f64, sample_rate: u32) -> WarpResult<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(WarpError::InvalidArgument(format!(
                "BPM must be positive and finite, got {}",
                bpm
            )));
        }
        if sample_rate == 0 {
            return Err(WarpError::InvalidArgument(
                "sample rate must be non-zero".to_string(),
            ));
        }
        Ok(Self { bpm, sample_rate })
    }

    /// Current tempo in beats per minute
    #[inline]
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Current sample rate in Hz
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of samples in one beat at this tempo
    #[inline]
    pub fn samples_per_beat(&self) -> f64 {
        self.sample_rate as f64 * 60.0 / self.bpm
    }

    /// Convert a sample offset to a beat position
    #[inline]
    pub fn samples_to_beat(&self, samples: i64) -> f64 {
        samples as f64 / self.sample_rate as f64 * self.bpm / 60.0
    }

    /// Convert a beat position to the nearest sample offset
    #[inline]
    pub fn beat_to_samples(&self, beat: f64) -> i64 {
        (beat * 60.0 / self.bpm * self.sample_rate as f64).round() as i64
    }

    /// Copy of this context with a different BPM (caller validates/clamps)
    pub(crate) fn with_bpm(&self, bpm: f64) -> Self {
        Self { bpm, ..*self }
    }

    /// Copy of this context with a different sample rate (caller validates)
    pub(crate) fn with_sample_rate(&self, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..*self
        }
    }
}

/// Snap a beat position to the nearest grid line
///
/// Fails with `InvalidArgument` for a non-positive or non-finite grid
/// size. Snapping is idempotent: re-snapping a snapped value is a no-op.
pub fn snap_to_grid(beat: f64, grid_beats: f64) -> WarpResult<f64> {
    if !grid_beats.is_finite() || grid_beats <= 0.0 {
        return Err(WarpError::InvalidArgument(format!(
            "grid size must be positive and finite, got {}",
            grid_beats
        )));
    }
    Ok((beat / grid_beats).round() * grid_beats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(Tempo::new(0.0, 48000).is_err());
        assert!(Tempo::new(-120.0, 48000).is_err());
        assert!(Tempo::new(f64::NAN, 48000).is_err());
        assert!(Tempo::new(120.0, 0).is_err());
        assert!(Tempo::new(120.0, 48000).is_ok());
    }

    #[test]
    fn test_samples_per_beat() {
        let tempo = Tempo::new(120.0, 48000).unwrap();
        assert_eq!(tempo.samples_per_beat(), 24000.0);

        let tempo = Tempo::new(60.0, 44100).unwrap();
        assert_eq!(tempo.samples_per_beat(), 44100.0);
    }

    #[test]
    fn test_beat_sample_round_trip() {
        // Round-tripping a beat through samples must land within one
        // sample-period of the original beat value.
        for &(bpm, rate) in &[(120.0, 44100u32), (87.5, 48000u32)] {
            let tempo = Tempo::new(bpm, rate).unwrap();
            let one_sample_in_beats = bpm / (60.0 * rate as f64);

            for &beat in &[0.0, 0.25, 1.0, 3.3333, 16.75, 128.0] {
                let samples = tempo.beat_to_samples(beat);
                let back = tempo.samples_to_beat(samples);
                assert!(
                    (back - beat).abs() <= one_sample_in_beats,
                    "round trip of beat {} at {} BPM / {} Hz drifted to {}",
                    beat,
                    bpm,
                    rate,
                    back
                );
            }
        }
    }

    #[test]
    fn test_snap_to_grid() {
        assert_eq!(snap_to_grid(1.1, 0.25).unwrap(), 1.0);
        assert_eq!(snap_to_grid(1.13, 0.25).unwrap(), 1.25);
        assert_eq!(snap_to_grid(0.0, 1.0).unwrap(), 0.0);
        assert_eq!(snap_to_grid(-0.6, 0.5).unwrap(), -0.5);
    }

    #[test]
    fn test_snap_is_idempotent() {
        for &beat in &[0.01, 0.37, 1.99, 7.124, 100.5] {
            for &grid in &[0.25, 0.5, 1.0, 0.3333] {
                let snapped = snap_to_grid(beat, grid).unwrap();
                assert_eq!(snap_to_grid(snapped, grid).unwrap(), snapped);
            }
        }
    }

    #[test]
    fn test_snap_rejects_bad_grid() {
        assert!(snap_to_grid(1.0, 0.0).is_err());
        assert!(snap_to_grid(1.0, -0.25).is_err());
        assert!(snap_to_grid(1.0, f64::INFINITY).is_err());
    }
}
