//! Warp editing configuration
//!
//! Host-facing knobs for the warp editor, persisted as YAML. Loading is
//! forgiving: a missing or unreadable file falls back to defaults so the
//! editor always starts, while saving reports errors to the caller.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::tempo::{Tempo, TempoChangePolicy};
use crate::transient::TransientDetector;

/// Warp editing configuration
///
/// All fields have defaults, so a config file may specify any subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpConfig {
    /// Grid size for beat snapping, in beats
    /// Default: 0.25 (sixteenth notes)
    pub default_grid_beats: f64,

    /// Spike ratio for transient detection
    /// Higher values demand sharper attacks before a marker is placed.
    /// Default: 1.5
    pub transient_sensitivity: f64,

    /// Minimum distance between transient markers, in beats
    /// Converted to samples at the map's tempo when detection runs.
    /// Default: 0.25
    pub transient_min_spacing_beats: f64,

    /// What happens to warped positions when the tempo changes
    /// Default: KeepSamplePositions (audio stays exact, beat labels drift)
    pub tempo_change_policy: TempoChangePolicy,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            default_grid_beats: 0.25,
            transient_sensitivity: 1.5,
            transient_min_spacing_beats: 0.25,
            tempo_change_policy: TempoChangePolicy::KeepSamplePositions,
        }
    }
}

impl WarpConfig {
    /// Load configuration from a YAML file
    ///
    /// A missing file is normal (first run) and returns defaults
    /// quietly; an unreadable or unparsable file logs a warning and
    /// returns defaults rather than refusing to start.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            log::info!("no warp config at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("failed to parse warp config: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("failed to read warp config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a YAML file, creating parent directories
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let yaml = serde_yaml::to_string(self).context("Failed to serialize warp config")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("Failed to write warp config: {:?}", path))?;

        log::info!("saved warp config to {:?}", path);
        Ok(())
    }

    /// Build a transient detector tuned by this config
    ///
    /// The beat-relative spacing becomes a sample distance at the map's
    /// current tempo, so detection density follows the music rather than
    /// wall-clock time.
    pub fn transient_detector(&self, tempo: &Tempo) -> TransientDetector {
        TransientDetector {
            sensitivity: self.transient_sensitivity,
            min_spacing_samples: tempo.beat_to_samples(self.transient_min_spacing_beats),
        }
    }
}

/// Default config file path
///
/// Returns: `{user config dir}/warp/warp.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("warp")
        .join("warp.yaml")
}
