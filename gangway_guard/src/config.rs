//! Configuration for gangway_guard

use crate::core_modules::reconciler::ContainmentTest;
use crate::error::{GuardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted duration setting. Also bounds the occupancy window at
/// `240 × 3600` frames.
const MAX_DURATION_SECS: f64 = 3_600.0;

/// Tunable parameters for the blockage pipeline.
///
/// Every field has a default, so a TOML file only needs to name the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Nominal frame rate of the video source. Sizes the occupancy window.
    pub frame_rate: u32,
    /// Gray-level difference (0-255) above which a pixel counts as changed.
    pub diff_threshold: u8,
    /// Side of the square element used for the noise-removing opening.
    pub open_kernel: u32,
    /// Side of the square element used for the fragment-merging closing.
    pub close_kernel: u32,
    /// Smallest region area (inclusive) accepted as a candidate.
    pub min_area: u64,
    /// Region area (exclusive) at which a region is treated as a scene collapse.
    pub max_area: u64,
    /// How long a single candidate must persist before a blockage is declared.
    pub persistence_secs: f64,
    /// Length of the trailing occupancy window in seconds.
    pub window_secs: f64,
    /// Continuous foreground-free time after which the reference is replaced.
    pub no_change_reset_secs: f64,
    /// Minimum IoU for a candidate to be considered the same object as a tracked one.
    pub match_iou: f64,
    /// Person detections below this confidence are ignored.
    pub person_min_confidence: f32,
    pub containment: ContainmentTest,
    /// Single-slot output path for the annotated blockage snapshot.
    pub artifact_path: PathBuf,
    /// Side of the picture-in-picture blockage thumbnail. Zero disables it.
    pub thumbnail_size: u32,
    /// Delay between an operator resume and capturing the fresh baseline.
    pub resume_settle_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            frame_rate: 24,
            diff_threshold: 50,
            open_kernel: 5,
            close_kernel: 10,
            min_area: 5_000,
            max_area: 200_000,
            persistence_secs: 5.0,
            window_secs: 5.0,
            no_change_reset_secs: 4.0,
            match_iou: 0.5,
            person_min_confidence: 0.7,
            containment: ContainmentTest::default(),
            artifact_path: PathBuf::from("blockage.jpg"),
            thumbnail_size: 150,
            resume_settle_ms: 2_000,
        }
    }
}

impl GuardConfig {
    /// Parses a TOML document and validates the result.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: GuardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 || self.frame_rate > 240 {
            return Err(GuardError::Config("frame_rate must be between 1 and 240".to_string()));
        }
        if self.open_kernel == 0 || self.close_kernel == 0 {
            return Err(GuardError::Config("morphology kernels must be non-zero".to_string()));
        }
        if self.min_area >= self.max_area {
            return Err(GuardError::Config(format!(
                "min_area ({}) must be below max_area ({})",
                self.min_area, self.max_area
            )));
        }
        for (name, secs) in [
            ("persistence_secs", self.persistence_secs),
            ("window_secs", self.window_secs),
            ("no_change_reset_secs", self.no_change_reset_secs),
        ] {
            if !secs.is_finite() || secs <= 0.0 {
                return Err(GuardError::Config(format!("{name} must be a positive number of seconds")));
            }
            if secs > MAX_DURATION_SECS {
                return Err(GuardError::Config(format!("{name} must not exceed {MAX_DURATION_SECS} seconds")));
            }
        }
        if self.resume_settle_ms as f64 > MAX_DURATION_SECS * 1_000.0 {
            return Err(GuardError::Config("resume_settle_ms is longer than an hour".to_string()));
        }
        if !(self.match_iou > 0.0 && self.match_iou <= 1.0) {
            return Err(GuardError::Config("match_iou must be in (0, 1]".to_string()));
        }
        if !(self.person_min_confidence > 0.0 && self.person_min_confidence <= 1.0) {
            return Err(GuardError::Config("person_min_confidence must be in (0, 1]".to_string()));
        }
        if self.window_capacity() == 0 {
            return Err(GuardError::Config("occupancy window must hold at least one frame".to_string()));
        }
        Ok(())
    }

    /// Number of frames in the occupancy window (`window_secs × frame_rate`).
    pub fn window_capacity(&self) -> usize {
        (self.window_secs * self.frame_rate as f64).round() as usize
    }

    pub fn persistence(&self) -> Duration {
        Duration::from_secs_f64(self.persistence_secs)
    }

    pub fn no_change_reset(&self) -> Duration {
        Duration::from_secs_f64(self.no_change_reset_secs)
    }

    pub fn resume_settle(&self) -> Duration {
        Duration::from_millis(self.resume_settle_ms)
    }
}
