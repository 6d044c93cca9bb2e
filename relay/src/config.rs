//! Pipeline configuration
//!
//! All thresholds and cadences recognized by the pipeline live here.
//! Validation is fatal at startup only; once the tick loop is running
//! the configuration is immutable.

use crate::error::{RelayError, Result};
use crate::types::Category;
use serde::Deserialize;
use stabletrack::{AssignmentMethod, TrackerConfig};
use std::time::Duration;

/// What closes an aggregation window: a fixed sample count or a fixed
/// wall-clock duration. The two triggers are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowTrigger {
    Samples(u32),
    Seconds(f64),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Tick rate of the pipeline loop (frames per second)
    #[serde(default = "default_fps")]
    pub fps: f32,
    /// Absorb classification samples every N ticks
    #[serde(default = "default_sample_every_ticks")]
    pub sample_every_ticks: u32,
    /// Close the window after this many absorbed samples
    #[serde(default = "default_window_samples")]
    pub window_samples: Option<u32>,
    /// Close the window after this many seconds instead
    #[serde(default)]
    pub window_seconds: Option<f64>,
    /// Minimum IoU overlap for detection-to-track association
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    /// Consecutive matches before a track is reported
    #[serde(default = "default_min_hits")]
    pub min_hits: u32,
    /// Consecutive misses beyond which a track dies
    #[serde(default = "default_max_misses")]
    pub max_misses: u32,
    /// "greedy" or "hungarian"
    #[serde(default = "default_assignment")]
    pub assignment: String,
    /// Number of known detection classes; higher class IDs are dropped
    #[serde(default = "default_class_count")]
    pub class_count: u32,
    /// Dominant category reported for a window with zero samples
    #[serde(default = "default_category")]
    pub default_category: Category,
    /// Minimum interval between per-track report bursts (ms)
    #[serde(default)]
    pub track_interval_ms: u64,
    /// Minimum interval between presence (no-face) messages (ms)
    #[serde(default = "default_presence_interval_ms")]
    pub presence_interval_ms: u64,
    /// Minimum interval between aggregate summary messages (ms)
    #[serde(default)]
    pub summary_interval_ms: u64,
    /// Minimum interval between descriptive-word messages (ms)
    #[serde(default)]
    pub word_interval_ms: u64,
    /// Seconds before an unchanged track is re-reported
    #[serde(default = "default_resend_cooldown_secs")]
    pub resend_cooldown_secs: f32,
    /// Normalized coordinate delta below which a track counts as unchanged
    #[serde(default = "default_change_epsilon")]
    pub change_epsilon: f32,
    /// OSC destination, host:port
    #[serde(default = "default_destination")]
    pub destination: String,
}

fn default_fps() -> f32 {
    15.0
}
fn default_sample_every_ticks() -> u32 {
    1
}
fn default_window_samples() -> Option<u32> {
    Some(12)
}
fn default_iou_threshold() -> f32 {
    0.3
}
fn default_min_hits() -> u32 {
    3
}
fn default_max_misses() -> u32 {
    20
}
fn default_assignment() -> String {
    "greedy".to_string()
}
fn default_class_count() -> u32 {
    1
}
fn default_category() -> Category {
    Category::Calm
}
fn default_presence_interval_ms() -> u64 {
    1000
}
fn default_resend_cooldown_secs() -> f32 {
    5.0
}
fn default_change_epsilon() -> f32 {
    0.01
}
fn default_destination() -> String {
    "127.0.0.1:5005".to_string()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            sample_every_ticks: default_sample_every_ticks(),
            window_samples: default_window_samples(),
            window_seconds: None,
            iou_threshold: default_iou_threshold(),
            min_hits: default_min_hits(),
            max_misses: default_max_misses(),
            assignment: default_assignment(),
            class_count: default_class_count(),
            default_category: default_category(),
            track_interval_ms: 0,
            presence_interval_ms: default_presence_interval_ms(),
            summary_interval_ms: 0,
            word_interval_ms: 0,
            resend_cooldown_secs: default_resend_cooldown_secs(),
            change_epsilon: default_change_epsilon(),
            destination: default_destination(),
        }
    }
}

impl RelayConfig {
    /// Parse from a TOML string and validate
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: RelayConfig =
            toml::from_str(s).map_err(|e| RelayError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject invalid configuration before the tick loop starts
    pub fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(RelayError::config(format!("fps must be positive, got {}", self.fps)));
        }
        if self.sample_every_ticks == 0 {
            return Err(RelayError::config("sample_every_ticks must be at least 1"));
        }
        match (self.window_samples, self.window_seconds) {
            (Some(_), Some(_)) => {
                return Err(RelayError::config(
                    "window_samples and window_seconds are mutually exclusive",
                ))
            }
            (None, None) => {
                return Err(RelayError::config(
                    "one of window_samples or window_seconds is required",
                ))
            }
            (Some(0), None) => {
                return Err(RelayError::config("window_samples must be at least 1"))
            }
            (None, Some(secs)) if !secs.is_finite() || secs <= 0.0 => {
                return Err(RelayError::config(format!(
                    "window_seconds must be positive, got {secs}"
                )))
            }
            _ => {}
        }
        if !self.iou_threshold.is_finite() || self.iou_threshold <= 0.0 || self.iou_threshold >= 1.0
        {
            return Err(RelayError::config(format!(
                "iou_threshold must be in (0, 1), got {}",
                self.iou_threshold
            )));
        }
        if self.min_hits == 0 {
            return Err(RelayError::config("min_hits must be at least 1"));
        }
        if self.class_count == 0 {
            return Err(RelayError::config("class_count must be at least 1"));
        }
        if self.assignment != "greedy" && self.assignment != "hungarian" {
            return Err(RelayError::config(format!(
                "assignment must be \"greedy\" or \"hungarian\", got {:?}",
                self.assignment
            )));
        }
        if !self.resend_cooldown_secs.is_finite() || self.resend_cooldown_secs < 0.0 {
            return Err(RelayError::config(format!(
                "resend_cooldown_secs must be non-negative, got {}",
                self.resend_cooldown_secs
            )));
        }
        if !self.change_epsilon.is_finite() || self.change_epsilon < 0.0 {
            return Err(RelayError::config(format!(
                "change_epsilon must be non-negative, got {}",
                self.change_epsilon
            )));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.fps)
    }

    pub fn window_trigger(&self) -> WindowTrigger {
        match (self.window_samples, self.window_seconds) {
            (Some(n), _) => WindowTrigger::Samples(n),
            (None, Some(secs)) => WindowTrigger::Seconds(secs),
            // validate() rules this out
            (None, None) => WindowTrigger::Samples(1),
        }
    }

    pub fn assignment_method(&self) -> AssignmentMethod {
        match self.assignment.as_str() {
            "hungarian" => AssignmentMethod::Hungarian,
            _ => AssignmentMethod::Greedy,
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            iou_threshold: self.iou_threshold,
            min_hits: self.min_hits,
            max_misses: self.max_misses,
            assignment: self.assignment_method(),
        }
    }

    /// Expected seconds between aggregate summaries, reported to the
    /// downstream consumer in the startup config message so it can
    /// adjust its own timing assumptions
    pub fn agent_interval_secs(&self) -> f32 {
        match self.window_trigger() {
            WindowTrigger::Samples(n) => {
                n as f32 * self.sample_every_ticks as f32 / self.fps
            }
            WindowTrigger::Seconds(secs) => secs as f32,
        }
    }
}
