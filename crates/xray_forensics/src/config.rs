//! Configuration for detection, recording, replay and notifications.
//!
//! Every field carries a serde default so a partial `[forensics]` table in the
//! host's TOML file is enough; missing values fall back to the defaults below.

use crate::types::Material;
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool { true }
fn default_reset_window_secs() -> u64 { 60 }
fn default_max_duration_secs() -> u64 { 180 }
fn default_interval_ticks() -> u32 { 2 }
fn default_max_retained() -> usize { 50 }
fn default_ticks_per_frame() -> u32 { 2 }
fn default_blend_factor() -> f64 { 0.25 }
fn default_damping_weight() -> f64 { 0.3 }
fn default_damping_window() -> usize { 6 }
fn default_extrapolation_fraction() -> f64 { 0.2 }
fn default_lookahead_size() -> usize { 10 }

fn default_categories() -> Vec<CategorySettings> {
    vec![
        CategorySettings {
            name: "diamond".to_string(),
            threshold: 5,
            materials: vec!["diamond_ore".to_string(), "deepslate_diamond_ore".to_string()],
        },
        CategorySettings {
            name: "netherite".to_string(),
            threshold: 3,
            materials: vec!["ancient_debris".to_string()],
        },
    ]
}

/// Root configuration for the forensics subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForensicsConfig {
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub recording: RecordingSettings,
    #[serde(default)]
    pub replay: ReplaySettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

/// Suspicion heuristic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Whether breaks are counted at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Counts reset when the gap since the previous break exceeds this
    #[serde(default = "default_reset_window_secs")]
    pub reset_window_secs: u64,
    /// Watched resource categories
    #[serde(default = "default_categories")]
    pub categories: Vec<CategorySettings>,
}

/// A watched resource category: which materials belong to it and how many
/// consecutive breaks trigger a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySettings {
    pub name: String,
    pub threshold: u32,
    pub materials: Vec<String>,
}

impl CategorySettings {
    pub fn contains(&self, material: &Material) -> bool {
        self.materials
            .iter()
            .any(|m| Material::new(m) == *material)
    }
}

/// Recording session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Hard cap on a single recording
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,
    /// Scheduler ticks between samples
    #[serde(default = "default_interval_ticks")]
    pub interval_ticks: u32,
    /// Archive capacity; 0 keeps everything
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
    /// Whether events still buffered at stop become a final frame
    #[serde(default = "default_enabled")]
    pub flush_pending_on_stop: bool,
}

impl RecordingSettings {
    pub fn max_duration_millis(&self) -> i64 {
        (self.max_duration_secs as i64).saturating_mul(1000)
    }
}

/// Replay playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// Scheduler ticks per recorded frame; matches the recording cadence
    #[serde(default = "default_ticks_per_frame")]
    pub ticks_per_frame: u32,
    #[serde(default = "default_blend_factor")]
    pub blend_factor: f64,
    #[serde(default = "default_enabled")]
    pub use_smoothstep: bool,
    #[serde(default = "default_enabled")]
    pub damping_enabled: bool,
    #[serde(default = "default_damping_weight")]
    pub damping_weight: f64,
    #[serde(default = "default_damping_window")]
    pub damping_window: usize,
    #[serde(default = "default_enabled")]
    pub extrapolation_enabled: bool,
    #[serde(default = "default_extrapolation_fraction")]
    pub extrapolation_fraction: f64,
    #[serde(default = "default_lookahead_size")]
    pub lookahead_size: usize,
    /// Extra ticks on which each break/place overlay is sent again
    #[serde(default)]
    pub visual_resend_count: u32,
}

impl ReplaySettings {
    /// Blend factor clamped to the usable range.
    pub fn effective_blend_factor(&self) -> f64 {
        if self.blend_factor.is_nan() {
            return default_blend_factor();
        }
        self.blend_factor.clamp(0.05, 1.0)
    }

    pub fn effective_ticks_per_frame(&self) -> u32 {
        self.ticks_per_frame.max(1)
    }
}

/// Where admin notices go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Broadcast notices to subscribed operators
    #[serde(default = "default_enabled")]
    pub admin_alerts: bool,
    /// Write notices to the log
    #[serde(default = "default_enabled")]
    pub console_logging: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            reset_window_secs: default_reset_window_secs(),
            categories: default_categories(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_duration_secs: default_max_duration_secs(),
            interval_ticks: default_interval_ticks(),
            max_retained: default_max_retained(),
            flush_pending_on_stop: default_enabled(),
        }
    }
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            ticks_per_frame: default_ticks_per_frame(),
            blend_factor: default_blend_factor(),
            use_smoothstep: default_enabled(),
            damping_enabled: default_enabled(),
            damping_weight: default_damping_weight(),
            damping_window: default_damping_window(),
            extrapolation_enabled: default_enabled(),
            extrapolation_fraction: default_extrapolation_fraction(),
            lookahead_size: default_lookahead_size(),
            visual_resend_count: 0,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            admin_alerts: default_enabled(),
            console_logging: default_enabled(),
        }
    }
}

impl ForensicsConfig {
    /// Validates the configuration and returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.detector.reset_window_secs == 0 {
            return Err("detector.reset_window_secs must be greater than 0".to_string());
        }

        for category in &self.detector.categories {
            if category.name.trim().is_empty() {
                return Err("detector category names cannot be empty".to_string());
            }
            if category.threshold == 0 {
                return Err(format!("detector category '{}' needs a threshold above 0", category.name));
            }
            if category.materials.is_empty() {
                return Err(format!("detector category '{}' lists no materials", category.name));
            }
        }

        if self.recording.interval_ticks == 0 {
            return Err("recording.interval_ticks must be greater than 0".to_string());
        }

        if self.recording.max_duration_secs == 0 {
            return Err("recording.max_duration_secs must be greater than 0".to_string());
        }

        if !(self.replay.blend_factor > 0.0 && self.replay.blend_factor <= 1.0) {
            return Err(format!(
                "replay.blend_factor must be in (0, 1], got {}",
                self.replay.blend_factor
            ));
        }

        if !(0.0..=1.0).contains(&self.replay.damping_weight) {
            return Err("replay.damping_weight must be between 0 and 1".to_string());
        }

        if !(0.0..=1.0).contains(&self.replay.extrapolation_fraction) {
            return Err("replay.extrapolation_fraction must be between 0 and 1".to_string());
        }

        if self.replay.lookahead_size < 2 {
            return Err("replay.lookahead_size must be at least 2".to_string());
        }

        Ok(())
    }
}
