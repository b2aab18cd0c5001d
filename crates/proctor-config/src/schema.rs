//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Global daemon settings
    #[serde(default)]
    pub daemon: RawDaemonConfig,

    #[serde(default)]
    pub enrollment: RawEnrollment,

    #[serde(default)]
    pub identity: RawIdentity,

    #[serde(default)]
    pub objects: RawObjects,

    #[serde(default)]
    pub gaze: RawGaze,

    #[serde(default)]
    pub iris: RawIris,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Directory for the termination CSV/JSONL logs
    pub log_dir: Option<PathBuf>,

    /// Data directory for the audit store
    pub data_dir: Option<PathBuf>,
}

/// Enrollment settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawEnrollment {
    /// Consecutive single-face frames required to lock the reference
    pub stable_frames: Option<u32>,
}

/// Identity policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawIdentity {
    /// Maximum embedding distance that still counts as the enrolled person
    pub tolerance: Option<f64>,

    /// Identity episodes allowed before termination
    pub max_violations: Option<u32>,
}

/// Object presence policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawObjects {
    /// Detector labels that end the session when seen
    pub target_labels: Option<Vec<String>>,

    /// Detection results are only consulted every N monitoring frames
    pub sample_every_n_frames: Option<u64>,
}

/// Head-pose gaze policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGaze {
    pub yaw_threshold_deg: Option<f64>,
    pub pitch_up_deg: Option<f64>,
    pub pitch_down_deg: Option<f64>,

    /// Seconds a disallowed direction must be held before it counts
    pub dwell_seconds: Option<f64>,

    /// Episodes allowed per direction before termination
    pub max_per_direction: Option<u32>,

    /// Episodes allowed across all directions before termination
    pub max_total: Option<u32>,
}

/// Iris refinement policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawIris {
    /// Averaged eye aspect ratio below which the frame is treated as a blink
    pub blink_ear_threshold: Option<f64>,

    /// Exponential smoothing factor for the gaze ratios
    pub ema_alpha: Option<f64>,

    /// Horizontal deviation from center that enters Left/Right
    pub horizontal_on: Option<f64>,

    /// Horizontal deviation from center that must be undercut to leave Left/Right
    pub horizontal_release: Option<f64>,

    /// Vertical ratio below which the eyes count as looking up
    pub vertical_up_threshold: Option<f64>,

    pub dwell_seconds: Option<f64>,

    pub fault_limit: Option<u32>,

    /// The fault count is divided by this before comparing to `fault_limit`
    pub fault_count_divisor: Option<u32>,
}
