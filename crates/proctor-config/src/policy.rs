//! Validated policy structures

use crate::schema::{RawConfig, RawDaemonConfig, RawEnrollment, RawGaze, RawIdentity, RawIris, RawObjects};
use crate::validation::{validate_policy, ValidationError};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Thresholds and limits for every monitor, plus daemon paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProctorPolicy {
    pub daemon: DaemonConfig,
    pub enrollment: EnrollmentPolicy,
    pub identity: IdentityPolicy,
    pub objects: ObjectPolicy,
    pub gaze: GazePolicy,
    pub iris: IrisPolicy,
}

impl ProctorPolicy {
    /// Convert from raw config, filling unset keys with defaults.
    ///
    /// The result is not checked; call [`ProctorPolicy::validate`] or go
    /// through [`crate::parse_config`].
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            daemon: DaemonConfig::from_raw(raw.daemon),
            enrollment: EnrollmentPolicy::from_raw(raw.enrollment),
            identity: IdentityPolicy::from_raw(raw.identity),
            objects: ObjectPolicy::from_raw(raw.objects),
            gaze: GazePolicy::from_raw(raw.gaze),
            iris: IrisPolicy::from_raw(raw.iris),
        }
    }

    /// Check for degenerate thresholds. Returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let errors = validate_policy(self);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub log_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        let defaults = Self::default();
        Self {
            socket_path: raw.socket_path.unwrap_or(defaults.socket_path),
            log_dir: raw.log_dir.unwrap_or(defaults.log_dir),
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket_path: proctor_util::socket_path_without_env(),
            log_dir: proctor_util::default_log_dir(),
            data_dir: proctor_util::data_dir_without_env(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentPolicy {
    pub stable_frames: u32,
}

impl EnrollmentPolicy {
    pub const DEFAULT_STABLE_FRAMES: u32 = 10;

    fn from_raw(raw: RawEnrollment) -> Self {
        Self {
            stable_frames: raw.stable_frames.unwrap_or(Self::DEFAULT_STABLE_FRAMES),
        }
    }
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            stable_frames: Self::DEFAULT_STABLE_FRAMES,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityPolicy {
    pub tolerance: f64,
    /// Termination happens once the count exceeds this
    pub max_violations: u32,
}

impl IdentityPolicy {
    pub const DEFAULT_TOLERANCE: f64 = 0.45;
    pub const DEFAULT_MAX_VIOLATIONS: u32 = 3;

    fn from_raw(raw: RawIdentity) -> Self {
        Self {
            tolerance: raw.tolerance.unwrap_or(Self::DEFAULT_TOLERANCE),
            max_violations: raw.max_violations.unwrap_or(Self::DEFAULT_MAX_VIOLATIONS),
        }
    }
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            max_violations: Self::DEFAULT_MAX_VIOLATIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectPolicy {
    pub target_labels: BTreeSet<String>,
    pub sample_every_n_frames: u64,
}

impl ObjectPolicy {
    pub const DEFAULT_SAMPLE_EVERY: u64 = 3;

    fn default_labels() -> BTreeSet<String> {
        BTreeSet::from(["cell phone".to_string()])
    }

    fn from_raw(raw: RawObjects) -> Self {
        Self {
            target_labels: raw
                .target_labels
                .map(|labels| labels.into_iter().collect())
                .unwrap_or_else(Self::default_labels),
            sample_every_n_frames: raw.sample_every_n_frames.unwrap_or(Self::DEFAULT_SAMPLE_EVERY),
        }
    }
}

impl Default for ObjectPolicy {
    fn default() -> Self {
        Self {
            target_labels: Self::default_labels(),
            sample_every_n_frames: Self::DEFAULT_SAMPLE_EVERY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GazePolicy {
    pub yaw_threshold_deg: f64,
    pub pitch_up_deg: f64,
    pub pitch_down_deg: f64,
    pub dwell_seconds: f64,
    pub max_per_direction: u32,
    pub max_total: u32,
}

impl GazePolicy {
    pub const DEFAULT_YAW_DEG: f64 = 10.0;
    pub const DEFAULT_PITCH_UP_DEG: f64 = 10.0;
    pub const DEFAULT_PITCH_DOWN_DEG: f64 = -10.0;
    pub const DEFAULT_DWELL_SECONDS: f64 = 5.0;
    pub const DEFAULT_MAX_PER_DIRECTION: u32 = 5;
    pub const DEFAULT_MAX_TOTAL: u32 = 8;

    fn from_raw(raw: RawGaze) -> Self {
        Self {
            yaw_threshold_deg: raw.yaw_threshold_deg.unwrap_or(Self::DEFAULT_YAW_DEG),
            pitch_up_deg: raw.pitch_up_deg.unwrap_or(Self::DEFAULT_PITCH_UP_DEG),
            pitch_down_deg: raw.pitch_down_deg.unwrap_or(Self::DEFAULT_PITCH_DOWN_DEG),
            dwell_seconds: raw.dwell_seconds.unwrap_or(Self::DEFAULT_DWELL_SECONDS),
            max_per_direction: raw.max_per_direction.unwrap_or(Self::DEFAULT_MAX_PER_DIRECTION),
            max_total: raw.max_total.unwrap_or(Self::DEFAULT_MAX_TOTAL),
        }
    }
}

impl Default for GazePolicy {
    fn default() -> Self {
        Self::from_raw(RawGaze::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrisPolicy {
    pub blink_ear_threshold: f64,
    pub ema_alpha: f64,
    pub horizontal_on: f64,
    /// Deviation from center the ratio must return within to leave Left/Right
    pub horizontal_release: f64,
    pub vertical_up_threshold: f64,
    pub dwell_seconds: f64,
    pub fault_limit: u32,
    pub fault_count_divisor: u32,
}

impl IrisPolicy {
    pub const DEFAULT_BLINK_EAR: f64 = 0.17;
    pub const DEFAULT_EMA_ALPHA: f64 = 0.40;
    pub const DEFAULT_H_ON: f64 = 0.019;
    pub const DEFAULT_H_RELEASE: f64 = 0.014;
    pub const DEFAULT_V_UP: f64 = 0.42;
    pub const DEFAULT_DWELL_SECONDS: f64 = 1.5;
    pub const DEFAULT_FAULT_LIMIT: u32 = 15;
    pub const DEFAULT_FAULT_DIVISOR: u32 = 2;

    fn from_raw(raw: RawIris) -> Self {
        Self {
            blink_ear_threshold: raw.blink_ear_threshold.unwrap_or(Self::DEFAULT_BLINK_EAR),
            ema_alpha: raw.ema_alpha.unwrap_or(Self::DEFAULT_EMA_ALPHA),
            horizontal_on: raw.horizontal_on.unwrap_or(Self::DEFAULT_H_ON),
            horizontal_release: raw.horizontal_release.unwrap_or(Self::DEFAULT_H_RELEASE),
            vertical_up_threshold: raw.vertical_up_threshold.unwrap_or(Self::DEFAULT_V_UP),
            dwell_seconds: raw.dwell_seconds.unwrap_or(Self::DEFAULT_DWELL_SECONDS),
            fault_limit: raw.fault_limit.unwrap_or(Self::DEFAULT_FAULT_LIMIT),
            fault_count_divisor: raw.fault_count_divisor.unwrap_or(Self::DEFAULT_FAULT_DIVISOR),
        }
    }
}

impl Default for IrisPolicy {
    fn default() -> Self {
        Self::from_raw(RawIris::default())
    }
}
