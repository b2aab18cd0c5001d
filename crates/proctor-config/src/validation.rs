//! Configuration validation

use crate::policy::ProctorPolicy;
use crate::schema::RawConfig;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("[{section}] {field}: {message}")]
    FieldError {
        section: &'static str,
        field: &'static str,
        message: String,
    },

    #[error("[iris] horizontal_release ({release}) must be below horizontal_on ({on})")]
    HysteresisBand { on: f64, release: f64 },

    #[error("[gaze] pitch_down_deg ({down}) must be below pitch_up_deg ({up})")]
    PitchBand { up: f64, down: f64 },

    #[error("[objects] target_labels must contain at least one non-empty label")]
    EmptyTargetLabels,
}

impl ValidationError {
    fn field(section: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        Self::FieldError {
            section,
            field,
            message: message.into(),
        }
    }
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    validate_policy(&ProctorPolicy::from_raw(config.clone()))
}

/// Validate a policy, collecting every problem rather than stopping at the first.
pub fn validate_policy(policy: &ProctorPolicy) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if policy.enrollment.stable_frames == 0 {
        errors.push(ValidationError::field("enrollment", "stable_frames", "must be at least 1"));
    }

    let identity = &policy.identity;
    if !identity.tolerance.is_finite() || identity.tolerance < 0.0 {
        errors.push(ValidationError::field(
            "identity",
            "tolerance",
            format!("must be a non-negative number, got {}", identity.tolerance),
        ));
    }

    let objects = &policy.objects;
    if objects.target_labels.iter().all(|l| l.trim().is_empty()) {
        errors.push(ValidationError::EmptyTargetLabels);
    }
    if objects.sample_every_n_frames == 0 {
        errors.push(ValidationError::field("objects", "sample_every_n_frames", "must be at least 1"));
    }

    let gaze = &policy.gaze;
    for (field, value) in [
        ("yaw_threshold_deg", gaze.yaw_threshold_deg),
        ("pitch_up_deg", gaze.pitch_up_deg),
        ("pitch_down_deg", gaze.pitch_down_deg),
    ] {
        if !value.is_finite() {
            errors.push(ValidationError::field("gaze", field, "must be finite"));
        }
    }
    if gaze.yaw_threshold_deg.is_finite() && gaze.yaw_threshold_deg <= 0.0 {
        errors.push(ValidationError::field("gaze", "yaw_threshold_deg", "must be positive"));
    }
    if gaze.pitch_down_deg >= gaze.pitch_up_deg {
        errors.push(ValidationError::PitchBand {
            up: gaze.pitch_up_deg,
            down: gaze.pitch_down_deg,
        });
    }
    check_dwell(&mut errors, "gaze", gaze.dwell_seconds);

    let iris = &policy.iris;
    if !(iris.ema_alpha > 0.0 && iris.ema_alpha <= 1.0) {
        errors.push(ValidationError::field(
            "iris",
            "ema_alpha",
            format!("must be in (0, 1], got {}", iris.ema_alpha),
        ));
    }
    for (field, value) in [
        ("blink_ear_threshold", iris.blink_ear_threshold),
        ("horizontal_on", iris.horizontal_on),
        ("horizontal_release", iris.horizontal_release),
        ("vertical_up_threshold", iris.vertical_up_threshold),
    ] {
        if !value.is_finite() || value < 0.0 {
            errors.push(ValidationError::field(
                "iris",
                field,
                format!("must be a non-negative number, got {}", value),
            ));
        }
    }
    if iris.horizontal_release >= iris.horizontal_on {
        errors.push(ValidationError::HysteresisBand {
            on: iris.horizontal_on,
            release: iris.horizontal_release,
        });
    }
    check_dwell(&mut errors, "iris", iris.dwell_seconds);
    if iris.fault_count_divisor == 0 {
        errors.push(ValidationError::field("iris", "fault_count_divisor", "must be at least 1"));
    }

    errors
}

fn check_dwell(errors: &mut Vec<ValidationError>, section: &'static str, secs: f64) {
    if !secs.is_finite() || secs <= 0.0 {
        errors.push(ValidationError::field(
            section,
            "dwell_seconds",
            format!("must be a positive number of seconds, got {}", secs),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn minimal_config_is_valid() {
        assert!(validate_config(&raw("config_version = 1")).is_empty());
    }

    #[test]
    fn zero_stable_frames_rejected() {
        let errors = validate_config(&raw(
            "config_version = 1\n[enrollment]\nstable_frames = 0",
        ));
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationError::FieldError { field: "stable_frames", .. }
        ));
    }

    #[test]
    fn release_at_or_beyond_enter_threshold_rejected() {
        for release in ["0.019", "0.05"] {
            let errors = validate_config(&raw(&format!(
                "config_version = 1\n[iris]\nhorizontal_on = 0.019\nhorizontal_release = {}",
                release
            )));
            assert_eq!(errors.len(), 1, "release {}", release);
            assert!(matches!(errors[0], ValidationError::HysteresisBand { .. }));
        }
    }

    #[test]
    fn negative_release_rejected() {
        let errors = validate_config(&raw(
            "config_version = 1\n[iris]\nhorizontal_release = -0.01",
        ));
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ValidationError::FieldError { field: "horizontal_release", .. }
        ));
    }

    #[test]
    fn zero_release_is_allowed() {
        let errors = validate_config(&raw(
            "config_version = 1\n[iris]\nhorizontal_release = 0.0",
        ));
        assert!(errors.is_empty());
    }

    #[test]
    fn collects_all_errors() {
        let errors = validate_config(&raw(
            r#"
            config_version = 1
            [objects]
            target_labels = []
            sample_every_n_frames = 0
            [gaze]
            dwell_seconds = 0.0
            [iris]
            ema_alpha = 1.5
            fault_count_divisor = 0
        "#,
        ));
        assert_eq!(errors.len(), 5);
    }

    #[test]
    fn negative_dwell_rejected() {
        let errors = validate_config(&raw("config_version = 1\n[iris]\ndwell_seconds = -1.0"));
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("dwell_seconds")));
    }
}
