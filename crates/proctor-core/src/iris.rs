//! Iris-based gaze refinement
//!
//! Normalized iris position per eye, averaged over both eyes, smoothed with
//! an exponential moving average and fed through a hysteresis state machine.
//! Frames where the eyes are nearly closed are skipped entirely.

use chrono::{DateTime, Local};
use proctor_api::{EyeLandmarks, EyeMetrics, EyeState, IrisInput, Point2};
use proctor_config::IrisPolicy;
use tracing::debug;

const CENTER: f64 = 0.5;

/// Ratios for one eye from its eyelid corners and iris contour.
///
/// Returns `None` when no iris points were supplied.
pub fn eye_metrics(eye: &EyeLandmarks) -> Option<EyeMetrics> {
    if eye.iris.is_empty() {
        return None;
    }

    let n = eye.iris.len() as f64;
    let center = eye.iris.iter().fold(Point2::new(0.0, 0.0), |acc, p| {
        Point2::new(acc.x + p.x / n, acc.y + p.y / n)
    });

    let width = eye.left_corner.distance(&eye.right_corner).max(1.0);
    let height = eye.top.distance(&eye.bottom).max(1.0);

    Some(EyeMetrics {
        gaze_h: ((center.x - eye.left_corner.x) / width).clamp(0.0, 1.0),
        gaze_v: ((center.y - eye.top.y) / height).clamp(0.0, 1.0),
        ear: height / width,
    })
}

pub fn average_eyes(a: &EyeMetrics, b: &EyeMetrics) -> EyeMetrics {
    EyeMetrics {
        gaze_h: (a.gaze_h + b.gaze_h) * 0.5,
        gaze_v: (a.gaze_v + b.gaze_v) * 0.5,
        ear: (a.ear + b.ear) * 0.5,
    }
}

/// Both-eye average for a frame, or `None` if the landmarks are unusable
pub fn frame_metrics(input: &IrisInput) -> Option<EyeMetrics> {
    match input {
        IrisInput::Metrics { left, right } => Some(average_eyes(left, right)),
        IrisInput::Landmarks { left, right } => {
            Some(average_eyes(&eye_metrics(left)?, &eye_metrics(right)?))
        }
    }
}

/// Next eye state given smoothed ratios.
///
/// Left/Right are entered beyond `horizontal_on` from center and released only
/// once the ratio is back within `horizontal_release` of center (inclusive), which must be
/// narrower than the enter band. Up has no separate release band. From
/// Left/Right, Up preempts.
pub fn next_eye_state(prev: EyeState, h: f64, v: f64, policy: &IrisPolicy) -> EyeState {
    let on = policy.horizontal_on;
    let release = policy.horizontal_release;
    let deviation = h - CENTER;

    let up_on = v < policy.vertical_up_threshold;
    let left_on = deviation < -on;
    let left_off = deviation >= -release;
    let right_on = deviation > on;
    let right_off = deviation <= release;

    match prev {
        EyeState::Up if up_on => EyeState::Up,
        EyeState::Up => EyeState::Center,
        EyeState::Left | EyeState::Right if up_on => EyeState::Up,
        EyeState::Left if left_off => EyeState::Center,
        EyeState::Right if right_off => EyeState::Center,
        EyeState::Left | EyeState::Right => prev,
        EyeState::Center if up_on => EyeState::Up,
        EyeState::Center if left_on => EyeState::Left,
        EyeState::Center if right_on => EyeState::Right,
        EyeState::Center => EyeState::Center,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultState {
    Ok,
    Fault,
}

/// What one iris observation did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IrisUpdate {
    /// No usable iris reading this tick
    NoReading,
    /// Eyes closed; nothing was updated
    Blink { ear: f64 },
    Measured { eye_state: EyeState, counted: bool },
}

impl IrisUpdate {
    pub fn counted(&self) -> bool {
        matches!(self, IrisUpdate::Measured { counted: true, .. })
    }
}

#[derive(Debug, Clone)]
pub struct IrisRefiner {
    policy: IrisPolicy,
    smoothed: Option<(f64, f64)>,
    eye_state: EyeState,
    fault_state: FaultState,
    fault_entered_at: Option<DateTime<Local>>,
    episode_active: bool,
    fault_count: u32,
}

impl IrisRefiner {
    pub fn new(policy: &IrisPolicy) -> Self {
        Self {
            policy: policy.clone(),
            smoothed: None,
            eye_state: EyeState::Center,
            fault_state: FaultState::Ok,
            fault_entered_at: None,
            episode_active: false,
            fault_count: 0,
        }
    }

    pub fn observe(&mut self, input: Option<&IrisInput>, now: DateTime<Local>) -> IrisUpdate {
        let Some(metrics) = input.and_then(frame_metrics) else {
            return IrisUpdate::NoReading;
        };

        if metrics.ear < self.policy.blink_ear_threshold {
            return IrisUpdate::Blink { ear: metrics.ear };
        }

        let alpha = self.policy.ema_alpha;
        let (h, v) = match self.smoothed {
            Some((h, v)) => (
                (1.0 - alpha) * h + alpha * metrics.gaze_h,
                (1.0 - alpha) * v + alpha * metrics.gaze_v,
            ),
            None => (metrics.gaze_h, metrics.gaze_v),
        };
        self.smoothed = Some((h, v));

        let next = next_eye_state(self.eye_state, h, v, &self.policy);
        if next != self.eye_state {
            debug!(from = ?self.eye_state, to = ?next, h, v, "Eye state changed");
        }
        self.eye_state = next;

        let fault_state = if next.is_fault() {
            FaultState::Fault
        } else {
            FaultState::Ok
        };
        if fault_state != self.fault_state {
            self.fault_state = fault_state;
            self.fault_entered_at = Some(now);
            self.episode_active = false;
        }

        let mut counted = false;
        if fault_state == FaultState::Fault && !self.episode_active {
            let held = self
                .fault_entered_at
                .map(|entered| proctor_util::elapsed_secs(&entered, &now))
                .unwrap_or(0.0);
            if held >= self.policy.dwell_seconds {
                self.fault_count += 1;
                self.episode_active = true;
                counted = true;
            }
        }

        IrisUpdate::Measured {
            eye_state: next,
            counted,
        }
    }

    pub fn eye_state(&self) -> EyeState {
        self.eye_state
    }

    pub fn fault_state(&self) -> FaultState {
        self.fault_state
    }

    pub fn fault_count(&self) -> u32 {
        self.fault_count
    }

    pub fn smoothed(&self) -> Option<(f64, f64)> {
        self.smoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proctor_config::ProctorPolicy;

    fn at(secs: f64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 25, 10, 0, 0).unwrap()
            + Duration::milliseconds((secs * 1000.0) as i64)
    }

    fn metrics(h: f64, v: f64, ear: f64) -> IrisInput {
        let eye = EyeMetrics {
            gaze_h: h,
            gaze_v: v,
            ear,
        };
        IrisInput::Metrics { left: eye, right: eye }
    }

    fn unsmoothed() -> IrisPolicy {
        IrisPolicy {
            ema_alpha: 1.0,
            ..IrisPolicy::default()
        }
    }

    #[test]
    fn landmark_ratios() {
        let eye = EyeLandmarks {
            left_corner: Point2::new(100.0, 50.0),
            right_corner: Point2::new(140.0, 50.0),
            top: Point2::new(120.0, 40.0),
            bottom: Point2::new(120.0, 52.0),
            iris: vec![Point2::new(118.0, 44.0), Point2::new(122.0, 48.0)],
        };
        let m = eye_metrics(&eye).unwrap();
        assert!((m.gaze_h - 0.5).abs() < 1e-9);
        assert!((m.gaze_v - 0.5).abs() < 1e-9);
        assert!((m.ear - 0.3).abs() < 1e-9);
    }

    #[test]
    fn degenerate_eye_box_is_floored_and_clamped() {
        let p = Point2::new(10.0, 10.0);
        let eye = EyeLandmarks {
            left_corner: p,
            right_corner: p,
            top: p,
            bottom: p,
            iris: vec![Point2::new(15.0, 5.0)],
        };
        let m = eye_metrics(&eye).unwrap();
        assert_eq!(m.gaze_h, 1.0);
        assert_eq!(m.gaze_v, 0.0);
        assert_eq!(m.ear, 1.0);
    }

    #[test]
    fn missing_iris_points_yield_no_reading() {
        let p = Point2::new(0.0, 0.0);
        let eye = EyeLandmarks {
            left_corner: p,
            right_corner: Point2::new(30.0, 0.0),
            top: p,
            bottom: Point2::new(0.0, 10.0),
            iris: vec![],
        };
        let input = IrisInput::Landmarks {
            left: eye.clone(),
            right: eye,
        };
        let mut refiner = IrisRefiner::new(&IrisPolicy::default());
        assert_eq!(refiner.observe(Some(&input), at(0.0)), IrisUpdate::NoReading);
    }

    #[test]
    fn center_prefers_up_then_left_then_right() {
        let p = IrisPolicy::default();
        assert_eq!(next_eye_state(EyeState::Center, 0.3, 0.3, &p), EyeState::Up);
        assert_eq!(next_eye_state(EyeState::Center, 0.3, 0.5, &p), EyeState::Left);
        assert_eq!(next_eye_state(EyeState::Center, 0.7, 0.5, &p), EyeState::Right);
        assert_eq!(next_eye_state(EyeState::Center, 0.49, 0.5, &p), EyeState::Center);
    }

    #[test]
    fn retreat_inside_band_keeps_state() {
        let p = IrisPolicy::default();
        // entered below 0.481, retreat to just above the on threshold
        assert_eq!(next_eye_state(EyeState::Center, 0.47, 0.5, &p), EyeState::Left);
        assert_eq!(next_eye_state(EyeState::Left, 0.483, 0.5, &p), EyeState::Left);
        assert_eq!(next_eye_state(EyeState::Center, 0.483, 0.5, &p), EyeState::Center);
        assert_eq!(next_eye_state(EyeState::Left, 0.49, 0.5, &p), EyeState::Center);

        assert_eq!(next_eye_state(EyeState::Right, 0.517, 0.5, &p), EyeState::Right);
        assert_eq!(next_eye_state(EyeState::Right, 0.51, 0.5, &p), EyeState::Center);
    }

    #[test]
    fn centered_iris_always_releases() {
        let wide = IrisPolicy {
            horizontal_on: 0.019,
            horizontal_release: 0.018,
            ..IrisPolicy::default()
        };
        let narrow = IrisPolicy {
            horizontal_release: 0.0,
            ..IrisPolicy::default()
        };
        for p in [IrisPolicy::default(), wide, narrow] {
            let policy = ProctorPolicy {
                iris: p.clone(),
                ..ProctorPolicy::default()
            };
            assert!(policy.validate().is_ok());
            assert_eq!(next_eye_state(EyeState::Left, 0.5, 0.5, &p), EyeState::Center);
            assert_eq!(next_eye_state(EyeState::Right, 0.5, 0.5, &p), EyeState::Center);
        }

        let wide = IrisPolicy {
            horizontal_release: 0.018,
            ..IrisPolicy::default()
        };
        // 0.483 is inside the default hold band but past the wider release
        assert_eq!(next_eye_state(EyeState::Left, 0.483, 0.5, &wide), EyeState::Center);
        assert_eq!(next_eye_state(EyeState::Left, 0.481, 0.5, &wide), EyeState::Left);
    }

    #[test]
    fn up_preempts_horizontal_states() {
        let p = IrisPolicy::default();
        assert_eq!(next_eye_state(EyeState::Left, 0.45, 0.3, &p), EyeState::Up);
        assert_eq!(next_eye_state(EyeState::Right, 0.5, 0.3, &p), EyeState::Up);
        assert_eq!(next_eye_state(EyeState::Up, 0.3, 0.42, &p), EyeState::Center);
    }

    #[test]
    fn first_sample_initializes_smoothing() {
        let mut refiner = IrisRefiner::new(&IrisPolicy::default());
        refiner.observe(Some(&metrics(0.6, 0.5, 0.3)), at(0.0));
        assert_eq!(refiner.smoothed(), Some((0.6, 0.5)));

        refiner.observe(Some(&metrics(0.1, 0.5, 0.3)), at(0.1));
        let (h, _) = refiner.smoothed().unwrap();
        assert!((h - 0.4).abs() < 1e-9);
    }

    #[test]
    fn blink_leaves_state_untouched() {
        let mut refiner = IrisRefiner::new(&unsmoothed());
        refiner.observe(Some(&metrics(0.3, 0.5, 0.3)), at(0.0));
        assert_eq!(refiner.eye_state(), EyeState::Left);
        let before = refiner.smoothed();

        let update = refiner.observe(Some(&metrics(0.5, 0.5, 0.1)), at(0.5));
        assert!(matches!(update, IrisUpdate::Blink { .. }));
        assert_eq!(refiner.smoothed(), before);
        assert_eq!(refiner.eye_state(), EyeState::Left);
        assert_eq!(refiner.fault_state(), FaultState::Fault);
    }

    #[test]
    fn fault_counted_once_after_dwell() {
        let mut refiner = IrisRefiner::new(&unsmoothed());
        let away = metrics(0.2, 0.5, 0.3);

        assert!(!refiner.observe(Some(&away), at(0.0)).counted());
        assert!(!refiner.observe(Some(&away), at(1.0)).counted());
        assert!(refiner.observe(Some(&away), at(1.5)).counted());
        assert!(!refiner.observe(Some(&away), at(5.0)).counted());
        assert_eq!(refiner.fault_count(), 1);

        // switching between fault states does not restart the episode
        refiner.observe(Some(&metrics(0.2, 0.1, 0.3)), at(6.0));
        assert_eq!(refiner.eye_state(), EyeState::Up);
        refiner.observe(Some(&metrics(0.2, 0.1, 0.3)), at(9.0));
        assert_eq!(refiner.fault_count(), 1);

        refiner.observe(Some(&metrics(0.5, 0.5, 0.3)), at(10.0));
        refiner.observe(Some(&away), at(11.0));
        refiner.observe(Some(&away), at(12.5));
        assert_eq!(refiner.fault_count(), 2);
    }

    #[test]
    fn absent_reading_is_inert() {
        let mut refiner = IrisRefiner::new(&unsmoothed());
        refiner.observe(Some(&metrics(0.2, 0.5, 0.3)), at(0.0));
        assert_eq!(refiner.observe(None, at(3.0)), IrisUpdate::NoReading);
        assert_eq!(refiner.fault_count(), 0);
    }
}
