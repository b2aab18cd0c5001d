//! Head-pose gaze direction with dwell-gated episode counting

use chrono::{DateTime, Local};
use proctor_api::{GazeCounts, GazeDirection, HeadPose};
use proctor_config::GazePolicy;
use std::collections::HashSet;
use tracing::debug;

/// Map pose angles to a direction. First match wins.
pub fn classify_direction(pitch_deg: f64, yaw_deg: f64, policy: &GazePolicy) -> GazeDirection {
    if yaw_deg < -policy.yaw_threshold_deg {
        GazeDirection::Left
    } else if yaw_deg > policy.yaw_threshold_deg {
        GazeDirection::Right
    } else if pitch_deg > policy.pitch_up_deg {
        GazeDirection::Up
    } else if pitch_deg < policy.pitch_down_deg {
        GazeDirection::Down
    } else {
        GazeDirection::Forward
    }
}

/// Tracks the current head direction and counts sustained looks away.
///
/// A disallowed direction held for at least the dwell time counts one
/// episode. The episode stays counted until the direction changes.
#[derive(Debug, Clone)]
pub struct GazeClassifier {
    policy: GazePolicy,
    current: GazeDirection,
    entered_at: Option<DateTime<Local>>,
    episode_active: HashSet<GazeDirection>,
    counts: GazeCounts,
}

impl GazeClassifier {
    pub fn new(policy: &GazePolicy) -> Self {
        Self {
            policy: policy.clone(),
            current: GazeDirection::Forward,
            entered_at: None,
            episode_active: HashSet::new(),
            counts: GazeCounts::default(),
        }
    }

    pub fn classify(&self, pose: &HeadPose) -> GazeDirection {
        classify_direction(pose.pitch_deg, pose.yaw_deg, &self.policy)
    }

    /// Feed one tick. Returns the direction whose count was incremented, if any.
    ///
    /// A missing pose leaves direction, timer and counts untouched.
    pub fn observe(&mut self, pose: Option<&HeadPose>, now: DateTime<Local>) -> Option<GazeDirection> {
        let pose = pose?;
        let direction = self.classify(pose);

        if direction != self.current || self.entered_at.is_none() {
            if direction != self.current {
                debug!(from = %self.current, to = %direction, "Gaze direction changed");
            }
            self.current = direction;
            self.entered_at = Some(now);
            self.episode_active.retain(|d| *d == direction);
        }

        if !direction.is_disallowed() || self.episode_active.contains(&direction) {
            return None;
        }

        if self.elapsed_secs(now) >= self.policy.dwell_seconds {
            self.episode_active.insert(direction);
            match direction {
                GazeDirection::Left => self.counts.left += 1,
                GazeDirection::Right => self.counts.right += 1,
                GazeDirection::Up => self.counts.up += 1,
                _ => return None,
            }
            return Some(direction);
        }

        None
    }

    pub fn current(&self) -> GazeDirection {
        self.current
    }

    pub fn counts(&self) -> GazeCounts {
        self.counts
    }

    pub fn count_for(&self, direction: GazeDirection) -> u32 {
        match direction {
            GazeDirection::Left => self.counts.left,
            GazeDirection::Right => self.counts.right,
            GazeDirection::Up => self.counts.up,
            _ => 0,
        }
    }

    /// Seconds spent in the current direction as of `now`
    pub fn elapsed_secs(&self, now: DateTime<Local>) -> f64 {
        self.entered_at
            .map(|entered| proctor_util::elapsed_secs(&entered, &now))
            .unwrap_or(0.0)
    }
}
