//! Shared types for the proctord API

use chrono::{DateTime, Local};
use proctor_util::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Head-pose angles solved from facial landmarks, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch_deg: f64,
    pub yaw_deg: f64,
    #[serde(default)]
    pub roll_deg: f64,
}

/// Pixel-space landmark position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Eyelid and iris landmarks for a single eye
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left_corner: Point2,
    pub right_corner: Point2,
    pub top: Point2,
    pub bottom: Point2,
    /// Iris contour points; their mean is the iris center
    pub iris: Vec<Point2>,
}

/// Normalized iris position and eye openness for a single eye
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeMetrics {
    /// 0 = iris at the left corner, 1 = at the right corner
    pub gaze_h: f64,
    /// 0 = iris at the upper lid, 1 = at the lower lid
    pub gaze_v: f64,
    /// Eye aspect ratio (height / width)
    pub ear: f64,
}

/// Iris measurement for one frame.
///
/// Collaborators may send either precomputed per-eye ratios or the raw
/// landmarks; the core derives ratios from landmarks itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IrisInput {
    Metrics { left: EyeMetrics, right: EyeMetrics },
    Landmarks { left: EyeLandmarks, right: EyeLandmarks },
}

/// One frame's worth of measurements from the vision collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// Number of faces the detector reported
    #[serde(default)]
    pub face_count: usize,
    /// Face embeddings, one per recognized face
    #[serde(default)]
    pub face_encodings: Vec<Vec<f64>>,
    /// Head pose, absent when no face mesh was solved
    #[serde(default)]
    pub head_pose: Option<HeadPose>,
    /// Iris measurement, absent when no face mesh was found
    #[serde(default)]
    pub iris: Option<IrisInput>,
    /// Object detector labels; only meaningful on sampled frames
    #[serde(default)]
    pub detected_objects: BTreeSet<String>,
    /// Capture time of the frame
    pub timestamp: DateTime<Local>,
}

impl FrameSample {
    /// A frame with no measurements at all
    pub fn empty(timestamp: DateTime<Local>) -> Self {
        Self {
            face_count: 0,
            face_encodings: Vec::new(),
            head_pose: None,
            iris: None,
            detected_objects: BTreeSet::new(),
            timestamp,
        }
    }
}

/// Coarse gaze direction derived from head pose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeDirection {
    Forward,
    Left,
    Right,
    Up,
    Down,
    NoFace,
}

impl GazeDirection {
    /// Human-readable label used in logs and summaries
    pub fn label(&self) -> &'static str {
        match self {
            GazeDirection::Forward => "Forward",
            GazeDirection::Left => "Looking Left",
            GazeDirection::Right => "Looking Right",
            GazeDirection::Up => "Looking Up",
            GazeDirection::Down => "Looking Down",
            GazeDirection::NoFace => "No face",
        }
    }

    /// Whether sustained gaze in this direction counts as a violation
    pub fn is_disallowed(&self) -> bool {
        matches!(
            self,
            GazeDirection::Left | GazeDirection::Right | GazeDirection::Up
        )
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fine-grained eye position state from the iris hysteresis machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EyeState {
    Center,
    Left,
    Right,
    Up,
}

impl EyeState {
    pub fn is_fault(&self) -> bool {
        !matches!(self, EyeState::Center)
    }
}

/// Lifecycle of a proctored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Enrolling,
    Monitoring,
    Terminated,
}

/// Why a session was terminated for cause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    FaceProctoring,
    DeviceMobile,
    GazeAway,
    IrisMismatch,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationReason::FaceProctoring => "face_proctoring",
            TerminationReason::DeviceMobile => "device_mobile",
            TerminationReason::GazeAway => "gaze_away",
            TerminationReason::IrisMismatch => "iris_mismatch",
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity classification of the visible faces for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityFlags {
    pub no_face: bool,
    pub multi_human: bool,
    pub unknown_present: bool,
    pub matched_any: bool,
}

impl IdentityFlags {
    pub fn is_violation(&self) -> bool {
        self.no_face || self.multi_human || self.unknown_present
    }
}

/// Sustained-gaze episode counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GazeCounts {
    pub left: u32,
    pub right: u32,
    pub up: u32,
}

impl GazeCounts {
    pub fn total(&self) -> u32 {
        self.left + self.right + self.up
    }
}

/// Snapshot of every counter a session keeps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCounts {
    pub face: u32,
    pub gaze: GazeCounts,
    pub iris_faults: u32,
}

/// Flat record describing the session state at termination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationSummary {
    pub face_violation_count: u32,
    pub no_face: bool,
    pub multi_human: bool,
    pub unknown_present: bool,
    pub gaze_left: u32,
    pub gaze_right: u32,
    pub gaze_up: u32,
    pub gaze_total: u32,
    pub iris_total: u32,
    pub phone_present: bool,
    pub last_gaze_state: GazeDirection,
    /// Dwell in the current gaze state, rounded to two decimals
    pub elapsed_gaze_sec: f64,
    /// Observed processing rate in frames per second
    pub fps: u32,
}

/// Terminal event produced when a session is ended for cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationEvent {
    pub reason: TerminationReason,
    pub summary: ViolationSummary,
    pub at: DateTime<Local>,
}

/// Outcome of a single tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Continue,
    Terminate(TerminationEvent),
}

impl Decision {
    pub fn is_terminate(&self) -> bool {
        matches!(self, Decision::Terminate(_))
    }
}

/// Which counter a violation episode was recorded against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Identity,
    GazeLeft,
    GazeRight,
    GazeUp,
    Iris,
}

/// Externally visible session status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: SessionId,
    pub phase: SessionPhase,
    pub enrolled: bool,
    pub enrollment_streak: u32,
    pub enrollment_required: u32,
    pub violations: ViolationCounts,
    pub current_gaze: GazeDirection,
    pub eye_state: EyeState,
    pub phone_present: bool,
    pub frames_processed: u64,
    pub started_at: DateTime<Local>,
}

/// Result of submitting one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub decision: Decision,
    pub status: SessionStatus,
}

/// Role for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientRole {
    /// Capture pipeline or exam backend - can start, feed, and stop sessions
    Operator,
    /// Read-only observer (dashboards)
    Observer,
}

impl ClientRole {
    pub fn can_control_sessions(&self) -> bool {
        matches!(self, ClientRole::Operator)
    }
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub ready: bool,
    pub store_ok: bool,
    pub active_sessions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn iris_input_accepts_precomputed_metrics() {
        let json = r#"{
            "left":  {"gaze_h": 0.5, "gaze_v": 0.5, "ear": 0.3},
            "right": {"gaze_h": 0.4, "gaze_v": 0.6, "ear": 0.28}
        }"#;
        let parsed: IrisInput = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, IrisInput::Metrics { .. }));
    }

    #[test]
    fn iris_input_accepts_landmarks() {
        let json = r#"{
            "left": {
                "left_corner": {"x": 0, "y": 10}, "right_corner": {"x": 30, "y": 10},
                "top": {"x": 15, "y": 5}, "bottom": {"x": 15, "y": 15},
                "iris": [{"x": 15, "y": 10}]
            },
            "right": {
                "left_corner": {"x": 50, "y": 10}, "right_corner": {"x": 80, "y": 10},
                "top": {"x": 65, "y": 5}, "bottom": {"x": 65, "y": 15},
                "iris": [{"x": 65, "y": 10}]
            }
        }"#;
        let parsed: IrisInput = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed, IrisInput::Landmarks { .. }));
    }

    #[test]
    fn frame_sample_defaults_missing_measurements() {
        let json = r#"{"timestamp": "2025-12-25T14:30:00+00:00"}"#;
        let frame: FrameSample = serde_json::from_str(json).unwrap();
        assert_eq!(frame.face_count, 0);
        assert!(frame.face_encodings.is_empty());
        assert!(frame.head_pose.is_none());
        assert!(frame.iris.is_none());
        assert!(frame.detected_objects.is_empty());
    }

    #[test]
    fn decision_is_tagged() {
        let summary = ViolationSummary {
            face_violation_count: 4,
            no_face: true,
            multi_human: false,
            unknown_present: false,
            gaze_left: 0,
            gaze_right: 0,
            gaze_up: 0,
            gaze_total: 0,
            iris_total: 0,
            phone_present: false,
            last_gaze_state: GazeDirection::Forward,
            elapsed_gaze_sec: 1.25,
            fps: 20,
        };
        let decision = Decision::Terminate(TerminationEvent {
            reason: TerminationReason::FaceProctoring,
            summary,
            at: Local.with_ymd_and_hms(2025, 12, 25, 14, 30, 0).unwrap(),
        });

        let json = serde_json::to_string(&decision).unwrap();
        assert!(json.contains("\"decision\":\"terminate\""));
        assert!(json.contains("\"reason\":\"face_proctoring\""));

        let continue_json = serde_json::to_string(&Decision::Continue).unwrap();
        assert_eq!(continue_json, r#"{"decision":"continue"}"#);
    }

    #[test]
    fn disallowed_directions() {
        assert!(GazeDirection::Left.is_disallowed());
        assert!(GazeDirection::Right.is_disallowed());
        assert!(GazeDirection::Up.is_disallowed());
        assert!(!GazeDirection::Down.is_disallowed());
        assert!(!GazeDirection::Forward.is_disallowed());
        assert!(!GazeDirection::NoFace.is_disallowed());
    }
}
