//! Session state machine

use chrono::{DateTime, Local};
use proctor_api::{
    Decision, FrameSample, GazeDirection, IdentityFlags, SessionPhase, SessionStatus,
    TerminationEvent, TerminationReason, ViolationCounts, ViolationKind, ViolationSummary,
};
use proctor_config::ProctorPolicy;
use proctor_util::{ProctorError, Result, SessionId};
use std::sync::Arc;
use tracing::info;

use crate::{
    EnrollmentGate, FaceMatcher, GazeClassifier, IdentityMonitor, IrisRefiner, LedgerLimits,
    ObjectPresenceMonitor, Signal, ViolationLedger,
};

/// Everything one tick produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub decision: Decision,
    /// Set on the tick that captured the reference face
    pub enrollment_locked: bool,
    /// Counters incremented this tick, with their new values
    pub counted: Vec<(ViolationKind, u32)>,
}

impl TickOutcome {
    fn proceed() -> Self {
        Self {
            decision: Decision::Continue,
            enrollment_locked: false,
            counted: Vec::new(),
        }
    }

    fn count(&mut self, session_id: &SessionId, kind: ViolationKind, count: u32) {
        info!(session_id = %session_id, ?kind, count, "Violation counted");
        self.counted.push((kind, count));
    }
}

/// One proctored session: enrollment, then monitoring until terminated.
///
/// Frames must arrive in timestamp order. A terminated session rejects
/// further frames.
#[derive(Debug)]
pub struct ProctorSession {
    id: SessionId,
    phase: SessionPhase,
    started_at: DateTime<Local>,

    enrollment: EnrollmentGate,
    identity: IdentityMonitor,
    objects: ObjectPresenceMonitor,
    gaze: GazeClassifier,
    iris: IrisRefiner,
    ledger: ViolationLedger,

    last_flags: IdentityFlags,
    monitor_ticks: u64,
    frames_processed: u64,
    last_timestamp: Option<DateTime<Local>>,
    fps: u32,
    termination: Option<TerminationEvent>,
}

impl ProctorSession {
    /// Build a session. Fails if the policy carries degenerate thresholds.
    pub fn new(
        id: SessionId,
        policy: &ProctorPolicy,
        matcher: Arc<dyn FaceMatcher>,
        started_at: DateTime<Local>,
    ) -> Result<Self> {
        policy.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            ProctorError::config(messages.join("; "))
        })?;

        Ok(Self {
            id,
            phase: SessionPhase::Enrolling,
            started_at,
            enrollment: EnrollmentGate::new(&policy.enrollment),
            identity: IdentityMonitor::new(&policy.identity, matcher),
            objects: ObjectPresenceMonitor::new(&policy.objects),
            gaze: GazeClassifier::new(&policy.gaze),
            iris: IrisRefiner::new(&policy.iris),
            ledger: ViolationLedger::new(LedgerLimits::from_policy(policy)),
            last_flags: IdentityFlags::default(),
            monitor_ticks: 0,
            frames_processed: 0,
            last_timestamp: None,
            fps: 0,
            termination: None,
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn termination(&self) -> Option<&TerminationEvent> {
        self.termination.as_ref()
    }

    /// Process one frame end to end
    pub fn tick(&mut self, frame: &FrameSample) -> Result<TickOutcome> {
        if self.phase == SessionPhase::Terminated {
            return Err(ProctorError::SessionTerminated(self.id.clone()));
        }

        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                return Err(ProctorError::out_of_order(
                    self.id.clone(),
                    format!("frame at {} is earlier than {}", frame.timestamp, last),
                ));
            }
            let dt = proctor_util::elapsed_secs(&last, &frame.timestamp);
            if dt > 0.0 {
                self.fps = (1.0 / dt) as u32;
            }
        }
        self.last_timestamp = Some(frame.timestamp);
        self.frames_processed += 1;

        match self.phase {
            SessionPhase::Enrolling => Ok(self.enroll(frame)),
            _ => self.monitor(frame),
        }
    }

    fn enroll(&mut self, frame: &FrameSample) -> TickOutcome {
        let progress = self
            .enrollment
            .observe(frame.face_count, &frame.face_encodings);

        let mut outcome = TickOutcome::proceed();
        if progress.locked {
            self.phase = SessionPhase::Monitoring;
            outcome.enrollment_locked = true;
            info!(
                session_id = %self.id,
                frames = progress.streak,
                "Enrollment locked, monitoring started"
            );
        }
        outcome
    }

    fn monitor(&mut self, frame: &FrameSample) -> Result<TickOutcome> {
        let mut outcome = TickOutcome::proceed();
        let now = frame.timestamp;
        self.monitor_ticks += 1;

        let reference = self
            .enrollment
            .reference()
            .ok_or_else(|| ProctorError::internal("monitoring without a reference face"))?;
        let flags = self.identity.classify(&frame.face_encodings, reference);
        self.last_flags = flags;

        let before = self.ledger.identity_count();
        let verdict = self.ledger.check(Signal::Identity(flags));
        if self.ledger.identity_count() > before {
            outcome.count(&self.id, ViolationKind::Identity, self.ledger.identity_count());
        }
        if let Some(reason) = verdict {
            return Ok(self.terminate(reason, now, outcome));
        }

        let present = self
            .objects
            .observe(self.monitor_ticks, &frame.detected_objects);
        if let Some(reason) = self.ledger.check(Signal::Device { present }) {
            return Ok(self.terminate(reason, now, outcome));
        }

        if let Some(direction) = self.gaze.observe(frame.head_pose.as_ref(), now) {
            let kind = match direction {
                GazeDirection::Left => ViolationKind::GazeLeft,
                GazeDirection::Right => ViolationKind::GazeRight,
                _ => ViolationKind::GazeUp,
            };
            outcome.count(&self.id, kind, self.gaze.count_for(direction));
        }
        if let Some(reason) = self.ledger.check(Signal::Gaze(self.gaze.counts())) {
            return Ok(self.terminate(reason, now, outcome));
        }

        let iris = self.iris.observe(frame.iris.as_ref(), now);
        if iris.counted() {
            outcome.count(&self.id, ViolationKind::Iris, self.iris.fault_count());
        }
        let fault_count = self.iris.fault_count();
        if let Some(reason) = self.ledger.check(Signal::Iris { fault_count }) {
            return Ok(self.terminate(reason, now, outcome));
        }

        Ok(outcome)
    }

    fn terminate(
        &mut self,
        reason: TerminationReason,
        at: DateTime<Local>,
        mut outcome: TickOutcome,
    ) -> TickOutcome {
        let event = TerminationEvent {
            reason,
            summary: self.summary(at),
            at,
        };

        info!(
            session_id = %self.id,
            reason = %reason,
            face_violations = event.summary.face_violation_count,
            gaze_total = event.summary.gaze_total,
            iris_total = event.summary.iris_total,
            "Session terminated"
        );

        self.phase = SessionPhase::Terminated;
        self.termination = Some(event.clone());
        outcome.decision = Decision::Terminate(event);
        outcome
    }

    /// Counters and flags as of `now`
    pub fn summary(&self, now: DateTime<Local>) -> ViolationSummary {
        let gaze = self.gaze.counts();
        ViolationSummary {
            face_violation_count: self.ledger.identity_count(),
            no_face: self.last_flags.no_face,
            multi_human: self.last_flags.multi_human,
            unknown_present: self.last_flags.unknown_present,
            gaze_left: gaze.left,
            gaze_right: gaze.right,
            gaze_up: gaze.up,
            gaze_total: gaze.total(),
            iris_total: self.iris.fault_count(),
            phone_present: self.objects.is_present(),
            last_gaze_state: self.gaze.current(),
            elapsed_gaze_sec: proctor_util::round_centis(self.gaze.elapsed_secs(now)),
            fps: self.fps,
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            session_id: self.id.clone(),
            phase: self.phase,
            enrolled: self.enrollment.is_locked(),
            enrollment_streak: self.enrollment.streak(),
            enrollment_required: self.enrollment.required(),
            violations: ViolationCounts {
                face: self.ledger.identity_count(),
                gaze: self.gaze.counts(),
                iris_faults: self.iris.fault_count(),
            },
            current_gaze: self.gaze.current(),
            eye_state: self.iris.eye_state(),
            phone_present: self.objects.is_present(),
            frames_processed: self.frames_processed,
            started_at: self.started_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EuclideanMatcher;
    use chrono::{Duration, TimeZone};
    use proctor_api::{EyeMetrics, HeadPose, IrisInput};
    use std::collections::BTreeSet;

    const FRAME_MS: i64 = 100;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 12, 25, 9, 0, 0).unwrap()
    }

    fn me() -> Vec<f64> {
        vec![0.1, 0.2, 0.3]
    }

    struct Feed {
        session: ProctorSession,
        clock: DateTime<Local>,
    }

    impl Feed {
        fn new(policy: &ProctorPolicy) -> Self {
            let session = ProctorSession::new(
                SessionId::new("exam-1"),
                policy,
                Arc::new(EuclideanMatcher),
                t0(),
            )
            .unwrap();
            Self {
                session,
                clock: t0(),
            }
        }

        fn enrolled() -> Self {
            let mut feed = Self::new(&ProctorPolicy::default());
            for _ in 0..10 {
                feed.push(|f| f);
            }
            assert_eq!(feed.session.phase(), SessionPhase::Monitoring);
            feed
        }

        /// A clean frame (enrolled face, forward pose) adjusted by `edit`
        fn frame(&self, edit: impl FnOnce(FrameSample) -> FrameSample) -> FrameSample {
            let mut frame = FrameSample::empty(self.clock);
            frame.face_count = 1;
            frame.face_encodings = vec![me()];
            frame.head_pose = Some(HeadPose {
                pitch_deg: 0.0,
                yaw_deg: 0.0,
                roll_deg: 0.0,
            });
            edit(frame)
        }

        fn push(&mut self, edit: impl FnOnce(FrameSample) -> FrameSample) -> TickOutcome {
            let frame = self.frame(edit);
            self.clock += Duration::milliseconds(FRAME_MS);
            self.session.tick(&frame).unwrap()
        }
    }

    fn no_face(mut f: FrameSample) -> FrameSample {
        f.face_count = 0;
        f.face_encodings.clear();
        f
    }

    fn looking_right(mut f: FrameSample) -> FrameSample {
        f.head_pose = Some(HeadPose {
            pitch_deg: 0.0,
            yaw_deg: 25.0,
            roll_deg: 0.0,
        });
        f
    }

    fn with_phone(mut f: FrameSample) -> FrameSample {
        f.detected_objects = BTreeSet::from(["cell phone".to_string()]);
        f
    }

    #[test]
    fn no_monitoring_during_enrollment() {
        let mut feed = Feed::new(&ProctorPolicy::default());
        for _ in 0..30 {
            let outcome = feed.push(|f| with_phone(no_face(f)));
            assert_eq!(outcome.decision, Decision::Continue);
        }
        assert_eq!(feed.session.phase(), SessionPhase::Enrolling);
        assert_eq!(feed.session.status().violations, ViolationCounts::default());
    }

    #[test]
    fn enrollment_locks_on_tenth_frame() {
        let mut feed = Feed::new(&ProctorPolicy::default());
        for _ in 0..9 {
            assert!(!feed.push(|f| f).enrollment_locked);
        }
        assert!(feed.push(|f| f).enrollment_locked);
        assert!(feed.session.status().enrolled);
    }

    #[test]
    fn identity_termination_after_four_episodes() {
        let mut feed = Feed::enrolled();

        for episode in 1..=3 {
            let outcome = feed.push(no_face);
            assert_eq!(outcome.counted, vec![(ViolationKind::Identity, episode)]);
            feed.push(no_face);
            feed.push(|f| f);
        }

        let outcome = feed.push(no_face);
        let Decision::Terminate(event) = outcome.decision else {
            panic!("expected termination");
        };
        assert_eq!(event.reason, TerminationReason::FaceProctoring);
        assert_eq!(event.summary.face_violation_count, 4);
        assert!(event.summary.no_face);
        assert_eq!(feed.session.phase(), SessionPhase::Terminated);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn terminating_episode_is_logged_at_info() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut feed = Feed::enrolled();
            for _ in 0..3 {
                feed.push(no_face);
                feed.push(|f| f);
            }
            let outcome = feed.push(no_face);
            assert!(outcome.decision.is_terminate());
            assert_eq!(outcome.counted, vec![(ViolationKind::Identity, 4)]);
        });

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let counted: Vec<&str> = text
            .lines()
            .filter(|l| l.contains("Violation counted"))
            .collect();
        assert_eq!(counted.len(), 4);
        assert!(counted.iter().all(|l| l.contains("INFO")));
        assert!(counted[3].contains("count=4"));
        assert!(text.contains("Session terminated"));
    }

    #[test]
    fn terminated_session_rejects_frames() {
        let mut feed = Feed::enrolled();
        // third monitoring tick is sampled
        feed.push(|f| f);
        feed.push(|f| f);
        assert!(feed.push(with_phone).decision.is_terminate());

        let frame = feed.frame(|f| f);
        assert!(matches!(
            feed.session.tick(&frame),
            Err(ProctorError::SessionTerminated(_))
        ));
    }

    #[test]
    fn phone_between_samples_is_not_seen() {
        let mut feed = Feed::enrolled();
        assert!(!feed.push(with_phone).decision.is_terminate());
        assert!(!feed.push(with_phone).decision.is_terminate());
        let outcome = feed.push(with_phone);
        let Decision::Terminate(event) = outcome.decision else {
            panic!("expected termination");
        };
        assert_eq!(event.reason, TerminationReason::DeviceMobile);
        assert!(event.summary.phone_present);
    }

    #[test]
    fn identity_beats_device_on_same_tick() {
        let mut feed = Feed::enrolled();
        // three separated episodes, no phone visible
        for _ in 0..3 {
            feed.push(no_face);
            feed.push(|f| f);
            feed.push(|f| f);
        }
        assert_eq!(feed.session.status().violations.face, 3);
        feed.push(|f| f);
        feed.push(|f| f);

        let outcome = feed.push(|f| with_phone(no_face(f)));
        assert_eq!(feed.session.monitor_ticks, 12);
        let Decision::Terminate(event) = outcome.decision else {
            panic!("expected termination");
        };
        assert_eq!(event.reason, TerminationReason::FaceProctoring);
    }

    #[test]
    fn gaze_termination_after_six_right_episodes() {
        let mut feed = Feed::enrolled();
        let per_episode = (5_000 / FRAME_MS) as usize + 1;

        let mut terminated = None;
        'episodes: for _ in 0..6 {
            for _ in 0..per_episode {
                let outcome = feed.push(looking_right);
                if let Decision::Terminate(event) = outcome.decision {
                    terminated = Some(event);
                    break 'episodes;
                }
            }
            feed.push(|f| f);
        }

        let event = terminated.expect("session should terminate");
        assert_eq!(event.reason, TerminationReason::GazeAway);
        assert_eq!(event.summary.gaze_right, 6);
        assert!(event.summary.gaze_total >= 6);
        assert_eq!(event.summary.last_gaze_state, GazeDirection::Right);
        assert_eq!(event.summary.elapsed_gaze_sec, 5.0);
        assert_eq!(event.summary.fps, 10);
    }

    #[test]
    fn out_of_order_frame_rejected() {
        let mut feed = Feed::enrolled();
        let mut frame = feed.frame(|f| f);
        frame.timestamp = t0() - Duration::seconds(1);

        let err = feed.session.tick(&frame).unwrap_err();
        assert!(matches!(err, ProctorError::OutOfOrderFrame { .. }));
        assert_eq!(feed.session.phase(), SessionPhase::Monitoring);

        // equal timestamps are accepted
        let frame = feed.frame(|f| f);
        feed.session.tick(&frame).unwrap();
        feed.session.tick(&frame).unwrap();
    }

    #[test]
    fn blink_frames_do_not_move_iris_state() {
        let mut feed = Feed::enrolled();
        let eye = |h, ear| EyeMetrics {
            gaze_h: h,
            gaze_v: 0.5,
            ear,
        };

        feed.push(|mut f| {
            f.iris = Some(IrisInput::Metrics {
                left: eye(0.5, 0.3),
                right: eye(0.5, 0.3),
            });
            f
        });
        for _ in 0..40 {
            feed.push(|mut f| {
                f.iris = Some(IrisInput::Metrics {
                    left: eye(0.0, 0.05),
                    right: eye(0.0, 0.05),
                });
                f
            });
        }

        let status = feed.session.status();
        assert_eq!(status.eye_state, proctor_api::EyeState::Center);
        assert_eq!(status.violations.iris_faults, 0);
    }

    #[test]
    fn degenerate_policy_rejected() {
        let mut policy = ProctorPolicy::default();
        policy.iris.fault_count_divisor = 0;
        let result = ProctorSession::new(
            SessionId::new("exam-1"),
            &policy,
            Arc::new(EuclideanMatcher),
            t0(),
        );
        assert!(matches!(result, Err(ProctorError::ConfigError(_))));
    }
}
