//! Session registry and engine

use chrono::{DateTime, Local};
use proctor_api::{Decision, FrameResult, FrameSample, SessionStatus};
use proctor_config::ProctorPolicy;
use proctor_store::{AuditEvent, AuditEventType, Store, TerminationSink};
use proctor_util::{ProctorError, Result, SessionId};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{CoreEvent, EuclideanMatcher, FaceMatcher, ProctorSession};

/// Result of submitting a frame
#[derive(Debug, Clone)]
pub struct FrameOutcome {
    pub result: FrameResult,
    pub events: Vec<CoreEvent>,
}

/// Owns every live session. Sessions share nothing but the policy and the
/// audit/termination sinks.
pub struct ProctorEngine {
    policy: ProctorPolicy,
    store: Arc<dyn Store>,
    sink: Arc<dyn TerminationSink>,
    matcher: Arc<dyn FaceMatcher>,
    sessions: BTreeMap<SessionId, ProctorSession>,
}

impl ProctorEngine {
    /// Create a new engine. Fails if the policy carries degenerate thresholds.
    pub fn new(
        policy: ProctorPolicy,
        store: Arc<dyn Store>,
        sink: Arc<dyn TerminationSink>,
    ) -> Result<Self> {
        policy.validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            ProctorError::config(messages.join("; "))
        })?;

        info!(
            stable_frames = policy.enrollment.stable_frames,
            identity_limit = policy.identity.max_violations,
            gaze_dwell_secs = policy.gaze.dwell_seconds,
            iris_dwell_secs = policy.iris.dwell_seconds,
            "Proctor engine initialized"
        );

        Ok(Self {
            policy,
            store,
            sink,
            matcher: Arc::new(EuclideanMatcher),
            sessions: BTreeMap::new(),
        })
    }

    /// Replace the face matcher used by sessions started from now on
    pub fn with_matcher(mut self, matcher: Arc<dyn FaceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn policy(&self) -> &ProctorPolicy {
        &self.policy
    }

    /// Start a session in enrollment. An existing session with the same id is
    /// discarded and replaced.
    pub fn start_session(&mut self, session_id: SessionId, now: DateTime<Local>) -> Result<CoreEvent> {
        let session = ProctorSession::new(
            session_id.clone(),
            &self.policy,
            self.matcher.clone(),
            now,
        )?;

        let replaced = self.sessions.insert(session_id.clone(), session).is_some();
        if replaced {
            warn!(session_id = %session_id, "Replacing existing session");
        } else {
            info!(session_id = %session_id, "Session started");
        }

        self.audit(AuditEventType::SessionStarted {
            session_id: session_id.clone(),
            replaced,
        });

        Ok(CoreEvent::SessionStarted {
            session_id,
            replaced,
        })
    }

    /// Feed one frame to a session
    pub fn submit_frame(&mut self, session_id: &SessionId, frame: &FrameSample) -> Result<FrameOutcome> {
        let session = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ProctorError::SessionNotFound(session_id.clone()))?;

        let outcome = session.tick(frame)?;
        let status = session.status();

        let mut events = Vec::new();
        let mut audits = Vec::new();

        if outcome.enrollment_locked {
            audits.push(AuditEventType::EnrollmentLocked {
                session_id: session_id.clone(),
                frames: status.enrollment_streak,
            });
            events.push(CoreEvent::EnrollmentLocked {
                session_id: session_id.clone(),
            });
        }

        for (kind, count) in &outcome.counted {
            audits.push(AuditEventType::ViolationCounted {
                session_id: session_id.clone(),
                kind: *kind,
                count: *count,
            });
            events.push(CoreEvent::ViolationCounted {
                session_id: session_id.clone(),
                kind: *kind,
                count: *count,
            });
        }

        if let Decision::Terminate(event) = &outcome.decision {
            if let Err(e) = self.sink.record(session_id, event) {
                warn!(session_id = %session_id, error = %e, "Failed to write termination record");
            }
            audits.push(AuditEventType::SessionTerminated {
                session_id: session_id.clone(),
                reason: event.reason,
            });
            events.push(CoreEvent::SessionTerminated {
                session_id: session_id.clone(),
                event: event.clone(),
            });
        }

        for audit in audits {
            self.audit(audit);
        }

        Ok(FrameOutcome {
            result: FrameResult {
                decision: outcome.decision,
                status,
            },
            events,
        })
    }

    pub fn status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        self.sessions
            .get(session_id)
            .map(ProctorSession::status)
            .ok_or_else(|| ProctorError::SessionNotFound(session_id.clone()))
    }

    /// Discard a session. Unknown ids are not an error; returns `None` for them.
    pub fn stop_session(&mut self, session_id: &SessionId) -> Option<CoreEvent> {
        let session = self.sessions.remove(session_id)?;
        let frames_processed = session.status().frames_processed;

        self.audit(AuditEventType::SessionStopped {
            session_id: session_id.clone(),
            frames_processed,
        });

        info!(
            session_id = %session_id,
            phase = ?session.phase(),
            frames_processed,
            "Session stopped"
        );

        Some(CoreEvent::SessionStopped {
            session_id: session_id.clone(),
        })
    }

    pub fn list_sessions(&self) -> Vec<SessionStatus> {
        self.sessions.values().map(ProctorSession::status).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn store_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.store.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}
