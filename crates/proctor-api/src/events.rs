//! Event types for proctord -> client streaming

use chrono::{DateTime, Local};
use proctor_util::SessionId;
use serde::{Deserialize, Serialize};

use crate::{TerminationEvent, ViolationKind, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: proctor_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Session created, enrollment pending
    SessionStarted { session_id: SessionId },

    /// Reference face captured; monitoring begins
    EnrollmentLocked { session_id: SessionId },

    /// A violation episode was counted
    ViolationCounted {
        session_id: SessionId,
        kind: ViolationKind,
        count: u32,
    },

    /// Session ended for cause
    SessionTerminated {
        session_id: SessionId,
        event: TerminationEvent,
    },

    /// Session discarded by a stop request
    SessionStopped { session_id: SessionId },

    /// Service is shutting down
    Shutdown,
}
