//! Audit event types

use chrono::{DateTime, Local};
use proctor_api::{TerminationReason, ViolationKind};
use proctor_util::SessionId;
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Daemon started
    ServiceStarted,

    /// Daemon stopped
    ServiceStopped,

    /// Session created (or replaced)
    SessionStarted {
        session_id: SessionId,
        replaced: bool,
    },

    /// Reference face captured
    EnrollmentLocked {
        session_id: SessionId,
        frames: u32,
    },

    /// A violation episode was counted
    ViolationCounted {
        session_id: SessionId,
        kind: ViolationKind,
        count: u32,
    },

    /// Session terminated for cause
    SessionTerminated {
        session_id: SessionId,
        reason: TerminationReason,
    },

    /// Session discarded by request
    SessionStopped {
        session_id: SessionId,
        frames_processed: u64,
    },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // set by store
            timestamp: proctor_util::now(),
            event,
        }
    }
}
