//! Core events emitted by the engine

use proctor_api::{TerminationEvent, ViolationKind};
use proctor_util::SessionId;

/// Events emitted by the core engine
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// Session created; `replaced` is set when an existing session with the same id was discarded
    SessionStarted {
        session_id: SessionId,
        replaced: bool,
    },

    /// Reference face captured, monitoring begins
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

    /// Session discarded by request
    SessionStopped { session_id: SessionId },
}
