//! Command types for the proctord protocol

use proctor_util::{ClientId, SessionId};
use serde::{Deserialize, Serialize};

use crate::{
    ClientRole, FrameResult, FrameSample, HealthStatus, SessionStatus, API_VERSION,
};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    SessionNotFound,
    SessionTerminated,
    OutOfOrderFrame,
    PermissionDenied,
    RateLimited,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Create (or restart) a session; it begins in enrollment
    StartSession { session_id: SessionId },

    /// Feed one frame of measurements to a session
    SubmitFrame {
        session_id: SessionId,
        frame: FrameSample,
    },

    /// Get the status of one session
    GetStatus { session_id: SessionId },

    /// Discard a session; succeeds even if it does not exist
    StopSession { session_id: SessionId },

    /// Status of every known session
    ListSessions,

    /// Subscribe to events (returns immediately, events stream separately)
    SubscribeEvents,

    /// Unsubscribe from events
    UnsubscribeEvents,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

impl Command {
    /// Whether this command changes session state
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Command::StartSession { .. } | Command::SubmitFrame { .. } | Command::StopSession { .. }
        )
    }
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    SessionStarted(SessionStatus),
    Frame(FrameResult),
    Status(SessionStatus),
    Stopped {
        session_id: SessionId,
        /// False when the session did not exist
        existed: bool,
    },
    Sessions(Vec<SessionStatus>),
    Subscribed {
        client_id: ClientId,
    },
    Unsubscribed,
    Health(HealthStatus),
    Pong,
}

/// Client connection info (set by IPC layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    /// Unix UID if available
    pub uid: Option<u32>,
}

impl ClientInfo {
    pub fn new(role: ClientRole) -> Self {
        Self {
            client_id: ClientId::new(),
            role,
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = Request::new(
            1,
            Command::StopSession {
                session_id: SessionId::new("exam-1"),
            },
        );
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"type\":\"stop_session\""));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, 1);
        assert!(matches!(parsed.command, Command::StopSession { .. }));
    }

    #[test]
    fn submit_frame_parses_from_wire() {
        let line = r#"{"request_id":7,"api_version":1,"command":{"type":"submit_frame","session_id":"exam-1","frame":{"face_count":1,"face_encodings":[[0.1,0.2]],"timestamp":"2025-12-25T14:30:00+00:00"}}}"#;
        let parsed: Request = serde_json::from_str(line).unwrap();
        match parsed.command {
            Command::SubmitFrame { session_id, frame } => {
                assert_eq!(session_id.as_str(), "exam-1");
                assert_eq!(frame.face_encodings.len(), 1);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn error_response_serialization() {
        let resp = Response::error(
            3,
            ErrorInfo::new(ErrorCode::SessionNotFound, "Session not found: exam-9"),
        );
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("session_not_found"));
    }

    #[test]
    fn mutating_commands() {
        assert!(Command::StartSession { session_id: "a".into() }.is_mutating());
        assert!(!Command::GetStatus { session_id: "a".into() }.is_mutating());
        assert!(!Command::Ping.is_mutating());
    }
}
