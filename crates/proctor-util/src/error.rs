//! Error types for proctord

use thiserror::Error;

use crate::SessionId;

/// Core error type for proctord operations
#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session already terminated: {0}")]
    SessionTerminated(SessionId),

    #[error("Out-of-order frame for session {session_id}: {message}")]
    OutOfOrderFrame {
        session_id: SessionId,
        message: String,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProctorError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn ipc(msg: impl Into<String>) -> Self {
        Self::IpcError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn out_of_order(session_id: SessionId, msg: impl Into<String>) -> Self {
        Self::OutOfOrderFrame {
            session_id,
            message: msg.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProctorError>;
