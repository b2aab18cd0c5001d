//! Store trait definitions

use proctor_api::TerminationEvent;
use proctor_util::SessionId;

use crate::{AuditEvent, StoreResult};

/// Audit store
pub trait Store: Send + Sync {
    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// Destination for termination records
pub trait TerminationSink: Send + Sync {
    /// Append one termination record. Existing records are never rewritten.
    fn record(&self, session_id: &SessionId, event: &TerminationEvent) -> StoreResult<()>;
}
