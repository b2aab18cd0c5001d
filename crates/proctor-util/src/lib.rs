//! Shared utilities for proctord
//!
//! This crate provides:
//! - ID types (SessionId, ClientId)
//! - Time utilities (frame timestamps, dwell arithmetic, mock time)
//! - Error types
//! - Rate limiting helpers
//! - Default paths for socket, data, log, and config locations

mod error;
mod ids;
mod paths;
mod rate_limit;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use rate_limit::*;
pub use time::*;
