//! Protocol types for proctord IPC
//!
//! This crate defines the stable API between proctord and clients:
//! - Frame samples and per-tick decisions
//! - Commands (requests from clients) and responses
//! - Events (service -> clients)
//! - Versioning

mod commands;
mod events;
mod types;

pub use commands::*;
pub use events::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
