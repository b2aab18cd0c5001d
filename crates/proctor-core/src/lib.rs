//! Violation detection and session termination for proctord
//!
//! This crate is the heart of proctord, containing:
//! - Enrollment of a single stable reference face
//! - Identity, object, head-pose and iris monitors with dwell and hysteresis
//! - The violation ledger that decides when a session ends for cause
//! - The session state machine (Enrolling -> Monitoring -> Terminated)
//! - A registry of independent sessions with audit and termination logging

mod engine;
mod enrollment;
mod events;
mod gaze;
mod identity;
mod iris;
mod ledger;
mod objects;
mod session;

pub use engine::*;
pub use enrollment::*;
pub use events::*;
pub use gaze::*;
pub use identity::*;
pub use iris::*;
pub use ledger::*;
pub use objects::*;
pub use session::*;
