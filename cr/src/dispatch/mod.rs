//! Dispatch engine
//!
//! Turns a (message, targets, rounds, delays) job into one concurrent task
//! per eligible account:
//!
//! - [`engine`] - job validation, eligibility filtering, task spawning,
//!   stop/await control
//! - [`task`] - the per-account state machine running the rounds × targets
//!   loop
//! - [`assignment`] - round-robin target partitioning for the per-user
//!   variant
//! - [`join`] - the sequential join-chats workflow

pub mod assignment;
pub mod engine;
pub mod join;
pub mod task;

pub use engine::{DispatchEngine, JobHandle};
pub use join::JoinSummary;
pub use task::SendPlan;
