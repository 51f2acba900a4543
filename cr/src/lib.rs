//! Courier - multi-account concurrent message dispatch engine
//!
//! Courier fans a fixed message out across many independently authenticated
//! accounts: one concurrent task per account, staggered starts, strict
//! per-account send order, server-mandated rate-limit waits, and a
//! classification policy that decides per failure whether to wait, skip the
//! target, or abandon the account - all under one cooperative cancel token.
//!
//! # Core Concepts
//!
//! - **One task per account**: accounts never share state mid-job; the only
//!   shared resources are the cancel token and the status bus
//! - **Structured failures**: the transport seam ([`wireline`]) speaks error
//!   categories, never raw server strings
//! - **Cooperative cancellation**: every sleep is a checkpoint; in-flight
//!   calls finish, connections survive a stop
//! - **Continue on failure**: one account aborting, failing, or panicking
//!   never touches its siblings
//!
//! # Modules
//!
//! - [`dispatch`] - the engine, per-account tasks, assignment, join workflow
//! - [`classify`] - failure category → verdict policy
//! - [`registry`] - session discovery and connection
//! - [`status`] - progress event bus and account table
//! - [`cancel`] - the cancel token primitive
//! - [`job`] - job parameters and per-account results
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cancel;
pub mod classify;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod job;
pub mod registry;
pub mod status;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use classify::{Classifier, Verdict, VerdictKind};
pub use config::{Config, DelayPolicy, DelayRange, FloodConfig, TransportMode};
pub use dispatch::{DispatchEngine, JobHandle, JoinSummary, SendPlan};
pub use job::{AccountResult, DirectParams, EngineError, JobId, JobParams, TaskState};
pub use registry::{Account, connect_all, scan_sessions};
pub use status::{AccountRow, StatusBus, StatusEmitter, StatusEvent, StatusTable};
