//! Job parameters and per-account outcomes

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors rejected synchronously at job start
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no eligible accounts")]
    NoEligibleAccounts,
}

/// Identifier for one dispatch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for the group-broadcast variant
///
/// Every eligible account sends the message to every target in its own
/// list, once per round.
#[derive(Debug, Clone)]
pub struct JobParams {
    pub message: String,

    /// Full passes over each account's target list
    pub rounds: u32,

    /// Pause between rounds
    pub round_delay_secs: u64,

    /// Start offset between account tasks: account i waits i * this
    pub account_stagger_secs: u64,
}

impl JobParams {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.rounds == 0 {
            return Err(EngineError::InvalidParameter("rounds must be at least 1".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(EngineError::InvalidParameter("message must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Parameters for the per-user direct variant
///
/// Targets are assigned round-robin across accounts so each user receives
/// the message exactly once per round, job-wide.
#[derive(Debug, Clone)]
pub struct DirectParams {
    pub message: String,
    pub rounds: u32,
    pub round_delay_secs: u64,

    /// Global stagger: the target at position u starts at u * this
    pub target_stagger_secs: u64,
}

impl DirectParams {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.rounds == 0 {
            return Err(EngineError::InvalidParameter("rounds must be at least 1".to_string()));
        }
        if self.message.trim().is_empty() {
            return Err(EngineError::InvalidParameter("message must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Per-account task state
///
/// `Failed` means the task finished but carried at least one unrecovered
/// per-target error (or an account-level abort); it is not a thrown
/// exception reaching the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Pending,
    /// Sleeping out the stagger offset
    Waiting,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Waiting => write!(f, "waiting"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregated outcome of one account's task
#[derive(Debug, Clone)]
pub struct AccountResult {
    pub session: String,
    pub ordinal: u32,
    pub state: TaskState,

    /// Successful deliveries
    pub sent: u32,

    /// Soft skips: broadcast-only targets, idempotent outcomes,
    /// unrecognized errors
    pub skipped: u32,

    /// Unrecovered per-target errors
    pub failed: u32,

    /// Account-level penalty that aborted the remaining work, if any
    pub aborted: Option<String>,

    /// Internal error caught at the task boundary, if any
    pub error: Option<String>,
}

impl AccountResult {
    pub fn new(session: impl Into<String>, ordinal: u32) -> Self {
        Self {
            session: session.into(),
            ordinal,
            state: TaskState::Pending,
            sent: 0,
            skipped: 0,
            failed: 0,
            aborted: None,
            error: None,
        }
    }
}
