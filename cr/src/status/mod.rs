//! Status reporting
//!
//! Tasks emit [`StatusEvent`]s to a fire-and-forget [`StatusBus`]; consumers
//! (the CLI printer, the [`StatusTable`]) subscribe. Emitting never blocks a
//! sending task.

mod bus;
mod table;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, StatusBus, StatusEmitter};
pub use table::{AccountRow, StatusTable};

/// A progress event for one account
///
/// Every variant carries the session name it concerns.
#[derive(Debug, Clone)]
pub enum StatusEvent {
    /// Session file discovered
    Scanned { session: String },
    /// Connection attempt started
    Connecting { session: String },
    /// Connected and authorized
    Connected { session: String, phone: String },
    /// Connection or authorization failed
    ConnectFailed { session: String, reason: String },
    /// About to send to target `index` of `total` in round `round`
    Sending {
        session: String,
        round: u32,
        index: usize,
        total: usize,
    },
    /// Delivery succeeded
    Sent {
        session: String,
        round: u32,
        index: usize,
        total: usize,
    },
    /// Target skipped; `soft` marks idempotent/benign outcomes
    Skipped {
        session: String,
        reason: String,
        soft: bool,
    },
    /// Server-mandated cooldown in progress
    RateLimited { session: String, wait_secs: u64 },
    /// Unrecovered per-target failure
    Failed { session: String, reason: String },
    /// Account-level penalty aborted the account's remaining work
    Aborted { session: String, reason: String },
    /// All rounds and targets exhausted
    Completed { session: String },
    /// Cancellation observed
    Cancelled { session: String },
}

impl StatusEvent {
    /// The session this event concerns
    pub fn session(&self) -> &str {
        match self {
            Self::Scanned { session }
            | Self::Connecting { session }
            | Self::Connected { session, .. }
            | Self::ConnectFailed { session, .. }
            | Self::Sending { session, .. }
            | Self::Sent { session, .. }
            | Self::Skipped { session, .. }
            | Self::RateLimited { session, .. }
            | Self::Failed { session, .. }
            | Self::Aborted { session, .. }
            | Self::Completed { session }
            | Self::Cancelled { session } => session,
        }
    }

    /// Short kind name for logs and tests
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Scanned { .. } => "Scanned",
            Self::Connecting { .. } => "Connecting",
            Self::Connected { .. } => "Connected",
            Self::ConnectFailed { .. } => "ConnectFailed",
            Self::Sending { .. } => "Sending",
            Self::Sent { .. } => "Sent",
            Self::Skipped { .. } => "Skipped",
            Self::RateLimited { .. } => "RateLimited",
            Self::Failed { .. } => "Failed",
            Self::Aborted { .. } => "Aborted",
            Self::Completed { .. } => "Completed",
            Self::Cancelled { .. } => "Cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_accessors() {
        let event = StatusEvent::RateLimited {
            session: "acct1".to_string(),
            wait_secs: 30,
        };
        assert_eq!(event.session(), "acct1");
        assert_eq!(event.kind(), "RateLimited");
    }
}
