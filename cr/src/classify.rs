//! Failure classification
//!
//! Turns a structured transport error into a verdict the sending task acts
//! on. The default policy:
//!
//! | category                                   | verdict            |
//! |--------------------------------------------|--------------------|
//! | flood wait with advertised duration        | wait (+margin), retry target |
//! | account-level penalty / revoked capability | abort the account  |
//! | target-scoped privilege error              | skip target (hard) |
//! | action already effectively performed       | skip target (soft) |
//! | anything unrecognized                      | log and continue   |
//!
//! The mapping is a policy, not a contract: deployments can re-map any
//! category through the override table.

use std::collections::HashMap;
use std::time::Duration;

use wireline::{ErrorKind, SendError};

/// How the sending task should react to a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Honor the server cooldown, then retry the same target
    WaitAndRetry { wait: Duration },

    /// Give up on this target; `soft` marks idempotent/benign outcomes
    /// that must not be counted as failures
    SkipTarget { reason: String, soft: bool },

    /// Abandon all remaining work for this account
    AbortAccount { reason: String },

    /// Unrecognized failure: record it and move on
    LogAndContinue { detail: String },
}

/// Verdict shape without payloads, used by the override table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictKind {
    WaitAndRetry,
    SkipTarget,
    SkipTargetSoft,
    AbortAccount,
    LogAndContinue,
}

/// Category → verdict policy
#[derive(Debug, Clone)]
pub struct Classifier {
    /// Extra seconds added on top of the advertised flood wait
    pub flood_margin_secs: u64,
    overrides: HashMap<ErrorKind, VerdictKind>,
}

impl Classifier {
    pub fn new(flood_margin_secs: u64) -> Self {
        Self {
            flood_margin_secs,
            overrides: HashMap::new(),
        }
    }

    /// Re-map one error category to a different verdict shape
    pub fn with_override(mut self, kind: ErrorKind, verdict: VerdictKind) -> Self {
        self.overrides.insert(kind, verdict);
        self
    }

    /// Classify a failure into a verdict
    pub fn classify(&self, err: &SendError) -> Verdict {
        let kind = self
            .overrides
            .get(&err.kind())
            .copied()
            .unwrap_or_else(|| default_kind(err));

        match kind {
            VerdictKind::WaitAndRetry => {
                let seconds = match err {
                    SendError::FloodWait { seconds } => *seconds,
                    // Overridden category without an advertised duration
                    _ => 0,
                };
                Verdict::WaitAndRetry {
                    wait: Duration::from_secs(seconds + self.flood_margin_secs),
                }
            }
            VerdictKind::SkipTarget => Verdict::SkipTarget {
                reason: err.to_string(),
                soft: false,
            },
            VerdictKind::SkipTargetSoft => Verdict::SkipTarget {
                reason: err.to_string(),
                soft: true,
            },
            VerdictKind::AbortAccount => Verdict::AbortAccount {
                reason: err.to_string(),
            },
            VerdictKind::LogAndContinue => Verdict::LogAndContinue {
                detail: err.to_string(),
            },
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(1)
    }
}

fn default_kind(err: &SendError) -> VerdictKind {
    match err.kind() {
        ErrorKind::FloodWait => VerdictKind::WaitAndRetry,

        // Account-level: every further attempt would fail identically
        ErrorKind::PeerFlood
        | ErrorKind::AccountDeactivated
        | ErrorKind::MethodFrozen
        | ErrorKind::NotAuthorized => VerdictKind::AbortAccount,

        // Target-scoped: other targets may still succeed
        ErrorKind::WriteForbidden
        | ErrorKind::BannedInTarget
        | ErrorKind::AdminRequired
        | ErrorKind::InvalidPeer
        | ErrorKind::MessageTooLong => VerdictKind::SkipTarget,

        // Already effectively performed
        ErrorKind::AlreadyRequested => VerdictKind::SkipTargetSoft,

        ErrorKind::Other => VerdictKind::LogAndContinue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flood_wait_adds_margin() {
        let classifier = Classifier::default();
        let verdict = classifier.classify(&SendError::FloodWait { seconds: 30 });
        assert_eq!(
            verdict,
            Verdict::WaitAndRetry {
                wait: Duration::from_secs(31)
            }
        );
    }

    #[test]
    fn test_account_penalties_abort() {
        let classifier = Classifier::default();
        for err in [
            SendError::PeerFlood,
            SendError::AccountDeactivated,
            SendError::MethodFrozen,
            SendError::NotAuthorized,
        ] {
            assert!(
                matches!(classifier.classify(&err), Verdict::AbortAccount { .. }),
                "{err:?} should abort the account"
            );
        }
    }

    #[test]
    fn test_target_errors_skip_hard() {
        let classifier = Classifier::default();
        for err in [
            SendError::WriteForbidden,
            SendError::BannedInTarget,
            SendError::AdminRequired,
            SendError::InvalidPeer,
            SendError::MessageTooLong,
        ] {
            match classifier.classify(&err) {
                Verdict::SkipTarget { soft, reason } => {
                    assert!(!soft);
                    assert!(!reason.is_empty());
                }
                other => panic!("{err:?} should skip the target, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_already_requested_is_soft() {
        let classifier = Classifier::default();
        assert!(matches!(
            classifier.classify(&SendError::AlreadyRequested),
            Verdict::SkipTarget { soft: true, .. }
        ));
    }

    #[test]
    fn test_unknown_logs_and_continues() {
        let classifier = Classifier::default();
        match classifier.classify(&SendError::Other("server hiccup".to_string())) {
            Verdict::LogAndContinue { detail } => assert!(detail.contains("server hiccup")),
            other => panic!("unknown errors must not escalate, got {other:?}"),
        }
    }

    #[test]
    fn test_override_remaps_category() {
        let classifier =
            Classifier::default().with_override(ErrorKind::InvalidPeer, VerdictKind::AbortAccount);
        assert!(matches!(
            classifier.classify(&SendError::InvalidPeer),
            Verdict::AbortAccount { .. }
        ));
        // Unrelated categories keep their defaults
        assert!(matches!(
            classifier.classify(&SendError::MessageTooLong),
            Verdict::SkipTarget { .. }
        ));
    }
}
