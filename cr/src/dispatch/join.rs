//! Join workflow - walk every account into a set of chats
//!
//! Runs sequentially (link by link, account by account) with anti-burst
//! gaps: joining is far more abuse-sensitive than sending, so there is no
//! concurrency here. Flood waits are honored through the cancel token; an
//! account whose join capability is frozen is dropped for the remainder of
//! the run.

use std::collections::HashSet;

use tracing::{info, warn};
use wireline::JoinLink;

use crate::cancel::CancelToken;
use crate::classify::Verdict;
use crate::registry::Account;

use super::engine::DispatchEngine;

/// Tallies from one join run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSummary {
    /// Successful joins
    pub joined: u32,

    /// Requests already pending approval (soft successes)
    pub pending: u32,

    /// Failed join attempts
    pub failed: u32,

    /// Accounts dropped because the capability is revoked for them
    pub frozen_accounts: Vec<String>,

    /// True when the run was cut short by cancellation
    pub cancelled: bool,
}

impl DispatchEngine {
    /// Join every account into every linked chat
    pub async fn run_join(
        &self,
        links: &[JoinLink],
        accounts: &[Account],
        cancel: &CancelToken,
    ) -> JoinSummary {
        let mut summary = JoinSummary::default();
        let mut frozen: HashSet<String> = HashSet::new();

        'links: for link in links {
            info!(link = %link, "processing join link");

            for account in accounts {
                if cancel.is_cancelled() {
                    summary.cancelled = true;
                    break 'links;
                }
                if frozen.contains(&account.session) {
                    continue;
                }
                if !account.is_connected() {
                    warn!(session = %account.session, "skipping disconnected account");
                    continue;
                }

                let emitter = self.bus.emitter_for(&account.session);

                match account.outbox.join(link).await {
                    Ok(()) => {
                        summary.joined += 1;
                        info!(session = %account.session, link = %link, "joined");
                        // Mimic organic pacing after a successful join
                        if !cancel.sleep(self.delays.success_jitter.sample()).await {
                            summary.cancelled = true;
                            break 'links;
                        }
                    }
                    Err(err) => match self.classifier.classify(&err) {
                        Verdict::WaitAndRetry { wait } => {
                            emitter.rate_limited(wait.as_secs());
                            info!(
                                session = %account.session,
                                wait_secs = wait.as_secs(),
                                "join rate limited, waiting"
                            );
                            if !cancel.sleep(wait).await {
                                summary.cancelled = true;
                                break 'links;
                            }
                            // Move on to the next account; the link comes
                            // around again on a later run
                            continue;
                        }
                        Verdict::AbortAccount { reason } => {
                            warn!(session = %account.session, reason = %reason, "join capability lost, dropping account");
                            emitter.aborted(&reason);
                            frozen.insert(account.session.clone());
                            summary.frozen_accounts.push(account.session.clone());
                            continue;
                        }
                        Verdict::SkipTarget { reason, soft: true } => {
                            summary.pending += 1;
                            info!(session = %account.session, reason = %reason, "join already requested");
                            emitter.skipped(&reason, true);
                            continue;
                        }
                        Verdict::SkipTarget { reason, soft: false } => {
                            summary.failed += 1;
                            warn!(session = %account.session, reason = %reason, "join failed");
                            emitter.failed(&reason);
                            continue;
                        }
                        Verdict::LogAndContinue { detail } => {
                            summary.failed += 1;
                            warn!(session = %account.session, detail = %detail, "join failed");
                            emitter.failed(&detail);
                            continue;
                        }
                    },
                }

                // Gap between accounts to stay under abuse heuristics
                if !cancel.sleep(self.delays.join_gap.sample()).await {
                    summary.cancelled = true;
                    break 'links;
                }
            }
        }

        info!(
            joined = summary.joined,
            pending = summary.pending,
            failed = summary.failed,
            frozen = summary.frozen_accounts.len(),
            "join run finished"
        );
        summary
    }
}
