//! Per-account send task
//!
//! The unit of concurrent execution. Owns one account handle for the
//! duration of the job and runs the rounds × targets double loop:
//!
//! `Pending → Waiting(stagger) → Running → {Completed, Cancelled, Failed}`
//!
//! Every suspension point checks the cancel token; every failure goes
//! through the classifier. Targets within a round are processed strictly in
//! list order and rounds strictly in increasing order - which target is
//! first after a resume from a wait is part of the contract.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};
use wireline::{SendError, Target};

use crate::cancel::CancelToken;
use crate::classify::{Classifier, Verdict};
use crate::config::{DelayPolicy, FloodConfig};
use crate::job::{AccountResult, TaskState};
use crate::registry::Account;
use crate::status::StatusEmitter;

/// What a task sends, and how its sends are paced
#[derive(Debug, Clone)]
pub enum SendPlan {
    /// Group variant: the account's own target list, paced by the
    /// jitter/gap delays
    OwnList(Vec<Target>),

    /// Direct variant: centrally assigned `(global position, target)`
    /// slots, paced by `position * stagger` offsets from round start
    Assigned {
        slots: Vec<(u64, Target)>,
        stagger_secs: u64,
    },
}

impl SendPlan {
    fn is_empty(&self) -> bool {
        match self {
            Self::OwnList(targets) => targets.is_empty(),
            Self::Assigned { slots, .. } => slots.is_empty(),
        }
    }
}

/// One send slot in a round
struct Slot {
    /// 1-based position within this account's list, for progress events
    index: usize,
    total: usize,
    target: Target,
    /// Offset from round start (direct variant only)
    offset: Option<Duration>,
}

/// The per-account task
pub(crate) struct AccountTask {
    pub account: Account,
    pub plan: SendPlan,
    pub message: String,
    pub rounds: u32,
    pub round_delay: Duration,
    /// Start offset assigned by the engine
    pub stagger: Duration,
    pub cancel: CancelToken,
    pub emitter: StatusEmitter,
    pub classifier: Classifier,
    pub delays: DelayPolicy,
    pub flood: FloodConfig,
}

enum Attempt {
    Delivered,
    BroadcastOnly(String),
}

enum SlotOutcome {
    Done,
    AbortAccount(String),
    Cancelled,
}

impl AccountTask {
    /// Run the task to a terminal state
    ///
    /// Never panics outward: anything unexpected is caught here and folded
    /// into a `Failed` result so one account can never take the job down.
    pub async fn run(self) -> AccountResult {
        let session = self.account.session.clone();
        let ordinal = self.account.ordinal;

        match self.run_inner().await {
            Ok(result) => result,
            Err(e) => {
                warn!(session = %session, error = %e, "account task failed unexpectedly");
                let mut result = AccountResult::new(session, ordinal);
                result.state = TaskState::Failed;
                result.error = Some(e.to_string());
                result
            }
        }
    }

    async fn run_inner(self) -> eyre::Result<AccountResult> {
        let mut result = AccountResult::new(&self.account.session, self.account.ordinal);
        result.state = TaskState::Waiting;

        // Stagger offset, interruptible
        if !self.cancel.sleep(self.stagger).await {
            self.emitter.cancelled();
            result.state = TaskState::Cancelled;
            return Ok(result);
        }

        if !self.account.is_connected() || self.plan.is_empty() {
            // Eligibility is checked at start; a connection can still drop
            // during the stagger wait.
            warn!(session = %self.account.session, "account not ready, nothing to send");
            self.emitter.failed("connection lost before sending");
            result.state = TaskState::Failed;
            result.error = Some("connection lost before sending".to_string());
            return Ok(result);
        }

        result.state = TaskState::Running;
        info!(
            session = %self.account.session,
            rounds = self.rounds,
            "account task running"
        );

        let slots = self.build_slots();

        'rounds: for round in 1..=self.rounds {
            let round_start = Instant::now();

            for slot in &slots {
                if self.cancel.is_cancelled() {
                    break 'rounds;
                }

                // Direct variant: hold this send to its global offset
                if let Some(offset) = slot.offset {
                    let remaining = offset.saturating_sub(round_start.elapsed());
                    if !self.cancel.sleep(remaining).await {
                        break 'rounds;
                    }
                }

                match self.run_slot(round, slot, &mut result).await {
                    SlotOutcome::Done => {}
                    SlotOutcome::AbortAccount(reason) => {
                        self.emitter.aborted(&reason);
                        result.aborted = Some(reason);
                        result.state = TaskState::Failed;
                        return Ok(result);
                    }
                    SlotOutcome::Cancelled => break 'rounds,
                }
            }

            // Rest between rounds
            if round < self.rounds && !self.cancel.is_cancelled() {
                info!(
                    session = %self.account.session,
                    round,
                    delay_secs = self.round_delay.as_secs(),
                    "round finished, resting"
                );
                if !self.cancel.sleep(self.round_delay).await {
                    break 'rounds;
                }
            }
        }

        if self.cancel.is_cancelled() {
            self.emitter.cancelled();
            result.state = TaskState::Cancelled;
            return Ok(result);
        }

        self.emitter.completed();
        result.state = if result.failed > 0 {
            TaskState::Failed
        } else {
            TaskState::Completed
        };
        info!(
            session = %self.account.session,
            sent = result.sent,
            skipped = result.skipped,
            failed = result.failed,
            "account task finished"
        );
        Ok(result)
    }

    fn build_slots(&self) -> Vec<Slot> {
        match &self.plan {
            SendPlan::OwnList(targets) => {
                let total = targets.len();
                targets
                    .iter()
                    .enumerate()
                    .map(|(i, target)| Slot {
                        index: i + 1,
                        total,
                        target: target.clone(),
                        offset: None,
                    })
                    .collect()
            }
            SendPlan::Assigned { slots, stagger_secs } => {
                let total = slots.len();
                slots
                    .iter()
                    .enumerate()
                    .map(|(i, (u, target))| Slot {
                        index: i + 1,
                        total,
                        target: target.clone(),
                        offset: Some(Duration::from_secs(u * stagger_secs)),
                    })
                    .collect()
            }
        }
    }

    /// Send to one target, honoring the classifier's verdict
    async fn run_slot(&self, round: u32, slot: &Slot, result: &mut AccountResult) -> SlotOutcome {
        let mut flood_retries = 0;

        loop {
            if self.cancel.is_cancelled() {
                return SlotOutcome::Cancelled;
            }

            self.emitter.sending(round, slot.index, slot.total);

            let err = match self.attempt(&slot.target).await {
                Ok(Attempt::Delivered) => {
                    result.sent += 1;
                    self.emitter.sent(round, slot.index, slot.total);
                    debug!(
                        session = %self.account.session,
                        peer = %slot.target,
                        round,
                        "delivered"
                    );
                    self.pace(slot).await;
                    return SlotOutcome::Done;
                }
                Ok(Attempt::BroadcastOnly(title)) => {
                    // Read-only channel: not a failure, just move on
                    result.skipped += 1;
                    info!(session = %self.account.session, title = %title, "skipping broadcast-only channel");
                    self.emitter.skipped("broadcast-only channel", true);
                    return SlotOutcome::Done;
                }
                Err(err) => err,
            };

            match self.classifier.classify(&err) {
                Verdict::WaitAndRetry { wait } => {
                    self.emitter.rate_limited(wait.as_secs());
                    info!(
                        session = %self.account.session,
                        peer = %slot.target,
                        wait_secs = wait.as_secs(),
                        "rate limited, waiting"
                    );
                    if !self.cancel.sleep(wait).await {
                        return SlotOutcome::Cancelled;
                    }
                    if flood_retries < self.flood.max_retries {
                        flood_retries += 1;
                        continue;
                    }
                    // Repeated cooldowns on the same target: give up on it
                    result.failed += 1;
                    self.emitter.failed("rate limited repeatedly");
                    return SlotOutcome::Done;
                }
                Verdict::SkipTarget { reason, soft } => {
                    if soft {
                        result.skipped += 1;
                        self.emitter.skipped(&reason, true);
                    } else {
                        result.failed += 1;
                        self.emitter.failed(&reason);
                    }
                    debug!(
                        session = %self.account.session,
                        peer = %slot.target,
                        reason = %reason,
                        soft,
                        "target skipped"
                    );
                    return SlotOutcome::Done;
                }
                Verdict::AbortAccount { reason } => {
                    warn!(session = %self.account.session, reason = %reason, "aborting account");
                    return SlotOutcome::AbortAccount(reason);
                }
                Verdict::LogAndContinue { detail } => {
                    warn!(
                        session = %self.account.session,
                        peer = %slot.target,
                        detail = %detail,
                        "unrecognized send failure"
                    );
                    result.skipped += 1;
                    self.emitter.skipped(&detail, true);
                    return SlotOutcome::Done;
                }
            }
        }
    }

    async fn attempt(&self, target: &Target) -> Result<Attempt, SendError> {
        let peer = self.account.outbox.resolve(target).await?;
        if peer.broadcast_only {
            return Ok(Attempt::BroadcastOnly(peer.title));
        }
        self.account.outbox.send(target, &self.message).await?;
        Ok(Attempt::Delivered)
    }

    /// Anti-burst pacing after a successful send (group variant only; the
    /// direct variant is paced by its global offsets)
    async fn pace(&self, slot: &Slot) {
        if slot.offset.is_some() {
            return;
        }
        self.cancel.sleep(self.delays.success_jitter.sample()).await;
        if slot.index < slot.total {
            self.cancel.sleep(self.delays.target_gap.sample()).await;
        }
    }
}
