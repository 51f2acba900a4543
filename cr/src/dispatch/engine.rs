//! DispatchEngine - turns job parameters into concurrent account tasks
//!
//! The engine validates parameters synchronously, filters accounts down to
//! the eligible set, spawns one task per account with staggered starts, and
//! hands back a [`JobHandle`] for stop/await control. One task failing (or
//! panicking) never cancels its siblings; the aggregated result carries a
//! row per account.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wireline::Target;

use crate::cancel::CancelToken;
use crate::classify::Classifier;
use crate::config::{Config, DelayPolicy, FloodConfig};
use crate::job::{AccountResult, DirectParams, EngineError, JobId, JobParams, TaskState};
use crate::registry::Account;
use crate::status::StatusBus;

use super::assignment::round_robin;
use super::task::{AccountTask, SendPlan};

/// Orchestrates per-account send tasks
pub struct DispatchEngine {
    pub(super) bus: Arc<StatusBus>,
    pub(super) classifier: Classifier,
    pub(super) delays: DelayPolicy,
    flood: FloodConfig,
    /// Sessions claimed by a running job; keeps one account out of two
    /// concurrent jobs
    busy: Arc<Mutex<HashSet<String>>>,
}

impl DispatchEngine {
    /// Engine with default policy and anti-burst pacing disabled
    ///
    /// Production callers should use [`DispatchEngine::from_config`], which
    /// wires the configured delay ranges in.
    pub fn new(bus: Arc<StatusBus>) -> Self {
        Self {
            bus,
            classifier: Classifier::default(),
            delays: DelayPolicy::none(),
            flood: FloodConfig::default(),
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Build an engine from loaded configuration
    pub fn from_config(config: &Config, bus: Arc<StatusBus>) -> Self {
        Self {
            bus,
            classifier: Classifier::new(config.flood.margin_secs),
            delays: config.delays.clone(),
            flood: config.flood.clone(),
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_delays(mut self, delays: DelayPolicy) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_flood(mut self, flood: FloodConfig) -> Self {
        self.flood = flood;
        self
    }

    /// Start the group-broadcast variant: every eligible account sends the
    /// message to every target in its own list, once per round.
    ///
    /// Account `i` (0-indexed over the eligible set) starts after
    /// `i * account_stagger` so connections ramp up instead of bursting.
    pub fn start_broadcast(&self, params: JobParams, accounts: &[Account]) -> Result<JobHandle, EngineError> {
        params.validate()?;

        let eligible = self.claim(accounts, |account| !account.targets.is_empty());
        if eligible.is_empty() {
            return Err(EngineError::NoEligibleAccounts);
        }

        let job_id = JobId::new();
        let cancel = CancelToken::new();
        info!(%job_id, accounts = eligible.len(), rounds = params.rounds, "starting broadcast job");

        let mut tasks = Vec::with_capacity(eligible.len());
        for (i, account) in eligible.into_iter().enumerate() {
            let plan = SendPlan::OwnList(account.targets.clone());
            let stagger = Duration::from_secs(i as u64 * params.account_stagger_secs);
            tasks.push(self.spawn_task(account, plan, &params.message, params.rounds, params.round_delay_secs, stagger, &cancel));
        }

        Ok(JobHandle {
            id: job_id,
            cancel,
            tasks,
        })
    }

    /// Start the per-user direct variant: targets are partitioned
    /// round-robin across the eligible accounts so each user receives the
    /// message exactly once per round.
    pub fn start_direct(
        &self,
        params: DirectParams,
        accounts: &[Account],
        targets: Vec<Target>,
    ) -> Result<JobHandle, EngineError> {
        params.validate()?;

        // Targets are assigned centrally, so connectivity is the only
        // per-account requirement.
        let eligible = self.claim(accounts, |_| true);
        if eligible.is_empty() {
            return Err(EngineError::NoEligibleAccounts);
        }

        let job_id = JobId::new();
        let cancel = CancelToken::new();
        let assigned = round_robin(&targets, eligible.len());
        info!(
            %job_id,
            accounts = eligible.len(),
            targets = targets.len(),
            rounds = params.rounds,
            "starting direct job"
        );

        let mut tasks = Vec::with_capacity(eligible.len());
        for (account, slots) in eligible.into_iter().zip(assigned) {
            // More accounts than targets: the unassigned tail has no work
            if slots.is_empty() {
                self.busy.lock().unwrap().remove(&account.session);
                continue;
            }
            let plan = SendPlan::Assigned {
                slots,
                stagger_secs: params.target_stagger_secs,
            };
            tasks.push(self.spawn_task(account, plan, &params.message, params.rounds, params.round_delay_secs, Duration::ZERO, &cancel));
        }

        Ok(JobHandle {
            id: job_id,
            cancel,
            tasks,
        })
    }

    /// Filter to connected, unclaimed accounts passing `extra`, claiming
    /// them in the busy set atomically.
    fn claim(&self, accounts: &[Account], extra: impl Fn(&Account) -> bool) -> Vec<Account> {
        let mut busy = self.busy.lock().unwrap();
        let mut eligible = Vec::new();
        for account in accounts {
            if !account.is_connected() {
                warn!(session = %account.session, "account skipped: not connected");
                continue;
            }
            if !extra(account) {
                warn!(session = %account.session, "account skipped: nothing to send");
                continue;
            }
            if !busy.insert(account.session.clone()) {
                warn!(session = %account.session, "account skipped: already in a running job");
                continue;
            }
            eligible.push(account.clone());
        }
        eligible
    }

    fn spawn_task(
        &self,
        account: Account,
        plan: SendPlan,
        message: &str,
        rounds: u32,
        round_delay_secs: u64,
        stagger: Duration,
        cancel: &CancelToken,
    ) -> (String, JoinHandle<AccountResult>) {
        let session = account.session.clone();
        let task = AccountTask {
            emitter: self.bus.emitter_for(session.clone()),
            account,
            plan,
            message: message.to_string(),
            rounds,
            round_delay: Duration::from_secs(round_delay_secs),
            stagger,
            cancel: cancel.clone(),
            classifier: self.classifier.clone(),
            delays: self.delays.clone(),
            flood: self.flood.clone(),
        };

        let busy = self.busy.clone();
        let release_session = session.clone();
        let handle = tokio::spawn(async move {
            let result = task.run().await;
            busy.lock().unwrap().remove(&release_session);
            result
        });

        (session, handle)
    }
}

/// Control surface for one running job
pub struct JobHandle {
    pub id: JobId,
    cancel: CancelToken,
    tasks: Vec<(String, JoinHandle<AccountResult>)>,
}

impl JobHandle {
    /// Request cooperative cancellation of every task
    ///
    /// In-flight remote calls finish; no new calls start after the next
    /// checkpoint. Account connections stay open - they belong to the
    /// registry, not the job. Calling this twice, or after completion, is
    /// a no-op.
    pub fn stop(&self) {
        info!(job_id = %self.id, "stop requested");
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Clone of the job's cancel token, e.g. for a signal handler
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Whether any task is still running
    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|(_, handle)| !handle.is_finished())
    }

    /// Await every task and collect per-account results
    ///
    /// A panicked task surfaces as a `Failed` row; siblings are unaffected.
    pub async fn join(&mut self) -> Vec<AccountResult> {
        let tasks = std::mem::take(&mut self.tasks);
        let (sessions, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();

        let outcomes = join_all(handles).await;

        sessions
            .into_iter()
            .zip(outcomes)
            .enumerate()
            .map(|(i, (session, outcome))| match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!(session = %session, error = %e, "account task panicked");
                    let mut result = AccountResult::new(session, i as u32 + 1);
                    result.state = TaskState::Failed;
                    result.error = Some(format!("task panicked: {}", e));
                    result
                }
            })
            .collect()
    }
}
