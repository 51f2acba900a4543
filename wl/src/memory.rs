//! In-memory transport
//!
//! `MemoryOutbox` implements [`Outbox`] entirely in process: successful
//! sends land in a ledger in arrival order, and failures can be scripted
//! per target and attempt so tests can rehearse every error category at a
//! chosen point in a job. The binary's dry-run mode uses the same
//! transport, so a full job can be exercised without touching a real
//! service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{AuthError, SendError};
use crate::link::JoinLink;
use crate::outbox::{Ack, Connection, Connector, Outbox};
use crate::target::{Peer, Target};

/// One delivered message in the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub target_key: String,
    pub message: String,
    /// Global arrival order across all sends through this outbox
    pub seq: u64,
}

/// Scripted failures for one operation: per-key attempt counters plus a
/// (key, attempt) → error table. Attempts are 1-based and count every call,
/// including ones that returned a scripted failure.
#[derive(Default)]
struct FailureScript {
    attempts: HashMap<String, u32>,
    scripted: HashMap<(String, u32), SendError>,
}

impl FailureScript {
    fn schedule(&mut self, key: &str, attempt: u32, err: SendError) {
        self.scripted.insert((key.to_string(), attempt), err);
    }

    /// Record one attempt against `key` and return its scripted error, if any
    fn next(&mut self, key: &str) -> Option<SendError> {
        let attempt = self.attempts.entry(key.to_string()).or_insert(0);
        *attempt += 1;
        self.scripted.remove(&(key.to_string(), *attempt))
    }
}

#[derive(Default)]
struct MemoryState {
    send_script: FailureScript,
    resolve_script: FailureScript,
    join_script: FailureScript,
    sent: Vec<SentMessage>,
    joined: Vec<JoinLink>,
}

/// Scriptable in-memory [`Outbox`]
pub struct MemoryOutbox {
    state: Mutex<MemoryState>,
    connected: AtomicBool,
    seq: Arc<AtomicU64>,
}

impl MemoryOutbox {
    pub fn new() -> Self {
        Self::with_sequence(Arc::new(AtomicU64::new(0)))
    }

    /// Share one sequence counter across several outboxes so a multi-account
    /// test can assert on global send order.
    pub fn with_sequence(seq: Arc<AtomicU64>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            connected: AtomicBool::new(true),
            seq,
        }
    }

    /// Fail the first send attempt against `target`
    pub fn fail_next_send(&self, target: &Target, err: SendError) {
        self.fail_send_attempt(target, 1, err);
    }

    /// Fail the `attempt`-th (1-based) send against `target`
    pub fn fail_send_attempt(&self, target: &Target, attempt: u32, err: SendError) {
        let mut state = self.state.lock().unwrap();
        state.send_script.schedule(&target.key(), attempt, err);
    }

    /// Fail the `attempt`-th (1-based) resolve against `target`
    pub fn fail_resolve_attempt(&self, target: &Target, attempt: u32, err: SendError) {
        let mut state = self.state.lock().unwrap();
        state.resolve_script.schedule(&target.key(), attempt, err);
    }

    /// Fail the `attempt`-th (1-based) join against `link`
    pub fn fail_join_attempt(&self, link: &JoinLink, attempt: u32, err: SendError) {
        let mut state = self.state.lock().unwrap();
        state.join_script.schedule(&link.to_string(), attempt, err);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Snapshot of everything delivered through this outbox, in order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Target keys of delivered messages, in order
    pub fn sent_keys(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|s| s.target_key.clone())
            .collect()
    }

    /// Links successfully joined through this outbox
    pub fn joined(&self) -> Vec<JoinLink> {
        self.state.lock().unwrap().joined.clone()
    }
}

impl Default for MemoryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Outbox for MemoryOutbox {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn resolve(&self, target: &Target) -> Result<Peer, SendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.resolve_script.next(&target.key()) {
            return Err(err);
        }
        Ok(match target {
            Target::Group(g) if g.broadcast_only => Peer::broadcast(&g.title),
            Target::Group(g) => Peer::new(&g.title),
            Target::User(u) => Peer::new(&u.handle),
        })
    }

    async fn send(&self, target: &Target, message: &str) -> Result<Ack, SendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.send_script.next(&target.key()) {
            return Err(err);
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(key = %target.key(), seq, "memory outbox delivered");
        state.sent.push(SentMessage {
            target_key: target.key(),
            message: message.to_string(),
            seq,
        });
        Ok(Ack {
            message_id: Some(seq as i64),
        })
    }

    async fn join(&self, link: &JoinLink) -> Result<(), SendError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.join_script.next(&link.to_string()) {
            return Err(err);
        }
        state.joined.push(link.clone());
        Ok(())
    }
}

/// Connector that hands out `MemoryOutbox`-backed connections
///
/// Sessions listed as unauthorized fail with [`AuthError::NotAuthorized`];
/// everything else connects and shares one global send sequence.
pub struct MemoryConnector {
    seq: Arc<AtomicU64>,
    unauthorized: Vec<String>,
    handles: Mutex<HashMap<String, Arc<MemoryOutbox>>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self {
            seq: Arc::new(AtomicU64::new(0)),
            unauthorized: Vec::new(),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Mark a session so `connect` rejects it
    pub fn deny(mut self, session: impl Into<String>) -> Self {
        self.unauthorized.push(session.into());
        self
    }

    /// The outbox previously handed out for a session, if any
    pub fn outbox(&self, session: &str) -> Option<Arc<MemoryOutbox>> {
        self.handles.lock().unwrap().get(session).cloned()
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, session: &str) -> Result<Connection, AuthError> {
        if self.unauthorized.iter().any(|s| s == session) {
            return Err(AuthError::NotAuthorized);
        }
        let outbox = Arc::new(MemoryOutbox::with_sequence(self.seq.clone()));
        self.handles
            .lock()
            .unwrap()
            .insert(session.to_string(), outbox.clone());
        Ok(Connection {
            outbox,
            phone: format!("+1555{:07}", session.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_records_in_order() {
        let outbox = MemoryOutbox::new();
        let g1 = Target::group(1, "one");
        let g2 = Target::group(2, "two");

        outbox.send(&g1, "hi").await.unwrap();
        outbox.send(&g2, "hi").await.unwrap();
        outbox.send(&g1, "hi").await.unwrap();

        assert_eq!(outbox.sent_keys(), vec!["group:1", "group:2", "group:1"]);
        let sent = outbox.sent();
        assert!(sent.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_scripted_failure_hits_chosen_attempt() {
        let outbox = MemoryOutbox::new();
        let target = Target::group(5, "five");
        outbox.fail_send_attempt(&target, 2, SendError::PeerFlood);

        outbox.send(&target, "hi").await.unwrap();
        let err = outbox.send(&target, "hi").await.unwrap_err();
        assert_eq!(err, SendError::PeerFlood);
        outbox.send(&target, "hi").await.unwrap();

        assert_eq!(outbox.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_fail_next_send_is_attempt_one() {
        let outbox = MemoryOutbox::new();
        let target = Target::group(5, "five");
        outbox.fail_next_send(&target, SendError::FloodWait { seconds: 3 });

        let err = outbox.send(&target, "hi").await.unwrap_err();
        assert_eq!(err, SendError::FloodWait { seconds: 3 });

        // Next attempt succeeds
        outbox.send(&target, "hi").await.unwrap();
        assert_eq!(outbox.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_reports_broadcast_flag() {
        let outbox = MemoryOutbox::new();
        let g = crate::target::GroupTarget {
            id: 10,
            title: "news".to_string(),
            username: None,
            broadcast_only: true,
        };
        let peer = outbox.resolve(&Target::Group(g)).await.unwrap();
        assert!(peer.broadcast_only);
    }

    #[tokio::test]
    async fn test_connector_denies_unauthorized() {
        let connector = MemoryConnector::new().deny("bad");
        assert!(matches!(
            connector.connect("bad").await,
            Err(AuthError::NotAuthorized)
        ));
        assert!(connector.connect("good").await.is_ok());
        assert!(connector.outbox("good").is_some());
    }
}
