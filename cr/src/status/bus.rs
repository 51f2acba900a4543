//! Status bus - pub/sub fan-out for progress events
//!
//! Built on a tokio broadcast channel. Emitting is fire-and-forget: no
//! subscribers means the event is dropped, a full channel drops the oldest
//! events. The bus must never block a sending task.

use tokio::sync::broadcast;
use tracing::debug;

use super::StatusEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Central bus for account progress events
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: StatusEvent) {
        debug!(session = event.session(), kind = event.kind(), "status event");
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    /// Emitter handle bound to one session
    pub fn emitter_for(&self, session: impl Into<String>) -> StatusEmitter {
        StatusEmitter {
            tx: self.tx.clone(),
            session: session.into(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap-to-clone emitter with a pre-set session
#[derive(Clone)]
pub struct StatusEmitter {
    tx: broadcast::Sender<StatusEvent>,
    session: String,
}

impl StatusEmitter {
    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn emit(&self, event: StatusEvent) {
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn scanned(&self) {
        self.emit(StatusEvent::Scanned {
            session: self.session.clone(),
        });
    }

    pub fn connecting(&self) {
        self.emit(StatusEvent::Connecting {
            session: self.session.clone(),
        });
    }

    pub fn connected(&self, phone: &str) {
        self.emit(StatusEvent::Connected {
            session: self.session.clone(),
            phone: phone.to_string(),
        });
    }

    pub fn connect_failed(&self, reason: &str) {
        self.emit(StatusEvent::ConnectFailed {
            session: self.session.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn sending(&self, round: u32, index: usize, total: usize) {
        self.emit(StatusEvent::Sending {
            session: self.session.clone(),
            round,
            index,
            total,
        });
    }

    pub fn sent(&self, round: u32, index: usize, total: usize) {
        self.emit(StatusEvent::Sent {
            session: self.session.clone(),
            round,
            index,
            total,
        });
    }

    pub fn skipped(&self, reason: &str, soft: bool) {
        self.emit(StatusEvent::Skipped {
            session: self.session.clone(),
            reason: reason.to_string(),
            soft,
        });
    }

    pub fn rate_limited(&self, wait_secs: u64) {
        self.emit(StatusEvent::RateLimited {
            session: self.session.clone(),
            wait_secs,
        });
    }

    pub fn failed(&self, reason: &str) {
        self.emit(StatusEvent::Failed {
            session: self.session.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn aborted(&self, reason: &str) {
        self.emit(StatusEvent::Aborted {
            session: self.session.clone(),
            reason: reason.to_string(),
        });
    }

    pub fn completed(&self) {
        self.emit(StatusEvent::Completed {
            session: self.session.clone(),
        });
    }

    pub fn cancelled(&self) {
        self.emit(StatusEvent::Cancelled {
            session: self.session.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_creation() {
        let bus = StatusBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_emit_receive() {
        let bus = StatusBus::with_default_capacity();
        let mut rx = bus.subscribe();

        bus.emit(StatusEvent::Completed {
            session: "acct1".to_string(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session(), "acct1");
        assert_eq!(event.kind(), "Completed");
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_does_not_panic() {
        let bus = StatusBus::with_default_capacity();
        bus.emit(StatusEvent::Scanned {
            session: "acct1".to_string(),
        });
    }

    #[tokio::test]
    async fn test_emitter_binds_session() {
        let bus = StatusBus::with_default_capacity();
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("acct2");

        emitter.sending(1, 1, 4);
        emitter.sent(1, 1, 4);
        emitter.rate_limited(30);

        for _ in 0..3 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.session(), "acct2");
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = StatusBus::with_default_capacity();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.emitter_for("acct3").completed();

        assert_eq!(rx1.recv().await.unwrap().kind(), "Completed");
        assert_eq!(rx2.recv().await.unwrap().kind(), "Completed");
    }
}
