//! Status table - the account → progress row map
//!
//! A single fold task subscribes to the bus and applies events to the rows,
//! so concurrent account tasks never contend on the map itself; readers take
//! cheap snapshots.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use super::{StatusBus, StatusEvent};

/// One account's progress row
#[derive(Debug, Clone)]
pub struct AccountRow {
    pub ordinal: u32,
    pub session: String,
    pub phone: String,
    /// Target count for the running job
    pub targets: usize,
    /// Round / index of the send in flight, if any
    pub current: Option<(u32, usize)>,
    /// Last observed state description
    pub state: String,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    fn new(ordinal: u32, session: &str) -> Self {
        Self {
            ordinal,
            session: session.to_string(),
            phone: "-".to_string(),
            targets: 0,
            current: None,
            state: "scanned".to_string(),
            updated_at: Utc::now(),
        }
    }
}

/// Concurrency-safe view over all account rows
#[derive(Clone)]
pub struct StatusTable {
    rows: Arc<Mutex<HashMap<String, AccountRow>>>,
}

impl StatusTable {
    /// Spawn the fold task and return the table handle
    pub fn attach(bus: &StatusBus) -> Self {
        let rows: Arc<Mutex<HashMap<String, AccountRow>>> = Arc::new(Mutex::new(HashMap::new()));
        let mut rx = bus.subscribe();
        let fold_rows = rows.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let mut rows = fold_rows.lock().unwrap();
                        let next_ordinal = rows.len() as u32 + 1;
                        let row = rows
                            .entry(event.session().to_string())
                            .or_insert_with(|| AccountRow::new(next_ordinal, event.session()));
                        apply(row, &event);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "status table lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self { rows }
    }

    /// Rows sorted by ordinal
    pub fn snapshot(&self) -> Vec<AccountRow> {
        let mut rows: Vec<AccountRow> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|r| r.ordinal);
        rows
    }

    pub fn row(&self, session: &str) -> Option<AccountRow> {
        self.rows.lock().unwrap().get(session).cloned()
    }
}

fn apply(row: &mut AccountRow, event: &StatusEvent) {
    match event {
        StatusEvent::Scanned { .. } => row.state = "scanned".to_string(),
        StatusEvent::Connecting { .. } => row.state = "connecting".to_string(),
        StatusEvent::Connected { phone, .. } => {
            row.phone = phone.clone();
            row.state = "connected".to_string();
        }
        StatusEvent::ConnectFailed { reason, .. } => {
            row.state = format!("connect failed: {}", reason);
        }
        StatusEvent::Sending { round, index, total, .. } => {
            row.targets = *total;
            row.current = Some((*round, *index));
            row.state = format!("sending {}/{} (round {})", index, total, round);
        }
        StatusEvent::Sent { round, index, total, .. } => {
            row.current = Some((*round, *index));
            row.state = format!("sent {}/{} (round {})", index, total, round);
        }
        StatusEvent::Skipped { reason, .. } => {
            row.state = format!("skipped: {}", reason);
        }
        StatusEvent::RateLimited { wait_secs, .. } => {
            row.state = format!("rate limited: waiting {}s", wait_secs);
        }
        StatusEvent::Failed { reason, .. } => {
            row.state = format!("failed: {}", reason);
        }
        StatusEvent::Aborted { reason, .. } => {
            row.current = None;
            row.state = format!("aborted: {}", reason);
        }
        StatusEvent::Completed { .. } => {
            row.current = None;
            row.state = "completed".to_string();
        }
        StatusEvent::Cancelled { .. } => {
            row.current = None;
            row.state = "cancelled".to_string();
        }
    }
    row.updated_at = Utc::now();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn settle() {
        // Give the fold task a moment to drain the channel
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    #[tokio::test]
    async fn test_table_folds_events_into_rows() {
        let bus = StatusBus::with_default_capacity();
        let table = StatusTable::attach(&bus);

        let emitter = bus.emitter_for("acct1");
        emitter.scanned();
        emitter.connected("+15550001111");
        emitter.sending(1, 2, 5);
        settle().await;

        let row = table.row("acct1").unwrap();
        assert_eq!(row.phone, "+15550001111");
        assert_eq!(row.targets, 5);
        assert_eq!(row.current, Some((1, 2)));
        assert!(row.state.starts_with("sending"));
    }

    #[tokio::test]
    async fn test_snapshot_sorted_by_ordinal() {
        let bus = StatusBus::with_default_capacity();
        let table = StatusTable::attach(&bus);

        bus.emitter_for("acct1").scanned();
        settle().await;
        bus.emitter_for("acct2").scanned();
        settle().await;

        let rows = table.snapshot();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ordinal < rows[1].ordinal);
    }

    #[tokio::test]
    async fn test_terminal_events_clear_current() {
        let bus = StatusBus::with_default_capacity();
        let table = StatusTable::attach(&bus);

        let emitter = bus.emitter_for("acct1");
        emitter.sending(1, 1, 3);
        emitter.completed();
        settle().await;

        let row = table.row("acct1").unwrap();
        assert!(row.current.is_none());
        assert_eq!(row.state, "completed");
    }
}
