//! Account registry - session discovery and connection
//!
//! Scans a directory for session files, connects each through a
//! [`Connector`], and produces [`Account`] handles. Connections outlive any
//! single job and are reused across jobs; stopping a job never tears them
//! down. One bad session never fails the whole scan.

use std::path::Path;
use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{info, warn};
use wireline::{Connector, Outbox, Target};

use crate::status::StatusBus;

/// One authenticated account with its identity and assigned targets
#[derive(Clone)]
pub struct Account {
    /// Display ordinal (1-indexed, scan order)
    pub ordinal: u32,

    /// Stable name (session file stem)
    pub session: String,

    /// Phone or display label reported by the service
    pub phone: String,

    /// Authenticated handle for remote calls
    pub outbox: Arc<dyn Outbox>,

    /// Ordered target list for the group-broadcast variant; order is the
    /// send order within a round
    pub targets: Vec<Target>,
}

impl Account {
    pub fn is_connected(&self) -> bool {
        self.outbox.is_connected()
    }

    /// Attach the pre-resolved target list for the next job
    pub fn with_targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = targets;
        self
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("ordinal", &self.ordinal)
            .field("session", &self.session)
            .field("phone", &self.phone)
            .field("targets", &self.targets.len())
            .finish()
    }
}

/// Scan a directory for `*.session` files, returning sorted session names
pub fn scan_sessions(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let pattern = dir.as_ref().join("*.session");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| eyre::eyre!("session directory path is not valid UTF-8"))?;

    let mut sessions: Vec<String> = glob::glob(pattern)
        .context("Invalid session glob pattern")?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();

    sessions.sort();
    info!(count = sessions.len(), "scanned session files");
    Ok(sessions)
}

/// Connect every session in `dir`, emitting status events along the way
///
/// Unauthorized or unreachable sessions are reported and skipped; the
/// returned accounts are the ones that connected.
pub async fn connect_all(
    dir: impl AsRef<Path>,
    connector: &dyn Connector,
    bus: &StatusBus,
) -> Result<Vec<Account>> {
    let sessions = scan_sessions(dir)?;

    let mut accounts = Vec::new();
    for (i, session) in sessions.iter().enumerate() {
        let emitter = bus.emitter_for(session.clone());
        emitter.scanned();
        emitter.connecting();

        match connector.connect(session).await {
            Ok(conn) => {
                emitter.connected(&conn.phone);
                info!(session = %session, phone = %conn.phone, "account connected");
                accounts.push(Account {
                    ordinal: i as u32 + 1,
                    session: session.clone(),
                    phone: conn.phone,
                    outbox: conn.outbox,
                    targets: Vec::new(),
                });
            }
            Err(e) => {
                emitter.connect_failed(&e.to_string());
                warn!(session = %session, error = %e, "account connection failed");
            }
        }
    }

    info!(connected = accounts.len(), "connection pass finished");
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use wireline::MemoryConnector;

    fn touch_sessions(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(format!("{}.session", name)), b"").unwrap();
        }
    }

    #[test]
    fn test_scan_finds_sorted_session_stems() {
        let temp = tempdir().unwrap();
        touch_sessions(temp.path(), &["bravo", "alpha"]);
        fs::write(temp.path().join("notes.txt"), b"").unwrap();

        let sessions = scan_sessions(temp.path()).unwrap();
        assert_eq!(sessions, vec!["alpha", "bravo"]);
    }

    #[test]
    fn test_scan_empty_dir() {
        let temp = tempdir().unwrap();
        assert!(scan_sessions(temp.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_all_skips_unauthorized() {
        let temp = tempdir().unwrap();
        touch_sessions(temp.path(), &["good", "locked"]);

        let connector = MemoryConnector::new().deny("locked");
        let bus = StatusBus::with_default_capacity();
        let mut rx = bus.subscribe();

        let accounts = connect_all(temp.path(), &connector, &bus).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].session, "good");
        assert!(accounts[0].is_connected());

        // good: Scanned/Connecting/Connected, locked: Scanned/Connecting/ConnectFailed
        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push((event.session().to_string(), event.kind()));
        }
        assert!(kinds.contains(&("good".to_string(), "Connected")));
        assert!(kinds.contains(&("locked".to_string(), "ConnectFailed")));
    }

    #[tokio::test]
    async fn test_ordinals_follow_scan_order() {
        let temp = tempdir().unwrap();
        touch_sessions(temp.path(), &["a1", "a2", "a3"]);

        let connector = MemoryConnector::new();
        let bus = StatusBus::with_default_capacity();
        let accounts = connect_all(temp.path(), &connector, &bus).await.unwrap();

        let ordinals: Vec<u32> = accounts.iter().map(|a| a.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }
}
