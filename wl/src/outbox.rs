//! The transport traits
//!
//! An `Outbox` is an authenticated handle capable of issuing remote calls
//! for exactly one account. A `Connector` turns a session name into such a
//! handle. Engines hold outboxes as `Arc<dyn Outbox>` and never see the
//! concrete transport.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AuthError, SendError};
use crate::link::JoinLink;
use crate::target::{Peer, Target};

/// Acknowledgement of a delivered message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ack {
    /// Provider-assigned message id, when the transport reports one
    pub message_id: Option<i64>,
}

/// An authenticated per-account transport handle
#[async_trait]
pub trait Outbox: Send + Sync {
    /// Whether the underlying connection is currently alive
    fn is_connected(&self) -> bool;

    /// Resolve a target into a live peer handle
    async fn resolve(&self, target: &Target) -> Result<Peer, SendError>;

    /// Deliver a message to a target
    async fn send(&self, target: &Target, message: &str) -> Result<Ack, SendError>;

    /// Join the chat behind a link
    async fn join(&self, link: &JoinLink) -> Result<(), SendError>;
}

/// A ready, authenticated connection plus its identity metadata
pub struct Connection {
    pub outbox: Arc<dyn Outbox>,
    /// Phone or display label reported by the service
    pub phone: String,
}

/// Turns a session name into an authenticated connection
///
/// Credential discovery and the interactive login handshake live behind
/// this trait; the engine only consumes ready handles.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, session: &str) -> Result<Connection, AuthError>;
}
