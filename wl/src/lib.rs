//! Wireline - message transport abstraction
//!
//! Wireline defines the seam between a sending engine and whatever remote
//! messaging service actually carries the messages:
//!
//! - [`target`] - the things a message can be delivered to (groups, users)
//! - [`error`] - the structured failure taxonomy every transport must speak
//! - [`outbox`] - the `Outbox` and `Connector` traits a transport implements
//! - [`link`] - join-link parsing for the invite/join workflow
//! - [`memory`] - an in-memory transport for tests and dry runs
//!
//! The engine never inspects raw server error strings; transports are
//! required to map their wire-level failures into [`error::SendError`]
//! variants so that retry/skip/abort policy stays deterministic.

pub mod error;
pub mod link;
pub mod memory;
pub mod outbox;
pub mod target;

// Re-export commonly used types
pub use error::{AuthError, ErrorKind, SendError};
pub use link::JoinLink;
pub use memory::{MemoryConnector, MemoryOutbox, SentMessage};
pub use outbox::{Ack, Connection, Connector, Outbox};
pub use target::{GroupTarget, Peer, Target, UserTarget};
