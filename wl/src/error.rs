//! Structured transport failure taxonomy
//!
//! Transports map raw server failures into these variants so downstream
//! policy (wait, skip, abort) never depends on free-text matching. The
//! variants are categories of failure, not literal server codes.

use thiserror::Error;

/// A failure raised by a remote send, resolve, or join call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// Server-mandated cooldown before this action may be retried
    #[error("rate limited: retry after {seconds}s")]
    FloodWait { seconds: u64 },

    /// Posting to this chat is forbidden for the account
    #[error("writing is forbidden in this chat")]
    WriteForbidden,

    /// The account is banned from this channel
    #[error("banned in this channel")]
    BannedInTarget,

    /// The action requires admin privileges in the target
    #[error("admin privileges required")]
    AdminRequired,

    /// The target identifier does not resolve to a reachable peer
    #[error("invalid or unknown peer")]
    InvalidPeer,

    /// Message body exceeds the service limit
    #[error("message too long")]
    MessageTooLong,

    /// A join request for this chat is already pending approval
    #[error("join request already pending approval")]
    AlreadyRequested,

    /// Account-level spam penalty; every further send would fail
    #[error("account hit a spam restriction")]
    PeerFlood,

    /// The account has been deactivated or banned outright
    #[error("account deactivated or banned")]
    AccountDeactivated,

    /// This whole category of action has been revoked for the account
    #[error("capability frozen for this account")]
    MethodFrozen,

    /// The session is no longer authorized
    #[error("session not authorized")]
    NotAuthorized,

    /// Anything the transport could not categorize; raw text preserved
    #[error("transport error: {0}")]
    Other(String),
}

impl SendError {
    /// Fieldless discriminant, usable as a map key in policy tables
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FloodWait { .. } => ErrorKind::FloodWait,
            Self::WriteForbidden => ErrorKind::WriteForbidden,
            Self::BannedInTarget => ErrorKind::BannedInTarget,
            Self::AdminRequired => ErrorKind::AdminRequired,
            Self::InvalidPeer => ErrorKind::InvalidPeer,
            Self::MessageTooLong => ErrorKind::MessageTooLong,
            Self::AlreadyRequested => ErrorKind::AlreadyRequested,
            Self::PeerFlood => ErrorKind::PeerFlood,
            Self::AccountDeactivated => ErrorKind::AccountDeactivated,
            Self::MethodFrozen => ErrorKind::MethodFrozen,
            Self::NotAuthorized => ErrorKind::NotAuthorized,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// Discriminant for [`SendError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    FloodWait,
    WriteForbidden,
    BannedInTarget,
    AdminRequired,
    InvalidPeer,
    MessageTooLong,
    AlreadyRequested,
    PeerFlood,
    AccountDeactivated,
    MethodFrozen,
    NotAuthorized,
    Other,
}

/// Failures from establishing an authenticated connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Session exists but is not (or no longer) authorized
    #[error("session not authorized")]
    NotAuthorized,

    /// Connection could not be established
    #[error("connection unavailable: {0}")]
    Unavailable(String),
}
