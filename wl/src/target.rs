//! Delivery targets
//!
//! A target is either a group-like entity (group or channel) or a single
//! user. Target lists are immutable for the duration of a job and their
//! order is significant: it is the send order within a round.

use serde::{Deserialize, Serialize};

/// A group or channel a message can be posted into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTarget {
    /// Remote identifier
    pub id: i64,

    /// Display title
    pub title: String,

    /// Public handle, when the group has one
    #[serde(default)]
    pub username: Option<String>,

    /// Read-only for this account; the engine must skip it
    #[serde(default, rename = "broadcast-only")]
    pub broadcast_only: bool,
}

/// A single user, addressed by username or phone string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTarget {
    pub handle: String,
}

/// Anything a message can be delivered to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Group(GroupTarget),
    User(UserTarget),
}

impl Target {
    /// Construct a group target
    pub fn group(id: i64, title: impl Into<String>) -> Self {
        Self::Group(GroupTarget {
            id,
            title: title.into(),
            username: None,
            broadcast_only: false,
        })
    }

    /// Construct a user target
    pub fn user(handle: impl Into<String>) -> Self {
        Self::User(UserTarget {
            handle: handle.into(),
        })
    }

    /// Stable key for logs, dedup, and the in-memory transport ledger
    pub fn key(&self) -> String {
        match self {
            Self::Group(g) => format!("group:{}", g.id),
            Self::User(u) => format!("user:{}", u.handle),
        }
    }

    /// Human-readable label (title, handle, or link)
    pub fn label(&self) -> String {
        match self {
            Self::Group(g) => match &g.username {
                Some(name) => format!("https://t.me/{}", name),
                None => g.title.clone(),
            },
            Self::User(u) => u.handle.clone(),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A resolved, live remote entity handle
///
/// Resolution happens immediately before a send; the `broadcast_only` flag
/// on the peer is authoritative at that moment even if the static target
/// list was enumerated earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub title: String,
    pub broadcast_only: bool,
}

impl Peer {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            broadcast_only: false,
        }
    }

    pub fn broadcast(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            broadcast_only: true,
        }
    }
}
