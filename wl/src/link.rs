//! Join-link parsing
//!
//! Accepts the common invite forms: public `t.me` links, private invite
//! links (`+hash` or `joinchat/hash`), `@handles`, bare usernames, and
//! numeric chat ids.

use serde::{Deserialize, Serialize};

/// A parsed join target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinLink {
    /// Public group/channel username
    Public(String),
    /// Private invite hash
    Invite(String),
    /// Raw chat id
    ChatId(i64),
}

impl JoinLink {
    /// Parse one link line; returns None for empty input
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(rest) = raw
            .strip_prefix("https://t.me/")
            .or_else(|| raw.strip_prefix("http://t.me/"))
            .or_else(|| raw.strip_prefix("t.me/"))
        {
            let tail = rest.trim_end_matches('/');
            let tail = tail.rsplit('/').next().unwrap_or(tail);
            if let Some(hash) = tail.strip_prefix('+') {
                return Some(Self::Invite(hash.to_string()));
            }
            if rest.starts_with("joinchat/") {
                return Some(Self::Invite(tail.to_string()));
            }
            // Unusually long tails are invite hashes, not usernames
            if tail.len() > 32 {
                return Some(Self::Invite(tail.to_string()));
            }
            return Some(Self::Public(tail.to_string()));
        }

        if let Some(name) = raw.strip_prefix('@') {
            return Some(Self::Public(name.to_string()));
        }

        if let Ok(id) = raw.parse::<i64>() {
            return Some(Self::ChatId(id));
        }

        Some(Self::Public(raw.to_string()))
    }
}

impl std::fmt::Display for JoinLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public(name) => write!(f, "@{}", name),
            Self::Invite(hash) => write!(f, "t.me/+{}", hash),
            Self::ChatId(id) => write!(f, "chat:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_public_link() {
        assert_eq!(
            JoinLink::parse("https://t.me/rustlang"),
            Some(JoinLink::Public("rustlang".to_string()))
        );
        assert_eq!(
            JoinLink::parse("@rustlang"),
            Some(JoinLink::Public("rustlang".to_string()))
        );
        assert_eq!(
            JoinLink::parse("rustlang"),
            Some(JoinLink::Public("rustlang".to_string()))
        );
    }

    #[test]
    fn test_parse_invite_forms() {
        assert_eq!(
            JoinLink::parse("https://t.me/+AbCdEf123"),
            Some(JoinLink::Invite("AbCdEf123".to_string()))
        );
        assert_eq!(
            JoinLink::parse("https://t.me/joinchat/AbCdEf123"),
            Some(JoinLink::Invite("AbCdEf123".to_string()))
        );
    }

    #[test]
    fn test_parse_chat_id() {
        assert_eq!(JoinLink::parse("-1001234567890"), Some(JoinLink::ChatId(-1001234567890)));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(JoinLink::parse("   "), None);
    }
}
