//! Records exchanged with the platform

use chrono::{DateTime, Utc};
use common::TokenBundle;
use serde::{Deserialize, Serialize};

/// An authenticated session for one pool account.
///
/// Carries the account's tokens so each request can be signed without going
/// back to the credential store.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    pub username: String,
    pub tokens: TokenBundle,
}

impl SessionHandle {
    /// Resume a session for an account whose tokens were validated earlier.
    ///
    /// No network round trip; if the tokens have since expired the next
    /// request fails with `Auth`.
    pub fn resume(username: impl Into<String>, tokens: TokenBundle) -> Self {
        Self {
            username: username.into(),
            tokens,
        }
    }
}

/// Canonical description of a collection target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
}

/// One follower as returned by the platform. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follower {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub followers_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub statuses_count: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
}

/// One page of a paginated relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Vec<Follower>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl Page {
    /// Whether this is the last page of the relation.
    pub fn is_last(&self) -> bool {
        self.next_cursor.as_deref().is_none_or(str::is_empty)
    }
}
