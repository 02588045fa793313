//! Account record and status

use chrono::{DateTime, Utc};
use common::TokenBundle;
use serde::{Deserialize, Serialize};

/// Health of a stored account.
///
/// Transitions:
/// - Unchecked → Active (activation succeeded)
/// - Unchecked | Active → Faulty (activation failed, or a request hit an auth failure)
/// - Faulty → Active (a later activation pass succeeded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Unchecked,
    Active,
    Faulty,
}

impl AccountStatus {
    /// Status label for tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AccountStatus::Unchecked => "unchecked",
            AccountStatus::Active => "active",
            AccountStatus::Faulty => "faulty",
        }
    }

    /// Whether an activation pass should (re)try this account.
    pub fn needs_activation(&self) -> bool {
        matches!(self, AccountStatus::Unchecked | AccountStatus::Faulty)
    }
}

/// One credential set. `username` is unique across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub tokens: TokenBundle,
    pub status: AccountStatus,
    #[serde(default)]
    pub total_requests: u64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl Account {
    /// A fresh, unchecked account.
    pub fn new(username: impl Into<String>, tokens: TokenBundle) -> Self {
        Self {
            username: username.into(),
            tokens,
            status: AccountStatus::Unchecked,
            total_requests: 0,
            last_used_at: None,
            last_error: None,
            added_at: Utc::now(),
        }
    }
}

/// Per-status account counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub unchecked: usize,
    pub active: usize,
    pub faulty: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.unchecked + self.active + self.faulty
    }
}

impl<'a> FromIterator<&'a Account> for StatusCounts {
    fn from_iter<I: IntoIterator<Item = &'a Account>>(iter: I) -> Self {
        let mut counts = StatusCounts::default();
        for account in iter {
            match account.status {
                AccountStatus::Unchecked => counts.unchecked += 1,
                AccountStatus::Active => counts.active += 1,
                AccountStatus::Faulty => counts.faulty += 1,
            }
        }
        counts
    }
}
