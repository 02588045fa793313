//! Per-target run outcomes

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::collector::{Harvest, Limit};

/// Final state of one target in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Error(String),
    /// The run was cancelled while this target was in flight.
    Cancelled,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::Error(reason) => write!(f, "error: {reason}"),
            RunStatus::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outcome of one target, built once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Target as given by the caller.
    pub target: String,
    pub display_name: Option<String>,
    pub total_followers: Option<u64>,
    pub requested_limit: Limit,
    pub fetched_count: usize,
    /// Truncation reason when the pool ran dry mid-collection.
    pub truncated: Option<String>,
    pub status: RunStatus,
    pub artifact_paths: Vec<PathBuf>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    pub(crate) fn success(target: &str, harvest: &Harvest, artifact_paths: Vec<PathBuf>) -> Self {
        Self {
            target: target.to_string(),
            display_name: Some(harvest.profile.display_name.clone()),
            total_followers: Some(harvest.profile.followers_count),
            requested_limit: harvest.requested,
            fetched_count: harvest.followers.len(),
            truncated: harvest.truncated.as_ref().map(ToString::to_string),
            status: RunStatus::Success,
            artifact_paths,
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn failed(target: &str, limit: Limit, status: RunStatus, fetched: usize) -> Self {
        Self {
            target: target.to_string(),
            display_name: None,
            total_followers: None,
            requested_limit: limit,
            fetched_count: fetched,
            truncated: None,
            status,
            artifact_paths: Vec::new(),
            finished_at: Utc::now(),
        }
    }

    /// The harvest was collected but its artifacts could not be written.
    pub(crate) fn unsaved(target: &str, harvest: &Harvest, reason: String) -> Self {
        Self {
            status: RunStatus::Error(reason),
            ..Self::success(target, harvest, Vec::new())
        }
    }
}
