//! Run output files
//!
//! `FileArtifacts` writes, per target, a JSON document and a flat CSV of the
//! followers, and one summary CSV per run:
//!
//! - `followers_<target>[_<stamp>].json`
//! - `followers_<target>[_<stamp>].csv` (only when followers were fetched)
//! - `followers_summary[_<stamp>].csv`
//!
//! Without a stamp each run overwrites the previous files.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use chrono::{DateTime, Local, Utc};
use platform::Follower;
use serde::Serialize;
use tracing::info;

use crate::collector::Harvest;
use crate::error::ArtifactError;
use crate::summary::RunSummary;

/// Destination for collected followers and run summaries.
///
/// Uses `Pin<Box<dyn Future>>` return types so batches can hold an
/// `Arc<dyn ArtifactSink>`.
pub trait ArtifactSink: Send + Sync {
    /// Persist one target's followers; returns the paths written.
    fn write_target<'a>(
        &'a self,
        target: &'a str,
        harvest: &'a Harvest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>, ArtifactError>> + Send + 'a>>;

    /// Persist the run summary; returns the path written.
    fn write_summary<'a>(
        &'a self,
        summaries: &'a [RunSummary],
    ) -> Pin<Box<dyn Future<Output = Result<PathBuf, ArtifactError>> + Send + 'a>>;
}

const FOLLOWER_COLUMNS: [&str; 10] = [
    "rank",
    "username",
    "display_name",
    "user_id",
    "followers",
    "following",
    "tweets",
    "verified",
    "created_at",
    "description",
];

const SUMMARY_COLUMNS: [&str; 9] = [
    "target",
    "display_name",
    "total_followers",
    "requested_limit",
    "fetched_count",
    "truncated",
    "finished_at",
    "status",
    "artifacts",
];

#[derive(Serialize)]
struct TargetDocument<'a> {
    target_user: &'a str,
    target_display_name: &'a str,
    target_followers_total: u64,
    fetched_count: usize,
    fetched_at: DateTime<Utc>,
    truncated: Option<String>,
    followers: Vec<FollowerRecord<'a>>,
}

#[derive(Serialize)]
struct FollowerRecord<'a> {
    rank: usize,
    username: &'a str,
    display_name: &'a str,
    user_id: u64,
    followers: u64,
    following: u64,
    tweets: u64,
    verified: bool,
    created_at: Option<DateTime<Utc>>,
    description: &'a str,
}

impl<'a> FollowerRecord<'a> {
    fn new(rank: usize, follower: &'a Follower) -> Self {
        Self {
            rank,
            username: &follower.username,
            display_name: &follower.display_name,
            user_id: follower.id,
            followers: follower.followers_count,
            following: follower.following_count,
            tweets: follower.statuses_count,
            verified: follower.verified,
            created_at: follower.created_at,
            description: &follower.description,
        }
    }

    fn csv_row(&self) -> [String; 10] {
        [
            self.rank.to_string(),
            self.username.to_string(),
            self.display_name.to_string(),
            self.user_id.to_string(),
            self.followers.to_string(),
            self.following.to_string(),
            self.tweets.to_string(),
            self.verified.to_string(),
            self.created_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            self.description.to_string(),
        ]
    }
}

/// Writes artifacts as files under one output directory.
#[derive(Debug, Clone)]
pub struct FileArtifacts {
    out_dir: PathBuf,
    stamp: Option<String>,
}

impl FileArtifacts {
    /// Output under `out_dir`; with `timestamped`, every file name carries
    /// the local time of this call so runs never overwrite each other.
    pub fn new(out_dir: impl Into<PathBuf>, timestamped: bool) -> Self {
        let stamp = timestamped.then(|| Local::now().format("%Y%m%d_%H%M%S").to_string());
        Self::with_stamp(out_dir, stamp)
    }

    pub fn with_stamp(out_dir: impl Into<PathBuf>, stamp: Option<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            stamp,
        }
    }

    fn path(&self, base: &str, ext: &str) -> PathBuf {
        let name = match &self.stamp {
            Some(stamp) => format!("{base}_{stamp}.{ext}"),
            None => format!("{base}.{ext}"),
        };
        self.out_dir.join(name)
    }

    async fn write_target_files(
        &self,
        target: &str,
        harvest: &Harvest,
    ) -> Result<Vec<PathBuf>, ArtifactError> {
        ensure_dir(&self.out_dir).await?;
        let base = format!("followers_{}", sanitize(target));
        let records: Vec<FollowerRecord<'_>> = harvest
            .followers
            .iter()
            .enumerate()
            .map(|(i, f)| FollowerRecord::new(i + 1, f))
            .collect();

        let mut written = Vec::with_capacity(2);

        let json_path = self.path(&base, "json");
        let rows: Vec<[String; 10]> = records.iter().map(FollowerRecord::csv_row).collect();
        let document = TargetDocument {
            target_user: &harvest.profile.username,
            target_display_name: &harvest.profile.display_name,
            target_followers_total: harvest.profile.followers_count,
            fetched_count: records.len(),
            fetched_at: harvest.fetched_at,
            truncated: harvest.truncated.as_ref().map(ToString::to_string),
            followers: records,
        };
        let json = serde_json::to_string_pretty(&document).map_err(|source| {
            ArtifactError::Encode {
                what: json_path.display().to_string(),
                source,
            }
        })?;
        write_file(&json_path, json).await?;
        written.push(json_path);

        if !rows.is_empty() {
            let csv_path = self.path(&base, "csv");
            write_file(&csv_path, csv_document(&FOLLOWER_COLUMNS, &rows)).await?;
            written.push(csv_path);
        }

        info!(
            target = %target,
            files = ?written,
            followers = harvest.followers.len(),
            "target artifacts written"
        );
        Ok(written)
    }

    async fn write_summary_file(&self, summaries: &[RunSummary]) -> Result<PathBuf, ArtifactError> {
        ensure_dir(&self.out_dir).await?;
        let rows: Vec<[String; 9]> = summaries
            .iter()
            .map(|s| {
                [
                    s.target.clone(),
                    s.display_name.clone().unwrap_or_default(),
                    s.total_followers.map(|n| n.to_string()).unwrap_or_default(),
                    s.requested_limit.to_string(),
                    s.fetched_count.to_string(),
                    s.truncated.clone().unwrap_or_default(),
                    s.finished_at.to_rfc3339(),
                    s.status.to_string(),
                    s.artifact_paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(";"),
                ]
            })
            .collect();

        let path = self.path("followers_summary", "csv");
        write_file(&path, csv_document(&SUMMARY_COLUMNS, &rows)).await?;
        info!(path = %path.display(), targets = summaries.len(), "run summary written");
        Ok(path)
    }
}

impl ArtifactSink for FileArtifacts {
    fn write_target<'a>(
        &'a self,
        target: &'a str,
        harvest: &'a Harvest,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PathBuf>, ArtifactError>> + Send + 'a>> {
        Box::pin(self.write_target_files(target, harvest))
    }

    fn write_summary<'a>(
        &'a self,
        summaries: &'a [RunSummary],
    ) -> Pin<Box<dyn Future<Output = Result<PathBuf, ArtifactError>> + Send + 'a>> {
        Box::pin(self.write_summary_file(summaries))
    }
}

/// Reduce a target name to `[A-Za-z0-9_]` for use in file names.
fn sanitize(target: &str) -> String {
    let cleaned: String = target
        .trim()
        .trim_start_matches('@')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_document<const N: usize>(header: &[&str; N], rows: &[[String; N]]) -> String {
    let mut out = header.join(",");
    out.push_str("\r\n");
    for row in rows {
        let line: Vec<String> = row.iter().map(|v| csv_field(v)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    }
    out
}

async fn ensure_dir(dir: &Path) -> Result<(), ArtifactError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })
}

async fn write_file(path: &Path, contents: String) -> Result<(), ArtifactError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })
}
