//! The `followers` command
//!
//! Activates the pool, builds a rotator over the active accounts and runs
//! the batch. Per-target failures are part of the returned report; only
//! credential store and summary write failures are errors here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use account_pool::{Activator, Rotator};
use anyhow::Context;
use credential_store::CredentialStore;
use harvest::{Batch, BatchReport, Collector, FileArtifacts, Limit};
use platform::Platform;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;

/// What to collect and where to put it.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub targets: Vec<String>,
    pub limit: Limit,
    pub timestamp: bool,
    pub out_dir: PathBuf,
}

/// Strip leading `@` and drop empty names, keeping input order.
pub fn normalize_targets(raw: &[String]) -> crate::error::Result<Vec<String>> {
    let targets: Vec<String> = raw
        .iter()
        .map(|t| t.trim().trim_start_matches('@').to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if targets.is_empty() {
        return Err(crate::error::Error::NoTargets);
    }
    Ok(targets)
}

pub async fn run_followers(
    config: &Config,
    store: Arc<CredentialStore>,
    platform: Arc<dyn Platform>,
    options: RunOptions,
    cancel: CancellationToken,
) -> anyhow::Result<BatchReport> {
    let activation = Activator::new(
        Arc::clone(&store),
        Arc::clone(&platform),
        config.pool.activation_concurrency,
    )
    .activate_all()
    .await
    .context("activating accounts")?;
    info!(
        activated = activation.activated.len(),
        failed = activation.failed.len(),
        already_active = activation.skipped,
        "activation pass complete"
    );

    let rotator = Arc::new(Rotator::new(Arc::clone(&store), config.cooldown_policy()).await);
    let counts = rotator.counts().await;
    if counts.total == 0 {
        warn!("no active accounts; every target will fail until accounts are added");
    }

    let collector = Collector::new(rotator, platform, config.harvest.max_retries);
    let sink = Arc::new(FileArtifacts::new(options.out_dir.clone(), options.timestamp));
    let batch = Batch::new(
        collector,
        sink,
        Duration::from_secs(config.harvest.target_pause_secs),
    );

    batch
        .run(&options.targets, options.limit, &cancel)
        .await
        .context("batch run failed")
}

/// Per-target result lines for the terminal.
pub fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .summaries
        .iter()
        .map(|s| {
            let mark = if s.status.is_success() { "ok " } else { "err" };
            let mut line = format!(
                "[{mark}] @{}: {} followers fetched ({})",
                s.target, s.fetched_count, s.status
            );
            if let Some(reason) = &s.truncated {
                line.push_str(&format!(", truncated: {reason}"));
            }
            line
        })
        .collect();
    if report.cancelled {
        lines.push("run cancelled; remaining targets were not started".into());
    }
    lines.push(format!("summary saved to {}", report.summary_path.display()));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TokenBundle;
    use credential_store::{Account, AccountStatus};
    use harvest::RunStatus;
    use platform::{PlatformError, ScriptedPlatform};

    #[test]
    fn targets_are_normalized() {
        let raw = vec!["@alice".to_string(), " bob ".into(), "@".into()];
        assert_eq!(normalize_targets(&raw).unwrap(), vec!["alice", "bob"]);
        assert!(normalize_targets(&["@".to_string()]).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn activates_then_collects_with_working_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            CredentialStore::load(dir.path().join("accounts.json"))
                .await
                .unwrap(),
        );
        for name in ["a1", "a2"] {
            store
                .add(Account::new(
                    name,
                    TokenBundle::new(&format!("at_{name}"), "ct").unwrap(),
                ))
                .await
                .unwrap();
        }
        let platform = Arc::new(ScriptedPlatform::new());
        platform.reject_account("a2", PlatformError::Auth("suspended".into()));
        platform.add_target(
            ScriptedPlatform::profile(1, "alice", 30),
            ScriptedPlatform::sample_followers(100, 30),
            10,
        );

        let out = dir.path().join("out");
        let options = RunOptions {
            targets: normalize_targets(&["@alice".to_string(), "nobody".into()]).unwrap(),
            limit: Limit::from_requested(25),
            timestamp: false,
            out_dir: out.clone(),
        };
        let report = run_followers(
            &Config::default(),
            Arc::clone(&store),
            platform.clone(),
            options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.summaries.len(), 2);
        assert_eq!(report.summaries[0].status, RunStatus::Success);
        assert_eq!(report.summaries[0].fetched_count, 25);
        assert!(matches!(report.summaries[1].status, RunStatus::Error(_)));
        assert_eq!(platform.accounts_used(), vec!["a1".to_string()]);
        assert_eq!(
            store.get("a2").await.unwrap().status,
            AccountStatus::Faulty
        );

        assert!(out.join("followers_alice.json").exists());
        assert!(out.join("followers_alice.csv").exists());
        assert!(out.join("followers_summary.csv").exists());

        let lines = report_lines(&report);
        assert!(lines[0].starts_with("[ok ] @alice: 25 followers fetched"));
        assert!(lines[1].starts_with("[err] @nobody"));
        assert!(lines.last().unwrap().starts_with("summary saved to"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_pool_still_reports_every_target() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            CredentialStore::load(dir.path().join("accounts.json"))
                .await
                .unwrap(),
        );
        let platform = Arc::new(ScriptedPlatform::new());
        let options = RunOptions {
            targets: vec!["alice".into(), "bob".into()],
            limit: Limit::UNBOUNDED,
            timestamp: true,
            out_dir: dir.path().to_path_buf(),
        };

        let report = run_followers(
            &Config::default(),
            store,
            platform,
            options,
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.failed(), 2);
        let name = report
            .summary_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("followers_summary_"), "got {name}");
    }
}
