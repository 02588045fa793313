//! Sequential multi-target runs
//!
//! Targets are collected strictly one after another, in input order, with a
//! fixed pause between them. Each target ends in exactly one `RunSummary`;
//! only credential store failures and the final summary write abort the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::artifacts::ArtifactSink;
use crate::collector::{Collector, Limit};
use crate::error::{BatchError, CollectError};
use crate::summary::{RunStatus, RunSummary};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per started target, in input order.
    pub summaries: Vec<RunSummary>,
    pub summary_path: PathBuf,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.summaries.iter().filter(|s| s.status.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.summaries.len() - self.succeeded()
    }
}

/// Runs the collector over a list of targets.
pub struct Batch {
    collector: Collector,
    sink: Arc<dyn ArtifactSink>,
    pause: Duration,
}

impl Batch {
    /// `pause` is slept between consecutive targets whatever their outcome.
    pub fn new(collector: Collector, sink: Arc<dyn ArtifactSink>, pause: Duration) -> Self {
        Self {
            collector,
            sink,
            pause,
        }
    }

    /// Collect every target and write the run summary.
    ///
    /// Cancellation stops the run between pages: the in-flight target is
    /// recorded as `cancelled` and targets not yet started get no entry.
    pub async fn run(
        &self,
        targets: &[String],
        limit: Limit,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut summaries = Vec::with_capacity(targets.len());
        let mut cancelled = false;

        info!(%run_id, targets = targets.len(), limit = %limit, "batch started");

        for (i, target) in targets.iter().enumerate() {
            if i > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.pause) => {}
                }
            }
            if cancel.is_cancelled() {
                cancelled = true;
                warn!(%run_id, remaining = targets.len() - i, "batch cancelled before next target");
                break;
            }

            info!(%run_id, target = %target, position = i + 1, of = targets.len(), "processing target");

            let summary = match self.collector.collect(target, limit, cancel).await {
                Ok(harvest) => match self.sink.write_target(target, &harvest).await {
                    Ok(paths) => RunSummary::success(target, &harvest, paths),
                    Err(e) => {
                        error!(target = %target, error = %e, "failed to write artifacts");
                        RunSummary::unsaved(target, &harvest, format!("writing artifacts: {e}"))
                    }
                },
                Err(CollectError::Cancelled { fetched }) => {
                    cancelled = true;
                    warn!(target = %target, fetched, "target cancelled");
                    summaries.push(RunSummary::failed(
                        target,
                        limit,
                        RunStatus::Cancelled,
                        fetched,
                    ));
                    break;
                }
                Err(CollectError::Pool(e)) => {
                    error!(target = %target, error = %e, "credential store failure, aborting batch");
                    return Err(BatchError::Store(e));
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "target failed");
                    RunSummary::failed(target, limit, RunStatus::Error(e.to_string()), 0)
                }
            };

            info!(
                target = %target,
                status = %summary.status,
                fetched = summary.fetched_count,
                "target finished"
            );
            summaries.push(summary);
        }

        let summary_path = self
            .sink
            .write_summary(&summaries)
            .await
            .map_err(BatchError::Summary)?;

        let report = BatchReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            summaries,
            summary_path,
            cancelled,
        };
        info!(
            %run_id,
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled,
            "batch finished"
        );
        Ok(report)
    }
}
