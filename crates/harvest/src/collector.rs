//! Paginated follower collection for one target
//!
//! Every platform request goes through `Collector::request`: lease an
//! account, run the call, release the lease with the classified outcome.
//! Rate limits and expired sessions are the account's problem, so the
//! request moves to another account without touching the retry budget.
//! Transient failures are retried up to `max_retries` times; not-found and
//! protocol errors end the target.
//!
//! Iteration stops at the first of:
//! - a missing or repeated cursor, or an empty page
//! - the requested limit
//! - pool exhaustion (partial result, flagged as truncated)

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use account_pool::{PoolCounts, RequestOutcome, Rotator};
use chrono::{DateTime, Utc};
use platform::{Follower, Page, Platform, PlatformError, SessionHandle, TargetProfile};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CollectError;

/// Cap on the number of followers collected for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Limit(Option<usize>);

impl Limit {
    pub const UNBOUNDED: Limit = Limit(None);

    /// Limit from a user-supplied count; zero or negative means unbounded.
    pub fn from_requested(requested: i64) -> Self {
        match usize::try_from(requested) {
            Ok(0) | Err(_) => Limit(None),
            Ok(n) => Limit(Some(n)),
        }
    }

    pub fn get(&self) -> Option<usize> {
        self.0
    }

    fn reached(&self, collected: usize) -> bool {
        self.0.is_some_and(|max| collected >= max)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "{n}"),
            None => f.write_str("unbounded"),
        }
    }
}

/// Why a collection ended before the relation was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Truncation {
    PoolExhausted(PoolCounts),
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Truncation::PoolExhausted(counts) => write!(f, "pool exhausted: {counts}"),
        }
    }
}

/// Finished collection for one target.
#[derive(Debug, Clone)]
pub struct Harvest {
    pub profile: TargetProfile,
    pub requested: Limit,
    /// Followers in platform order, unique by id.
    pub followers: Vec<Follower>,
    pub truncated: Option<Truncation>,
    pub pages: usize,
    pub fetched_at: DateTime<Utc>,
}

/// Runs rotator-backed platform requests with bounded retries.
pub struct Collector {
    rotator: Arc<Rotator>,
    platform: Arc<dyn Platform>,
    max_retries: u32,
}

impl Collector {
    pub fn new(rotator: Arc<Rotator>, platform: Arc<dyn Platform>, max_retries: u32) -> Self {
        Self {
            rotator,
            platform,
            max_retries,
        }
    }

    pub fn rotator(&self) -> &Arc<Rotator> {
        &self.rotator
    }

    /// Resolve `target` and return an incremental collection over its
    /// followers.
    ///
    /// A leading `@` on the target is ignored.
    pub async fn start(
        &self,
        target: &str,
        limit: Limit,
        cancel: CancellationToken,
    ) -> Result<Collection<'_>, CollectError> {
        let identifier = target.trim().trim_start_matches('@').to_string();
        let platform = Arc::clone(&self.platform);
        let profile = self
            .request(&cancel, 0, move |session| {
                let platform = Arc::clone(&platform);
                let identifier = identifier.clone();
                async move { platform.resolve_target(&session, &identifier).await }
            })
            .await?;

        info!(
            target = %profile.username,
            id = profile.id,
            followers = profile.followers_count,
            limit = %limit,
            "target resolved"
        );

        Ok(Collection {
            collector: self,
            profile,
            limit,
            cancel,
            cursor: None,
            seen: HashSet::new(),
            collected: Vec::new(),
            truncated: None,
            pages: 0,
            done: false,
        })
    }

    /// Collect a target's followers up to `limit`.
    pub async fn collect(
        &self,
        target: &str,
        limit: Limit,
        cancel: &CancellationToken,
    ) -> Result<Harvest, CollectError> {
        let mut collection = self.start(target, limit, cancel.clone()).await?;
        while collection.next_page().await?.is_some() {}
        Ok(collection.finish())
    }

    async fn fetch_page(
        &self,
        target_id: u64,
        cursor: Option<String>,
        cancel: &CancellationToken,
        fetched: usize,
    ) -> Result<Page, CollectError> {
        let platform = Arc::clone(&self.platform);
        self.request(cancel, fetched, move |session| {
            let platform = Arc::clone(&platform);
            let cursor = cursor.clone();
            async move {
                platform
                    .fetch_followers(&session, target_id, cursor.as_deref())
                    .await
            }
        })
        .await
    }

    /// One logical request: lease, call, release, and retry per error class.
    async fn request<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        fetched: usize,
        op: F,
    ) -> Result<T, CollectError>
    where
        F: Fn(SessionHandle) -> Fut,
        Fut: Future<Output = platform::Result<T>>,
    {
        let mut failures = 0u32;
        loop {
            let lease = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CollectError::Cancelled { fetched }),
                lease = self.rotator.acquire() => lease?,
            };

            let result = op(lease.session().clone()).await;
            let account = lease.username().to_string();
            let error = match result {
                Ok(value) => {
                    self.rotator.release(lease, RequestOutcome::Success).await?;
                    return Ok(value);
                }
                Err(err) => {
                    self.rotator
                        .release(lease, RequestOutcome::from_error(&err))
                        .await?;
                    err
                }
            };

            match error {
                err @ (PlatformError::RateLimited { .. } | PlatformError::Auth(_)) => {
                    debug!(account = %account, error = %err, "moving request to another account");
                }
                PlatformError::Transient(msg) => {
                    failures += 1;
                    if failures > self.max_retries {
                        return Err(CollectError::RetriesExhausted {
                            attempts: failures,
                            last: msg,
                        });
                    }
                    warn!(
                        account = %account,
                        attempt = failures,
                        max_retries = self.max_retries,
                        error = %msg,
                        "transient failure, retrying"
                    );
                }
                PlatformError::NotFound(msg) => return Err(CollectError::NotFound(msg)),
                PlatformError::Fatal(msg) => return Err(CollectError::Fatal(msg)),
            }
        }
    }
}

/// Followers of one target, fetched a page at a time.
///
/// Not restartable: a fresh `Collector::start` begins again from the first
/// page.
pub struct Collection<'a> {
    collector: &'a Collector,
    profile: TargetProfile,
    limit: Limit,
    cancel: CancellationToken,
    cursor: Option<String>,
    seen: HashSet<u64>,
    collected: Vec<Follower>,
    truncated: Option<Truncation>,
    pages: usize,
    done: bool,
}

impl Collection<'_> {
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Fetch the next page and return the followers it added.
    ///
    /// Returns `Ok(None)` once iteration has ended. Pool exhaustion ends
    /// iteration with the partial result flagged as truncated rather than
    /// failing.
    pub async fn next_page(&mut self) -> Result<Option<&[Follower]>, CollectError> {
        if self.done {
            return Ok(None);
        }
        if self.cancel.is_cancelled() {
            return Err(CollectError::Cancelled {
                fetched: self.collected.len(),
            });
        }
        if self.limit.reached(self.collected.len()) {
            self.done = true;
            return Ok(None);
        }

        let page = match self
            .collector
            .fetch_page(
                self.profile.id,
                self.cursor.clone(),
                &self.cancel,
                self.collected.len(),
            )
            .await
        {
            Ok(page) => page,
            Err(CollectError::PoolExhausted(counts)) => {
                warn!(
                    target = %self.profile.username,
                    fetched = self.collected.len(),
                    %counts,
                    "pool exhausted, keeping partial result"
                );
                self.truncated = Some(Truncation::PoolExhausted(counts));
                self.done = true;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        self.pages += 1;
        metrics::counter!("harvest_pages_total").increment(1);

        let start = self.collected.len();
        let empty = page.items.is_empty();
        let last = page.is_last();
        for follower in page.items {
            if self.limit.reached(self.collected.len()) {
                break;
            }
            if self.seen.insert(follower.id) {
                self.collected.push(follower);
            }
        }
        let added = self.collected.len() - start;
        metrics::counter!("harvest_followers_total").increment(added as u64);

        let next = page.next_cursor.filter(|c| !c.is_empty());
        if empty || last || next == self.cursor || self.limit.reached(self.collected.len()) {
            self.done = true;
        }
        self.cursor = next;

        info!(
            target = %self.profile.username,
            page = self.pages,
            fetched = self.collected.len(),
            limit = %self.limit,
            "page collected"
        );
        Ok(Some(&self.collected[start..]))
    }

    /// Consume the collection into its result.
    pub fn finish(self) -> Harvest {
        Harvest {
            profile: self.profile,
            requested: self.limit,
            followers: self.collected,
            truncated: self.truncated,
            pages: self.pages,
            fetched_at: Utc::now(),
        }
    }
}
