//! Rotator state machine and least-recently-used account selection
//!
//! The rotator holds per-account eligibility (Ready, CoolingDown, Disabled)
//! for the store's `active` accounts and leases them out one request at a
//! time. The credential store stays the single source of truth for tokens and
//! status; the rotator only adds transient cooldown bookkeeping.
//!
//! Cooldown transitions happen automatically: when a CoolingDown account is
//! checked and its cooldown has expired, it transitions back to Ready without
//! explicit action.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use credential_store::{AccountStatus, CredentialStore};
use platform::{PlatformError, SessionHandle};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cooldown::CooldownPolicy;
use crate::error::{Error, Result};

/// Rotation status of a pool account.
///
/// Transitions:
/// - Ready → CoolingDown (rate limited)
/// - Ready → Disabled (auth failure)
/// - CoolingDown → Ready (cooldown expired)
/// - Disabled → Ready (store reports the account active again on `sync`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Ready,
    CoolingDown { until: Instant },
    Disabled,
}

impl Eligibility {
    /// Status label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Eligibility::Ready => "ready",
            Eligibility::CoolingDown { .. } => "cooling_down",
            Eligibility::Disabled => "disabled",
        }
    }
}

/// How a leased request went, reported back through `release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The account served the request.
    Success,
    /// The platform throttled the account; `retry_after` is its hint.
    RateLimited { retry_after: Option<Duration> },
    /// The request failed for reasons unrelated to the account.
    Transient(String),
    /// The account's session is no longer valid.
    AuthFailed(String),
}

impl RequestOutcome {
    /// Map a platform error onto the account-level outcome.
    ///
    /// `NotFound` means the account served the request fine; `Fatal` is a
    /// protocol problem, not the account's fault.
    pub fn from_error(error: &PlatformError) -> Self {
        match error {
            PlatformError::Auth(msg) => RequestOutcome::AuthFailed(msg.clone()),
            PlatformError::RateLimited { retry_after } => RequestOutcome::RateLimited {
                retry_after: *retry_after,
            },
            PlatformError::Transient(msg) | PlatformError::Fatal(msg) => {
                RequestOutcome::Transient(msg.clone())
            }
            PlatformError::NotFound(_) => RequestOutcome::Success,
        }
    }

    /// Label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::RateLimited { .. } => "rate_limited",
            RequestOutcome::Transient(_) => "transient",
            RequestOutcome::AuthFailed(_) => "auth_failed",
        }
    }
}

/// An account checked out for exactly one request.
///
/// Every lease must be handed back with `Rotator::release`; the account stays
/// checked out until then.
#[must_use = "a lease must be returned with Rotator::release"]
#[derive(Debug)]
pub struct Lease {
    id: u64,
    username: String,
    session: SessionHandle,
}

impl Lease {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }
}

/// Snapshot of rotation state, carried by `PoolExhausted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounts {
    pub total: usize,
    pub ready: usize,
    pub cooling_down: usize,
    pub disabled: usize,
    pub checked_out: usize,
}

impl fmt::Display for PoolCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} accounts ({} ready, {} cooling down, {} disabled, {} checked out)",
            self.total, self.ready, self.cooling_down, self.disabled, self.checked_out
        )
    }
}

/// Used when a cooldown would run past the clock's range.
const FALLBACK_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

fn cooldown_until(now: Instant, cooldown: Duration) -> Instant {
    now.checked_add(cooldown)
        .or_else(|| now.checked_add(FALLBACK_COOLDOWN))
        .unwrap_or(now)
}

struct Slot {
    username: String,
    eligibility: Eligibility,
    checked_out: bool,
    last_acquired: Option<Instant>,
    /// Consecutive rate limits, reset by a successful request.
    strikes: u32,
}

impl Slot {
    fn new(username: String) -> Self {
        Self {
            username,
            eligibility: Eligibility::Ready,
            checked_out: false,
            last_acquired: None,
            strikes: 0,
        }
    }
}

enum Pick {
    Slot(usize),
    /// Nothing free right now; the earliest cooldown expiry, if any.
    Wait(Option<Instant>),
    Exhausted,
}

#[derive(Default)]
struct RotatorState {
    slots: Vec<Slot>,
    next_index: usize,
    next_lease: u64,
}

impl RotatorState {
    /// Choose the least-recently-used free account, breaking ties by
    /// round-robin distance from `next_index`.
    ///
    /// Round-robin positions are unique, so they only order accounts that
    /// have never been used (or were used at the same instant). When every
    /// account is free this yields plain rotation order; an account coming
    /// back from a cooldown is served before the rotation cursor.
    fn pick(&mut self, now: Instant) -> Pick {
        let n = self.slots.len();
        let start = if n == 0 { 0 } else { self.next_index % n };
        let mut best: Option<(Option<Instant>, usize, usize)> = None;
        let mut next_ready_at: Option<Instant> = None;
        let mut any_live = false;

        for (idx, slot) in self.slots.iter_mut().enumerate() {
            if let Eligibility::CoolingDown { until } = slot.eligibility {
                if now >= until {
                    info!(account = %slot.username, "cooldown expired, account available again");
                    slot.eligibility = Eligibility::Ready;
                }
            }

            match slot.eligibility {
                Eligibility::Disabled => continue,
                Eligibility::CoolingDown { until } => {
                    any_live = true;
                    next_ready_at = Some(next_ready_at.map_or(until, |t| t.min(until)));
                    continue;
                }
                Eligibility::Ready => {
                    any_live = true;
                    if slot.checked_out {
                        continue;
                    }
                }
            }

            let key = (slot.last_acquired, (idx + n - start) % n, idx);
            if best.is_none_or(|b| key < b) {
                best = Some(key);
            }
        }

        match best {
            Some((_, _, idx)) => Pick::Slot(idx),
            None if any_live => Pick::Wait(next_ready_at),
            None => Pick::Exhausted,
        }
    }

    fn reserve(&mut self, idx: usize, now: Instant) -> (u64, String) {
        let n = self.slots.len();
        self.next_index = (idx + 1) % n;
        self.next_lease += 1;
        let slot = &mut self.slots[idx];
        slot.checked_out = true;
        slot.last_acquired = Some(now);
        (self.next_lease, slot.username.clone())
    }

    fn slot_mut(&mut self, username: &str) -> Option<&mut Slot> {
        self.slots.iter_mut().find(|s| s.username == username)
    }

    fn counts(&self, now: Instant) -> PoolCounts {
        let mut counts = PoolCounts {
            total: self.slots.len(),
            ..Default::default()
        };
        for slot in &self.slots {
            match slot.eligibility {
                Eligibility::Ready => counts.ready += 1,
                Eligibility::CoolingDown { until } if now >= until => counts.ready += 1,
                Eligibility::CoolingDown { .. } => counts.cooling_down += 1,
                Eligibility::Disabled => counts.disabled += 1,
            }
            if slot.checked_out {
                counts.checked_out += 1;
            }
        }
        counts
    }
}

/// Store write implied by a release.
enum StoreUpdate {
    Request(Option<String>),
    MarkFaulty(String),
}

/// Leases active accounts for outbound requests.
///
/// Safe to share across tasks (`Arc<Rotator>`); a tokio `Mutex` guards the
/// slot table and a `Notify` wakes waiting `acquire` calls on every release.
pub struct Rotator {
    store: Arc<CredentialStore>,
    policy: CooldownPolicy,
    state: Mutex<RotatorState>,
    released: Notify,
}

impl Rotator {
    /// Create a rotator over the store's currently `active` accounts.
    pub async fn new(store: Arc<CredentialStore>, policy: CooldownPolicy) -> Self {
        let rotator = Self {
            store,
            policy,
            state: Mutex::new(RotatorState::default()),
            released: Notify::new(),
        };
        rotator.sync().await;
        rotator
    }

    /// Re-read the store's `active` accounts.
    ///
    /// Known accounts keep their cooldown state; accounts the rotator had
    /// disabled but the store reports active again (after an activation
    /// pass) return to Ready. Accounts no longer active leave rotation.
    pub async fn sync(&self) {
        let active = self.store.active().await;
        let mut state = self.state.lock().await;
        let mut previous = std::mem::take(&mut state.slots);

        for account in active {
            let slot = match previous.iter().position(|s| s.username == account.username) {
                Some(pos) => {
                    let mut slot = previous.swap_remove(pos);
                    if slot.eligibility == Eligibility::Disabled {
                        slot.eligibility = Eligibility::Ready;
                        slot.strikes = 0;
                    }
                    slot
                }
                None => Slot::new(account.username),
            };
            state.slots.push(slot);
        }

        for dropped in &previous {
            debug!(account = %dropped.username, "account left rotation");
        }
        if !state.slots.is_empty() {
            state.next_index %= state.slots.len();
        }
        info!(accounts = state.slots.len(), "rotator synced with store");
    }

    /// Lease the next eligible account.
    ///
    /// Waits while every live account is cooling down or checked out. Fails
    /// with `PoolExhausted` only when no account can ever become eligible:
    /// the pool is empty or every account is disabled.
    pub async fn acquire(&self) -> Result<Lease> {
        loop {
            let released = self.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();

            let mut state = self.state.lock().await;
            let now = Instant::now();
            let idx = match state.pick(now) {
                Pick::Slot(idx) => idx,
                Pick::Exhausted => {
                    let counts = state.counts(now);
                    warn!(%counts, "no eligible account in pool");
                    return Err(Error::PoolExhausted(counts));
                }
                Pick::Wait(next_ready_at) => {
                    drop(state);
                    match next_ready_at {
                        Some(until) => {
                            debug!(
                                wait_ms = until.saturating_duration_since(now).as_millis() as u64,
                                "all accounts busy or cooling down, waiting"
                            );
                            tokio::select! {
                                _ = &mut released => {}
                                _ = tokio::time::sleep_until(until) => {}
                            }
                        }
                        None => released.await,
                    }
                    continue;
                }
            };

            // Tokens are read before the slot is reserved, so dropping this
            // future at any await point never leaves a slot checked out.
            let username = state.slots[idx].username.clone();
            let Some(account) = self.store.get(&username).await else {
                warn!(account = %username, "account missing from store, dropping from rotation");
                state.slots[idx].eligibility = Eligibility::Disabled;
                continue;
            };
            let (id, username) = state.reserve(idx, now);
            drop(state);

            metrics::counter!("harvest_pool_acquisitions_total").increment(1);
            debug!(account = %username, lease = id, "account acquired");
            return Ok(Lease {
                id,
                session: SessionHandle::resume(username.clone(), account.tokens),
                username,
            });
        }
    }

    /// Return a lease with the outcome of its request.
    ///
    /// - `Success` clears the account's rate-limit strikes
    /// - `RateLimited` starts a cooldown (platform hint, else exponential backoff)
    /// - `Transient` only records the diagnostic
    /// - `AuthFailed` disables the account and marks it `faulty` in the store
    ///
    /// Every outcome counts as one request in the store. Only store I/O
    /// errors are returned.
    pub async fn release(&self, lease: Lease, outcome: RequestOutcome) -> Result<()> {
        let Lease { id, username, .. } = lease;
        let update = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = state.slot_mut(&username);
            if slot.is_none() {
                debug!(
                    account = %username,
                    lease = id,
                    "released account is no longer in rotation"
                );
            }

            match &outcome {
                RequestOutcome::Success => {
                    if let Some(slot) = slot {
                        slot.checked_out = false;
                        slot.strikes = 0;
                    }
                    StoreUpdate::Request(None)
                }
                RequestOutcome::RateLimited { retry_after } => {
                    if let Some(slot) = slot {
                        let cooldown = self.policy.cooldown(slot.strikes, *retry_after);
                        slot.checked_out = false;
                        slot.strikes = slot.strikes.saturating_add(1);
                        slot.eligibility = Eligibility::CoolingDown {
                            until: cooldown_until(now, cooldown),
                        };
                        info!(
                            account = %username,
                            cooldown_secs = cooldown.as_secs(),
                            strikes = slot.strikes,
                            "account entering cooldown (rate limited)"
                        );
                    }
                    StoreUpdate::Request(Some("rate limited".into()))
                }
                RequestOutcome::Transient(msg) => {
                    if let Some(slot) = slot {
                        slot.checked_out = false;
                    }
                    debug!(account = %username, error = %msg, "transient error, no pool action");
                    StoreUpdate::Request(Some(msg.clone()))
                }
                RequestOutcome::AuthFailed(msg) => {
                    if let Some(slot) = slot {
                        slot.checked_out = false;
                        slot.eligibility = Eligibility::Disabled;
                    }
                    warn!(account = %username, error = %msg, "account disabled (auth failure)");
                    StoreUpdate::MarkFaulty(msg.clone())
                }
            }
        };
        self.released.notify_waiters();
        metrics::counter!("harvest_pool_releases_total", "outcome" => outcome.label())
            .increment(1);

        match update {
            StoreUpdate::Request(error) => {
                self.store.record_request(&username, error).await?;
            }
            StoreUpdate::MarkFaulty(msg) => {
                self.store
                    .record_request(&username, Some(msg.clone()))
                    .await?;
                self.store
                    .set_status(&username, AccountStatus::Faulty, Some(msg))
                    .await?;
            }
        }
        Ok(())
    }

    /// Current rotation counts.
    pub async fn counts(&self) -> PoolCounts {
        self.state.lock().await.counts(Instant::now())
    }

    /// Number of leases handed out and not yet released.
    pub async fn outstanding(&self) -> usize {
        self.counts().await.checked_out
    }

    /// Per-account eligibility, in rotation order.
    pub async fn eligibility(&self) -> Vec<(String, Eligibility)> {
        let state = self.state.lock().await;
        state
            .slots
            .iter()
            .map(|s| (s.username.clone(), s.eligibility))
            .collect()
    }
}
