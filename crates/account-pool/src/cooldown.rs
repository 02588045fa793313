//! Cooldown policy for rate-limited accounts
//!
//! A platform hint (`retry-after` / rate-limit reset) is used as-is up to
//! `max_hint`. Without
//! a hint the cooldown grows exponentially with consecutive rate limits on
//! the same account, starting at `base` and capped at `max`, with optional
//! random jitter so a pool that was throttled together does not wake
//! together.

use std::time::Duration;

use rand::RngExt;

/// Cooldown windows applied by the rotator.
#[derive(Debug, Clone, PartialEq)]
pub struct CooldownPolicy {
    /// Cooldown after the first rate limit without a hint.
    pub base: Duration,
    /// Upper bound for hint-less cooldowns.
    pub max: Duration,
    /// Extra random fraction (0.0..=1.0) added to hint-less cooldowns.
    pub jitter: f64,
    /// Upper bound for platform hints.
    pub max_hint: Duration,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(30),
            max: Duration::from_secs(15 * 60),
            jitter: 0.1,
            max_hint: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CooldownPolicy {
    /// Cooldown for an account that has been rate limited `strikes` times in
    /// a row before this one.
    pub fn cooldown(&self, strikes: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return hint.min(self.max_hint);
        }
        let backoff = self.backoff(strikes);
        if self.jitter <= 0.0 {
            return backoff;
        }
        let extra = rand::rng().random_range(0.0..=self.jitter.min(1.0));
        backoff.mul_f64(1.0 + extra).min(self.max)
    }

    /// Deterministic part of the cooldown: `base * 2^strikes`, capped at `max`.
    pub fn backoff(&self, strikes: u32) -> Duration {
        let factor = 2u32.saturating_pow(strikes);
        self.base.saturating_mul(factor).min(self.max)
    }
}
