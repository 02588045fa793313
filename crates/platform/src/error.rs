//! Error taxonomy for platform calls

use std::time::Duration;

/// Outcome classes of a failed platform call.
///
/// - `Auth` disables the account until the next activation pass
/// - `RateLimited` puts the account into cooldown; the request moves on
/// - `Transient` is retried a bounded number of times
/// - `NotFound` and `Fatal` end the current target
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unexpected response: {0}")]
    Fatal(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs()),
        None => String::new(),
    }
}

/// Result alias for platform calls.
pub type Result<T> = std::result::Result<T, PlatformError>;
