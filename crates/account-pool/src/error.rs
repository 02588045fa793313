//! Error types for pool operations

use crate::rotator::PoolCounts;

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No account can ever serve the request: the pool is empty or every
    /// account is disabled.
    #[error("pool exhausted: {0}")]
    PoolExhausted(PoolCounts),

    #[error("credential store error: {0}")]
    Store(#[from] credential_store::Error),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
