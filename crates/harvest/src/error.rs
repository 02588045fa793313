//! Error types for collection and batch runs

use std::path::PathBuf;

use account_pool::PoolCounts;

/// Why a single target's collection ended without a result.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("target not found: {0}")]
    NotFound(String),

    /// No account could serve the target lookup.
    #[error("no usable account: {0}")]
    PoolExhausted(PoolCounts),

    #[error("giving up after {attempts} transient failures, last: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("unexpected response: {0}")]
    Fatal(String),

    #[error("cancelled after {fetched} followers")]
    Cancelled { fetched: usize },

    /// Credential store failure surfaced through the pool.
    #[error("account pool error: {0}")]
    Pool(account_pool::Error),
}

impl From<account_pool::Error> for CollectError {
    fn from(err: account_pool::Error) -> Self {
        match err {
            account_pool::Error::PoolExhausted(counts) => CollectError::PoolExhausted(counts),
            other => CollectError::Pool(other),
        }
    }
}

/// Failure to persist run output.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("encoding {what}: {source}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that abort a batch run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("credential store failure: {0}")]
    Store(#[from] account_pool::Error),

    #[error("writing run summary: {0}")]
    Summary(#[source] ArtifactError),
}
