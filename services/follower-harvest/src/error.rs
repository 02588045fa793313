//! Service-specific error types

use thiserror::Error;

/// Command-line usage errors that are not configuration file problems.
///
/// Per-target and per-account failures never surface here; they end up in
/// run summaries and the account table.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no base_url configured: set [platform].base_url or HARVEST_BASE_URL")]
    BaseUrlMissing,

    #[error("--proxy given but no proxy_url configured: set [platform].proxy_url or HARVEST_PROXY")]
    ProxyNotConfigured,

    #[error("provide either --cookies or both --auth-token and --ct0")]
    TokensMissing,

    #[error("invalid session tokens: {0}")]
    InvalidTokens(#[from] common::TokenError),

    #[error("no usable target names given")]
    NoTargets,
}

/// Result alias using service Error
pub type Result<T> = std::result::Result<T, Error>;
