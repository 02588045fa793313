//! Error types for credential store operations

/// Errors from credential store operations.
///
/// Every variant means the durable state could not be read or written;
/// callers treat these as fatal for the whole run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("credential file parse error: {0}")]
    Parse(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
