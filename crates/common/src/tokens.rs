//! Session token bundle
//!
//! An account authenticates with two browser cookies: `auth_token` (the
//! session itself) and `ct0` (the CSRF token, echoed back in a header).
//! Both are required; a bundle with either missing is rejected at parse time.

use serde::{Deserialize, Serialize};

use crate::secret::Secret;

/// Cookie name carrying the session token.
pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// Cookie name carrying the CSRF token.
pub const CSRF_COOKIE: &str = "ct0";

/// Why a token bundle could not be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("missing {0} cookie")]
    Missing(&'static str),

    #[error("malformed cookie pair: {0}")]
    Malformed(String),
}

/// Opaque session tokens for one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBundle {
    pub auth_token: Secret<String>,
    pub csrf_token: Secret<String>,
}

impl TokenBundle {
    /// Build a bundle from the two cookie values.
    pub fn new(auth_token: &str, csrf_token: &str) -> Result<Self, TokenError> {
        let auth_token = auth_token.trim();
        let csrf_token = csrf_token.trim();
        if auth_token.is_empty() {
            return Err(TokenError::Missing(AUTH_TOKEN_COOKIE));
        }
        if csrf_token.is_empty() {
            return Err(TokenError::Missing(CSRF_COOKIE));
        }
        Ok(Self {
            auth_token: Secret::new(auth_token.to_owned()),
            csrf_token: Secret::new(csrf_token.to_owned()),
        })
    }

    /// Parse a `Cookie`-style header: `auth_token=...; ct0=...`.
    ///
    /// Pair order does not matter and unrelated cookies are ignored.
    pub fn from_cookie_header(header: &str) -> Result<Self, TokenError> {
        let mut auth_token = None;
        let mut csrf_token = None;

        for pair in header.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| TokenError::Malformed(pair.to_owned()))?;
            match name.trim() {
                AUTH_TOKEN_COOKIE => auth_token = Some(value.trim()),
                CSRF_COOKIE => csrf_token = Some(value.trim()),
                _ => {}
            }
        }

        Self::new(
            auth_token.ok_or(TokenError::Missing(AUTH_TOKEN_COOKIE))?,
            csrf_token.ok_or(TokenError::Missing(CSRF_COOKIE))?,
        )
    }

    /// Render the bundle back into a `Cookie` header value.
    pub fn cookie_header(&self) -> Secret<String> {
        Secret::new(format!(
            "{AUTH_TOKEN_COOKIE}={}; {CSRF_COOKIE}={}",
            self.auth_token.expose(),
            self.csrf_token.expose()
        ))
    }
}
