//! Platform abstraction for the social graph service
//!
//! Defines the `Platform` trait that decouples account rotation and follower
//! collection from the wire protocol. `HttpPlatform` talks to a JSON gateway
//! over reqwest; the `scripted` feature adds an in-memory double with
//! deterministic paging and injectable failures.
//!
//! Every call returns a `PlatformError` from the shared taxonomy so the layers
//! above can decide between cooldown, retry, disable, and give-up without
//! inspecting status codes themselves.

pub mod classify;
pub mod error;
pub mod http;
pub mod model;
#[cfg(feature = "scripted")]
pub mod scripted;

pub use classify::{classify_status, parse_retry_after};
pub use error::{PlatformError, Result};
pub use http::{HttpPlatform, HttpPlatformConfig};
pub use model::{Follower, Page, SessionHandle, TargetProfile};
#[cfg(feature = "scripted")]
pub use scripted::ScriptedPlatform;

use common::TokenBundle;
use std::future::Future;
use std::pin::Pin;

/// Abstraction over the remote service.
///
/// - `establish_session` validates an account's tokens and yields a handle
/// - `resolve_target` maps a handle or numeric id to a canonical profile
/// - `fetch_followers` returns one page of a target's followers
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Platform>`).
pub trait Platform: Send + Sync {
    /// Validate the account's tokens and open a session.
    ///
    /// `Auth` means the tokens are invalid or expired; anything else is a
    /// failure of the attempt, not of the credentials.
    fn establish_session<'a>(
        &'a self,
        username: &'a str,
        tokens: &'a TokenBundle,
    ) -> Pin<Box<dyn Future<Output = Result<SessionHandle>> + Send + 'a>>;

    /// Look up a target by handle (leading `@` tolerated) or numeric id.
    fn resolve_target<'a>(
        &'a self,
        session: &'a SessionHandle,
        identifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TargetProfile>> + Send + 'a>>;

    /// Fetch the page of followers after `cursor` (`None` = first page).
    ///
    /// A page with `next_cursor: None` is the last one.
    fn fetch_followers<'a>(
        &'a self,
        session: &'a SessionHandle,
        target_id: u64,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Page>> + Send + 'a>>;
}
