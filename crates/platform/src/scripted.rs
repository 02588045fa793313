//! Scripted in-memory platform
//!
//! Deterministic stand-in for the remote service: targets are registered with
//! a fixed follower list and page size, cursors are plain offsets, and errors
//! can be queued to fire on the next request. Every call is logged so tests
//! can assert which account served what.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{TimeZone, Utc};
use common::TokenBundle;

use crate::error::{PlatformError, Result};
use crate::model::{Follower, Page, SessionHandle, TargetProfile};
use crate::Platform;

/// Which platform operation a logged call was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Session,
    Resolve,
    Fetch,
}

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: CallKind,
    pub account: String,
    pub cursor: Option<String>,
}

struct ScriptedTarget {
    profile: TargetProfile,
    followers: Vec<Follower>,
    page_size: usize,
}

#[derive(Default)]
struct State {
    targets: Vec<ScriptedTarget>,
    /// Accounts whose sessions always fail with the stored error.
    rejected: HashMap<String, PlatformError>,
    /// One-shot failures consumed by the next resolve/fetch call.
    queued: VecDeque<PlatformError>,
    /// One-shot failures consumed by the next resolve/fetch on that account.
    queued_for: HashMap<String, VecDeque<PlatformError>>,
    /// One-shot failures for a specific page of a specific target.
    page_faults: HashMap<(u64, Option<String>), PlatformError>,
    calls: Vec<Call>,
}

/// In-memory `Platform` with deterministic paging.
#[derive(Default)]
pub struct ScriptedPlatform {
    state: Mutex<State>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target whose followers are served `page_size` at a time.
    pub fn add_target(&self, profile: TargetProfile, followers: Vec<Follower>, page_size: usize) {
        self.lock().targets.push(ScriptedTarget {
            profile,
            followers,
            page_size: page_size.max(1),
        });
    }

    /// Make every session attempt for `username` fail with `error`.
    pub fn reject_account(&self, username: &str, error: PlatformError) {
        self.lock().rejected.insert(username.to_string(), error);
    }

    /// Undo `reject_account`.
    pub fn accept_account(&self, username: &str) {
        self.lock().rejected.remove(username);
    }

    /// Fail the next resolve/fetch call, whichever account makes it.
    pub fn fail_next(&self, error: PlatformError) {
        self.lock().queued.push_back(error);
    }

    /// Fail the next resolve/fetch call made by `username`.
    pub fn fail_next_for(&self, username: &str, error: PlatformError) {
        self.lock()
            .queued_for
            .entry(username.to_string())
            .or_default()
            .push_back(error);
    }

    /// Fail the next fetch of `target_id`'s page at `cursor` (`None` = first page).
    pub fn fail_fetch(&self, target_id: u64, cursor: Option<&str>, error: PlatformError) {
        self.lock()
            .page_faults
            .insert((target_id, cursor.map(str::to_string)), error);
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Distinct accounts that made resolve/fetch calls, in first-use order.
    pub fn accounts_used(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        for call in self.lock().calls.iter() {
            if call.kind != CallKind::Session && !seen.contains(&call.account) {
                seen.push(call.account.clone());
            }
        }
        seen
    }

    /// Build a profile for `add_target`.
    pub fn profile(id: u64, username: &str, followers_count: u64) -> TargetProfile {
        TargetProfile {
            id,
            username: username.to_string(),
            display_name: format!("{username} (display)"),
            followers_count,
            following_count: 0,
            statuses_count: 0,
        }
    }

    /// `count` distinct followers with ids starting at `first_id`.
    pub fn sample_followers(first_id: u64, count: usize) -> Vec<Follower> {
        (0..count as u64)
            .map(|i| {
                let id = first_id + i;
                Follower {
                    id,
                    username: format!("follower_{id}"),
                    display_name: format!("Follower {id}"),
                    followers_count: id % 97,
                    following_count: id % 13,
                    statuses_count: id % 7,
                    verified: id % 5 == 0,
                    created_at: Utc.timestamp_opt(1_600_000_000 + id as i64, 0).single(),
                    description: format!("bio of {id}"),
                }
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_fault(state: &mut State, account: &str) -> Option<PlatformError> {
        if let Some(err) = state.queued_for.get_mut(account).and_then(VecDeque::pop_front) {
            return Some(err);
        }
        state.queued.pop_front()
    }
}

impl Platform for ScriptedPlatform {
    fn establish_session<'a>(
        &'a self,
        username: &'a str,
        tokens: &'a TokenBundle,
    ) -> Pin<Box<dyn Future<Output = Result<SessionHandle>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call {
                kind: CallKind::Session,
                account: username.to_string(),
                cursor: None,
            });
            if let Some(err) = state.rejected.get(username) {
                return Err(err.clone());
            }
            Ok(SessionHandle {
                username: username.to_string(),
                tokens: tokens.clone(),
            })
        })
    }

    fn resolve_target<'a>(
        &'a self,
        session: &'a SessionHandle,
        identifier: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TargetProfile>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call {
                kind: CallKind::Resolve,
                account: session.username.clone(),
                cursor: None,
            });
            if let Some(err) = Self::take_fault(&mut state, &session.username) {
                return Err(err);
            }
            let wanted = identifier.trim().trim_start_matches('@');
            state
                .targets
                .iter()
                .find(|t| {
                    t.profile.username.eq_ignore_ascii_case(wanted)
                        || t.profile.id.to_string() == wanted
                })
                .map(|t| t.profile.clone())
                .ok_or_else(|| PlatformError::NotFound(format!("user {wanted}")))
        })
    }

    fn fetch_followers<'a>(
        &'a self,
        session: &'a SessionHandle,
        target_id: u64,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<Page>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(Call {
                kind: CallKind::Fetch,
                account: session.username.clone(),
                cursor: cursor.map(str::to_string),
            });
            if let Some(err) = Self::take_fault(&mut state, &session.username) {
                return Err(err);
            }
            if let Some(err) = state
                .page_faults
                .remove(&(target_id, cursor.map(str::to_string)))
            {
                return Err(err);
            }
            let target = state
                .targets
                .iter()
                .find(|t| t.profile.id == target_id)
                .ok_or_else(|| PlatformError::NotFound(format!("user id {target_id}")))?;

            let offset = match cursor {
                None => 0,
                Some(c) => c
                    .parse::<usize>()
                    .map_err(|_| PlatformError::Fatal(format!("bad cursor {c}")))?,
            };
            let end = (offset + target.page_size).min(target.followers.len());
            let items = target.followers.get(offset..end).unwrap_or_default().to_vec();
            let next_cursor = (end < target.followers.len()).then(|| end.to_string());
            Ok(Page { items, next_cursor })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(username: &str) -> SessionHandle {
        SessionHandle {
            username: username.to_string(),
            tokens: TokenBundle::new("a", "c").unwrap(),
        }
    }

    #[tokio::test]
    async fn pages_through_followers_by_offset() {
        let platform = ScriptedPlatform::new();
        platform.add_target(
            ScriptedPlatform::profile(7, "alice", 5),
            ScriptedPlatform::sample_followers(100, 5),
            2,
        );
        let s = session("a1");

        let p1 = platform.fetch_followers(&s, 7, None).await.unwrap();
        assert_eq!(p1.items.len(), 2);
        assert_eq!(p1.next_cursor.as_deref(), Some("2"));

        let p3 = platform.fetch_followers(&s, 7, Some("4")).await.unwrap();
        assert_eq!(p3.items.len(), 1);
        assert_eq!(p3.items[0].id, 104);
        assert!(p3.is_last());
    }

    #[tokio::test]
    async fn queued_faults_fire_once() {
        let platform = ScriptedPlatform::new();
        platform.add_target(ScriptedPlatform::profile(7, "alice", 0), vec![], 10);
        platform.fail_next(PlatformError::Transient("reset".into()));
        let s = session("a1");

        assert!(platform.resolve_target(&s, "alice").await.is_err());
        let profile = platform.resolve_target(&s, "@Alice").await.unwrap();
        assert_eq!(profile.id, 7);
    }

    #[tokio::test]
    async fn per_account_faults_only_hit_that_account() {
        let platform = ScriptedPlatform::new();
        platform.add_target(ScriptedPlatform::profile(7, "alice", 0), vec![], 10);
        platform.fail_next_for("a2", PlatformError::RateLimited { retry_after: None });

        assert!(platform.resolve_target(&session("a1"), "7").await.is_ok());
        assert!(platform.resolve_target(&session("a2"), "7").await.is_err());
        assert_eq!(platform.accounts_used(), vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn page_faults_hit_only_that_page() {
        let platform = ScriptedPlatform::new();
        platform.add_target(
            ScriptedPlatform::profile(7, "alice", 4),
            ScriptedPlatform::sample_followers(1, 4),
            2,
        );
        platform.fail_fetch(7, Some("2"), PlatformError::Fatal("bad page".into()));
        let s = session("a1");

        assert!(platform.fetch_followers(&s, 7, None).await.is_ok());
        assert!(platform.fetch_followers(&s, 7, Some("2")).await.is_err());
        assert!(platform.fetch_followers(&s, 7, Some("2")).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_accounts_fail_sessions() {
        let platform = ScriptedPlatform::new();
        let tokens = TokenBundle::new("a", "c").unwrap();
        platform.reject_account("bad", PlatformError::Auth("expired".into()));

        assert!(platform.establish_session("bad", &tokens).await.is_err());
        assert!(platform.establish_session("good", &tokens).await.is_ok());

        platform.accept_account("bad");
        assert!(platform.establish_session("bad", &tokens).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let platform = ScriptedPlatform::new();
        let err = platform
            .resolve_target(&session("a1"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::NotFound(_)));
    }
}
