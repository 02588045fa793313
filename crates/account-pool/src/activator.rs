//! Session activation for stored accounts
//!
//! Validates every `unchecked` or `faulty` account against the platform and
//! records the result in the store. Checks run concurrently (bounded by a
//! semaphore) but all store writes happen on the joining task, one account at
//! a time. A failing account is recorded, never propagated: one bad
//! credential must not block the rest of the pool.

use std::collections::HashMap;
use std::sync::Arc;

use credential_store::{AccountStatus, CredentialStore};
use platform::Platform;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Outcome of one activation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Accounts that are now `active`, in store order.
    pub activated: Vec<String>,
    /// Accounts that are now `faulty`, with the diagnostic, in store order.
    pub failed: Vec<(String, String)>,
    /// Accounts that were already `active` and were not checked.
    pub skipped: usize,
}

/// Validates stored credentials against the platform.
pub struct Activator {
    store: Arc<CredentialStore>,
    platform: Arc<dyn Platform>,
    concurrency: usize,
}

impl Activator {
    /// `concurrency` bounds simultaneous session checks (minimum 1).
    pub fn new(
        store: Arc<CredentialStore>,
        platform: Arc<dyn Platform>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            platform,
            concurrency: concurrency.max(1),
        }
    }

    /// Activate every `unchecked` or `faulty` account.
    ///
    /// On success the account becomes `active` with `last_error` cleared; on
    /// any failure it becomes `faulty` with a short diagnostic. Afterwards no
    /// account that was checked is left `unchecked`. Only store I/O errors are
    /// returned.
    pub async fn activate_all(&self) -> Result<ActivationReport> {
        let accounts = self.store.list().await;
        let order: HashMap<String, usize> = accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.username.clone(), i))
            .collect();
        let (candidates, active): (Vec<_>, Vec<_>) = accounts
            .into_iter()
            .partition(|a| a.status.needs_activation());

        let mut report = ActivationReport {
            skipped: active.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            debug!(skipped = report.skipped, "no accounts need activation");
            return Ok(report);
        }

        info!(
            accounts = candidates.len(),
            concurrency = self.concurrency,
            "activating accounts"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut task_owner = HashMap::new();

        for account in candidates {
            let platform = Arc::clone(&self.platform);
            let semaphore = Arc::clone(&semaphore);
            let username = account.username.clone();
            let handle = tasks.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail.
                let _permit = semaphore.acquire_owned().await.ok();
                platform
                    .establish_session(&account.username, &account.tokens)
                    .await
                    .map(|_| ())
            });
            task_owner.insert(handle.id(), username);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let (username, outcome) = match joined {
                Ok((id, result)) => (task_owner.remove(&id), result.map_err(|e| e.to_string())),
                Err(e) => (
                    task_owner.remove(&e.id()),
                    Err(format!("activation task failed: {e}")),
                ),
            };
            let Some(username) = username else {
                continue;
            };

            match outcome {
                Ok(()) => {
                    self.store
                        .set_status(&username, AccountStatus::Active, None)
                        .await?;
                    info!(account = %username, "account activated");
                    report.activated.push(username);
                }
                Err(msg) => {
                    self.store
                        .set_status(&username, AccountStatus::Faulty, Some(msg.clone()))
                        .await?;
                    warn!(account = %username, error = %msg, "account activation failed");
                    report.failed.push((username, msg));
                }
            }
        }

        let position = |name: &String| order.get(name).copied().unwrap_or(usize::MAX);
        report.activated.sort_by_key(|name| position(name));
        report.failed.sort_by_key(|(name, _)| position(name));

        info!(
            activated = report.activated.len(),
            failed = report.failed.len(),
            skipped = report.skipped,
            "activation pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::TokenBundle;
    use credential_store::Account;
    use platform::{PlatformError, ScriptedPlatform};

    async fn test_store(
        dir: &tempfile::TempDir,
        accounts: &[(&str, AccountStatus)],
    ) -> Arc<CredentialStore> {
        let store = CredentialStore::load(dir.path().join("accounts.json"))
            .await
            .unwrap();
        for (name, status) in accounts {
            store
                .add(Account::new(
                    *name,
                    TokenBundle::new(&format!("at_{name}"), &format!("ct_{name}")).unwrap(),
                ))
                .await
                .unwrap();
            store.set_status(name, *status, None).await.unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn activates_good_and_records_bad_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(
            &dir,
            &[
                ("a1", AccountStatus::Unchecked),
                ("a2", AccountStatus::Unchecked),
                ("a3", AccountStatus::Faulty),
            ],
        )
        .await;
        let platform = Arc::new(ScriptedPlatform::new());
        platform.reject_account("a2", PlatformError::Auth("cookie expired".into()));

        let activator = Activator::new(store.clone(), platform, 2);
        let report = activator.activate_all().await.unwrap();

        assert_eq!(report.activated, vec!["a1", "a3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a2");
        assert!(report.failed[0].1.contains("cookie expired"));

        assert_eq!(store.get("a1").await.unwrap().status, AccountStatus::Active);
        let a2 = store.get("a2").await.unwrap();
        assert_eq!(a2.status, AccountStatus::Faulty);
        assert!(a2.last_error.unwrap().contains("cookie expired"));
        let a3 = store.get("a3").await.unwrap();
        assert_eq!(a3.status, AccountStatus::Active);
        assert!(a3.last_error.is_none());
    }

    #[tokio::test]
    async fn no_account_left_unchecked() {
        let dir = tempfile::tempdir().unwrap();
        let names: Vec<String> = (0..12).map(|i| format!("acct-{i}")).collect();
        let accounts: Vec<(&str, AccountStatus)> = names
            .iter()
            .map(|n| (n.as_str(), AccountStatus::Unchecked))
            .collect();
        let store = test_store(&dir, &accounts).await;
        let platform = Arc::new(ScriptedPlatform::new());
        for name in names.iter().step_by(3) {
            platform.reject_account(name, PlatformError::Transient("timeout".into()));
        }

        Activator::new(store.clone(), platform, 4)
            .activate_all()
            .await
            .unwrap();

        let counts = store.counts().await;
        assert_eq!(counts.unchecked, 0);
        assert_eq!(counts.faulty, 4);
        assert_eq!(counts.active, 8);
    }

    #[tokio::test]
    async fn active_accounts_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(
            &dir,
            &[("a1", AccountStatus::Active), ("a2", AccountStatus::Unchecked)],
        )
        .await;
        let platform = Arc::new(ScriptedPlatform::new());

        let report = Activator::new(store, platform.clone(), 1)
            .activate_all()
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.activated, vec!["a2"]);
        let checked: Vec<String> = platform.calls().into_iter().map(|c| c.account).collect();
        assert_eq!(checked, vec!["a2"]);
    }

    #[tokio::test]
    async fn empty_store_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir, &[]).await;
        let report = Activator::new(store, Arc::new(ScriptedPlatform::new()), 4)
            .activate_all()
            .await
            .unwrap();
        assert_eq!(report, ActivationReport::default());
    }
}
