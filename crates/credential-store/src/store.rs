//! Credential file storage
//!
//! Manages a JSON array of `Account` records in insertion order. All writes
//! use atomic temp-file + rename to prevent corruption on crash. A tokio Mutex
//! serializes every mutation, so activation tasks and the rotator never
//! interleave writes to the same record.
//!
//! The file is the single source of truth for account status; the rotator
//! keeps only transient cooldown state on top of it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::account::{Account, AccountStatus, StatusCounts};
use crate::error::{Error, Result};

/// Thread-safe credential file manager.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<Vec<Account>>,
}

impl CredentialStore {
    /// Load accounts from the given file path.
    ///
    /// If the file doesn't exist, creates it as `[]` (cold start with zero
    /// accounts).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let accounts: Vec<Account> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), accounts = accounts.len(), "loaded accounts");
            accounts
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            let accounts = Vec::new();
            write_atomic(&path, &accounts).await?;
            accounts
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a clone of a specific account.
    pub async fn get(&self, username: &str) -> Option<Account> {
        let state = self.state.lock().await;
        state.iter().find(|a| a.username == username).cloned()
    }

    /// All accounts in insertion order.
    pub async fn list(&self) -> Vec<Account> {
        self.state.lock().await.clone()
    }

    /// Accounts currently marked `active`, in insertion order.
    pub async fn active(&self) -> Vec<Account> {
        let state = self.state.lock().await;
        state
            .iter()
            .filter(|a| a.status == AccountStatus::Active)
            .cloned()
            .collect()
    }

    /// Per-status counts.
    pub async fn counts(&self) -> StatusCounts {
        let state = self.state.lock().await;
        state.iter().collect()
    }

    /// Add an account, replacing any record with the same username, and persist.
    ///
    /// A replaced record is removed first, so the new one lands at the end of
    /// insertion order. Returns the replaced record, if any.
    pub async fn add(&self, account: Account) -> Result<Option<Account>> {
        let mut state = self.state.lock().await;
        let replaced = take(&mut state, &account.username);
        debug!(
            account = %account.username,
            replaced = replaced.is_some(),
            "added account"
        );
        state.push(account);
        write_atomic(&self.path, &state).await?;
        Ok(replaced)
    }

    /// Remove an account and persist to disk.
    ///
    /// Returns the removed record if it existed; removing an unknown
    /// username is a no-op.
    pub async fn remove(&self, username: &str) -> Result<Option<Account>> {
        let mut state = self.state.lock().await;
        let removed = take(&mut state, username);
        if removed.is_some() {
            debug!(account = username, "removed account");
            write_atomic(&self.path, &state).await?;
        }
        Ok(removed)
    }

    /// Set an account's status and last error, and persist.
    ///
    /// Returns `false` if the account no longer exists.
    pub async fn set_status(
        &self,
        username: &str,
        status: AccountStatus,
        last_error: Option<String>,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(account) = state.iter_mut().find(|a| a.username == username) else {
            return Ok(false);
        };
        account.status = status;
        account.last_error = last_error;
        debug!(account = username, status = status.label(), "updated status");
        write_atomic(&self.path, &state).await?;
        Ok(true)
    }

    /// Count one serviced request against an account, and persist.
    ///
    /// `error` is recorded as `last_error` when present; a successful request
    /// leaves the previous diagnostic in place. Returns `false` if the account
    /// no longer exists.
    pub async fn record_request(&self, username: &str, error: Option<String>) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(account) = state.iter_mut().find(|a| a.username == username) else {
            return Ok(false);
        };
        account.total_requests += 1;
        account.last_used_at = Some(Utc::now());
        if error.is_some() {
            account.last_error = error;
        }
        write_atomic(&self.path, &state).await?;
        Ok(true)
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn take(accounts: &mut Vec<Account>, username: &str) -> Option<Account> {
    let idx = accounts.iter().position(|a| a.username == username)?;
    Some(accounts.remove(idx))
}

/// Write accounts to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains session cookies.
async fn write_atomic(path: &Path, data: &[Account]) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing accounts: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(Error::Io("credential path has no parent directory".into())),
    };

    let tmp_path = dir.join(format!(".accounts.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted accounts");
    Ok(())
}
