//! Account management commands
//!
//! `add` and `import` write to the credential store and then run one
//! activation pass, so every command leaves the store with no `unchecked`
//! accounts it could reach.

use std::sync::Arc;

use account_pool::{ActivationReport, Activator};
use common::TokenBundle;
use credential_store::{Account, AccountStatus, CredentialStore, SkippedLine, parse_accounts_file};
use platform::{Platform, SessionHandle, TargetProfile};
use tracing::{info, warn};

/// Result of `accounts add`: the activation pass plus the account's own
/// profile when it came out active.
#[derive(Debug)]
pub struct AddReport {
    pub activation: ActivationReport,
    pub profile: Option<TargetProfile>,
}

/// Result of an import: what was added, what was skipped, how activation went.
#[derive(Debug)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub skipped: Vec<SkippedLine>,
    pub activation: ActivationReport,
}

/// Tokens for `accounts add`, from a cookie header or two explicit values.
pub fn tokens_from_args(
    cookies: Option<&str>,
    auth_token: Option<&str>,
    ct0: Option<&str>,
) -> crate::error::Result<TokenBundle> {
    match (cookies, auth_token, ct0) {
        (Some(header), _, _) => Ok(TokenBundle::from_cookie_header(header)?),
        (None, Some(auth_token), Some(ct0)) => Ok(TokenBundle::new(auth_token, ct0)?),
        _ => Err(crate::error::Error::TokensMissing),
    }
}

/// Replace any record for `username` with a fresh one, activate, then look
/// up the account's own profile as a final check.
pub async fn add(
    store: &Arc<CredentialStore>,
    platform: Arc<dyn Platform>,
    concurrency: usize,
    username: &str,
    tokens: TokenBundle,
) -> anyhow::Result<AddReport> {
    let username = username.trim().trim_start_matches('@');
    if store.remove(username).await?.is_some() {
        info!(account = %username, "replacing existing account");
    }
    store.add(Account::new(username, tokens)).await?;
    info!(account = %username, "account added");

    let activation = Activator::new(Arc::clone(store), Arc::clone(&platform), concurrency)
        .activate_all()
        .await?;

    let profile = match store.get(username).await {
        Some(account) if account.status == AccountStatus::Active => {
            let session = SessionHandle::resume(username, account.tokens);
            match platform.resolve_target(&session, username).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(account = %username, error = %e, "own profile lookup failed");
                    None
                }
            }
        }
        _ => None,
    };
    Ok(AddReport {
        activation,
        profile,
    })
}

/// Add every well-formed line of an accounts file, then activate.
pub async fn import(
    store: &Arc<CredentialStore>,
    platform: Arc<dyn Platform>,
    concurrency: usize,
    contents: &str,
) -> anyhow::Result<ImportReport> {
    let (lines, skipped) = parse_accounts_file(contents);
    for line in &skipped {
        warn!(line = line.line_no, reason = %line.reason, "skipping accounts file line");
    }

    let mut added = Vec::with_capacity(lines.len());
    for line in lines {
        let username = line.account.username.clone();
        store.add(line.account).await?;
        added.push(username);
    }
    info!(added = added.len(), skipped = skipped.len(), "accounts imported");

    let activation = Activator::new(Arc::clone(store), platform, concurrency)
        .activate_all()
        .await?;
    Ok(ImportReport {
        added,
        skipped,
        activation,
    })
}

/// Remove accounts; returns each username with whether it existed.
pub async fn remove(
    store: &CredentialStore,
    usernames: &[String],
) -> anyhow::Result<Vec<(String, bool)>> {
    let mut results = Vec::with_capacity(usernames.len());
    for username in usernames {
        let username = username.trim().trim_start_matches('@');
        let existed = store.remove(username).await?.is_some();
        if existed {
            info!(account = %username, "account removed");
        } else {
            warn!(account = %username, "no such account");
        }
        results.push((username.to_string(), existed));
    }
    Ok(results)
}

/// Render accounts as a fixed-width table.
pub fn status_table(accounts: &[Account]) -> String {
    const HEADERS: [&str; 5] = ["username", "status", "total requests", "last used", "last error"];

    let rows: Vec<[String; 5]> = accounts
        .iter()
        .map(|a| {
            [
                a.username.clone(),
                a.status.label().to_string(),
                a.total_requests.to_string(),
                a.last_used_at
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "never".into()),
                a.last_error.clone().unwrap_or_else(|| "none".into()),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_row = |cells: [&str; 5]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    };

    push_row(HEADERS);
    push_row(widths.map(|w| "-".repeat(w)).each_ref().map(String::as_str));
    for row in &rows {
        push_row(row.each_ref().map(String::as_str));
    }
    if rows.is_empty() {
        out.push_str("(no accounts)\n");
    }
    out
}

/// Profile summary printed after `accounts add`.
pub fn profile_line(profile: &TargetProfile) -> String {
    format!(
        "@{} ({}): {} followers, {} following, {} tweets",
        profile.username,
        profile.display_name,
        profile.followers_count,
        profile.following_count,
        profile.statuses_count
    )
}

/// One-line activation outcome for the terminal.
pub fn activation_line(report: &ActivationReport) -> String {
    format!(
        "activation: {} active, {} faulty, {} already active",
        report.activated.len(),
        report.failed.len(),
        report.skipped
    )
}
