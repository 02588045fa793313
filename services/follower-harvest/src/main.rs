//! Follower Harvest
//!
//! Command-line front end that:
//! 1. Manages a pool of platform accounts in a local credential store
//! 2. Validates stored sessions and marks broken ones faulty
//! 3. Collects follower lists for a batch of targets, rotating accounts
//!    around rate limits
//! 4. Writes per-target JSON/CSV files and a run summary

mod accounts;
mod config;
mod error;
mod metrics;
mod run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use credential_store::CredentialStore;
use harvest::Limit;
use platform::{HttpPlatform, Platform};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, proxy_host};
use crate::run::RunOptions;

#[derive(Parser, Debug)]
#[command(
    name = "follower-harvest",
    about = "Collect follower lists with a rotating account pool",
    version
)]
struct Cli {
    /// Config file (default: follower-harvest.toml, or HARVEST_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Write Prometheus text exposition here when the command finishes
    #[arg(long, global = true, value_name = "PATH")]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage stored accounts
    #[command(subcommand)]
    Accounts(AccountsCommand),

    /// Collect followers for one or more targets
    Followers {
        /// Target usernames; a leading @ is ignored
        #[arg(required = true, value_name = "TARGET")]
        targets: Vec<String>,

        /// Maximum followers per target; 0 or negative means no limit
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        limit: i64,

        /// Add a run timestamp to every output file name
        #[arg(short, long)]
        timestamp: bool,

        /// Route requests through the configured proxy
        #[arg(short, long)]
        proxy: bool,

        /// Output directory (default: [harvest].output_dir)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum AccountsCommand {
    /// Add or replace one account, then validate the pool
    Add {
        username: String,

        /// Raw cookie header containing auth_token and ct0
        #[arg(long, conflicts_with_all = ["auth_token", "ct0"])]
        cookies: Option<String>,

        #[arg(long)]
        auth_token: Option<String>,

        #[arg(long)]
        ct0: Option<String>,
    },

    /// Import username:auth_token:ct0 lines, then validate the pool
    Import {
        #[arg(default_value = "accounts.txt", value_name = "FILE")]
        file: PathBuf,
    },

    /// Delete accounts from the store
    Remove {
        #[arg(required = true)]
        usernames: Vec<String>,
    },

    /// Show every stored account
    List,

    /// Validate every account that is not already active
    Activate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let prometheus = metrics::install_recorder()?;

    let source = Config::resolve_path(cli.config.as_deref());
    info!(path = %source.path.display(), explicit = source.explicit, "loading configuration");
    let config = Config::load(&source)
        .with_context(|| format!("failed to load config from {}", source.path.display()))?;

    let store = Arc::new(
        CredentialStore::load(config.store.path.clone())
            .await
            .with_context(|| {
                format!(
                    "failed to open credential store {}",
                    config.store.path.display()
                )
            })?,
    );
    info!(
        path = %store.path().display(),
        accounts = store.len().await,
        "credential store loaded"
    );

    match cli.command {
        Command::Accounts(command) => accounts_command(&config, &store, command).await?,
        Command::Followers {
            targets,
            limit,
            timestamp,
            proxy,
            out_dir,
        } => {
            let options = RunOptions {
                targets: run::normalize_targets(&targets)?,
                limit: Limit::from_requested(limit),
                timestamp,
                out_dir: out_dir.unwrap_or_else(|| config.harvest.output_dir.clone()),
            };
            let platform = build_platform(&config, proxy)?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                on_signal.cancel();
            });

            let report =
                run::run_followers(&config, Arc::clone(&store), platform, options, cancel).await?;
            for line in run::report_lines(&report) {
                println!("{line}");
            }
            println!();
            print!("{}", accounts::status_table(&store.list().await));
        }
    }

    if let Some(path) = &cli.metrics_file {
        metrics::write_textfile(&prometheus, path)?;
        info!(path = %path.display(), "metrics written");
    }
    Ok(())
}

async fn accounts_command(
    config: &Config,
    store: &Arc<CredentialStore>,
    command: AccountsCommand,
) -> Result<()> {
    let concurrency = config.pool.activation_concurrency;
    match command {
        AccountsCommand::Add {
            username,
            cookies,
            auth_token,
            ct0,
        } => {
            let tokens = accounts::tokens_from_args(
                cookies.as_deref(),
                auth_token.as_deref(),
                ct0.as_deref(),
            )?;
            let platform = build_platform(config, false)?;
            let report = accounts::add(store, platform, concurrency, &username, tokens).await?;
            println!("{}", accounts::activation_line(&report.activation));
            if let Some(profile) = &report.profile {
                println!("{}", accounts::profile_line(profile));
            }
        }
        AccountsCommand::Import { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let platform = build_platform(config, false)?;
            let report = accounts::import(store, platform, concurrency, &contents).await?;
            println!(
                "imported {} accounts from {}",
                report.added.len(),
                file.display()
            );
            for line in &report.skipped {
                println!("skipped line {}: {}", line.line_no, line.reason);
            }
            println!("{}", accounts::activation_line(&report.activation));
        }
        AccountsCommand::Remove { usernames } => {
            for (username, existed) in accounts::remove(store, &usernames).await? {
                if existed {
                    println!("removed {username}");
                } else {
                    println!("no account named {username}");
                }
            }
        }
        AccountsCommand::List => {}
        AccountsCommand::Activate => {
            let platform = build_platform(config, false)?;
            let report = account_pool::Activator::new(Arc::clone(store), platform, concurrency)
                .activate_all()
                .await
                .context("activation failed")?;
            for (username, reason) in &report.failed {
                println!("{username}: {reason}");
            }
            println!("{}", accounts::activation_line(&report));
        }
    }

    print!("{}", accounts::status_table(&store.list().await));
    Ok(())
}

fn build_platform(config: &Config, use_proxy: bool) -> Result<Arc<dyn Platform>> {
    let http = config.http_platform(use_proxy)?;
    match &http.proxy {
        Some(proxy) => info!(
            base_url = %http.base_url,
            proxy = %proxy_host(proxy.expose()),
            "using proxy"
        ),
        None if config.platform.proxy_url.is_some() => {
            warn!("proxy_url is configured but --proxy was not given; connecting directly")
        }
        None => {}
    }
    let platform = HttpPlatform::new(http).context("failed to build HTTP client")?;
    Ok(Arc::new(platform))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Wait for SIGTERM or SIGINT; the caller cancels the running batch.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("received SIGINT, cancelling run"),
        _ = terminate => warn!("received SIGTERM, cancelling run"),
    }
}
