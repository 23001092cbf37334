//! Running the CLI

// Allow exits because in this file we ideally handle all errors with known exit codes
#![allow(clippy::exit)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use chrono::{Duration, Utc};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Home, MAX_WINDOW_DAYS};
use crate::db::init::connect;
use crate::db::models::account::{Account, Manager as _};
use crate::db::models::commit::Manager as _;
use crate::db::models::digest::{DigestRecord, Manager as _};
use crate::db::models::repo::Manager as _;
use crate::db::models::star::Manager as _;
use crate::db::DatabaseConnection;
use crate::digest::{query_digest, window_start, DigestSnapshot};
use crate::ingest::Ingestor;
use crate::remote::client::GitHubClient;
use crate::remote::Remote;
use crate::summary::ollama::{OllamaClient, DEFAULT_TIMEOUT};
use crate::summary::Summarize as _;
use crate::utils::render;

/// ghpulse follows the public GitHub activity of the accounts you track
/// and condenses it into digests.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config.toml and the database. Defaults to $GHPULSE_HOME or ~/.ghpulse.
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    /// ghpulse cli subcommands
    #[command(subcommand)]
    subcommands: Subcommands,
}

///
#[derive(Clone, clap::Subcommand)]
enum Subcommands {
    /// Create the config file and the database
    Init {
        /// GitHub personal access token to store in the config.
        #[arg(long)]
        token: Option<String>,
    },
    /// Track every account the token's user follows
    Sync,
    /// Track an account
    Add {
        /// GitHub login.
        login: String,
    },
    /// Stop tracking an account and delete its activity
    Remove {
        /// GitHub login.
        login: String,
    },
    /// List tracked accounts
    Accounts,
    /// Fetch recent activity of all tracked accounts
    Fetch {
        /// Accounts fetched at once. Defaults to the configured value.
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Show a digest of recent activity
    Digest {
        /// Days to include. Defaults to the configured value.
        #[arg(short, long, value_parser = days_parser())]
        days: Option<u32>,
        /// Add an LLM-written summary.
        #[arg(long)]
        smart: bool,
        /// Reprint the most recently stored digest instead of building a new one.
        #[arg(long, conflicts_with_all = ["days", "smart"])]
        last: bool,
    },
    /// Show the recent activity of one account
    Show {
        /// GitHub login.
        login: String,
        /// Days to include. Defaults to the configured value.
        #[arg(short, long, value_parser = days_parser())]
        days: Option<u32>,
    },
}

/// Window lengths accepted by `--days`.
fn days_parser() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_DAYS))
}

///
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Main entrypoint to application
pub fn run() {
    init_tracing();
    tracing::debug!("Starting application");
    let cli = Cli::parse();
    if let Err(err) = execute(cli) {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

/// Run one subcommand to completion.
#[tokio::main]
async fn execute(cli: Cli) -> anyhow::Result<()> {
    let home = Home::resolve(cli.home)?;
    match cli.subcommands {
        Subcommands::Init { token } => init(&home, token).await,
        Subcommands::Sync => sync(&home).await,
        Subcommands::Add { login } => add(&home, &login).await,
        Subcommands::Remove { login } => remove(&home, &login).await,
        Subcommands::Accounts => {
            let (_, db) = open(&home).await?;
            print!("{}", render::accounts(&db.list_accounts().await?));
            Ok(())
        }
        Subcommands::Fetch { concurrency } => fetch(&home, concurrency).await,
        Subcommands::Digest { last: true, .. } => last_digest(&home).await,
        Subcommands::Digest { days, smart, .. } => digest(&home, days, smart).await,
        Subcommands::Show { login, days } => show(&home, &login, days).await,
    }
}

/// Load the config and connect to the store of an initialized home.
async fn open(home: &Home) -> anyhow::Result<(Config, DatabaseConnection)> {
    if !home.is_initialized() {
        bail!(
            "ghpulse is not initialized in {}; run `ghpulse init` first",
            home.root.display()
        );
    }
    let config = Config::load(&home.config_path())?;
    let db = connect(&home.db_path())
        .await
        .with_context(|| format!("failed to open database {}", home.db_path().display()))?;
    Ok((config, db))
}

/// Cancellation token fired by Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling");
            trigger.cancel();
        }
    });
    cancel
}

fn github(config: &Config, cancel: CancellationToken) -> anyhow::Result<GitHubClient> {
    let client = GitHubClient::new(&config.github.base_url, config.token(), config.timeout())?
        .with_cancellation(cancel);
    Ok(client)
}

async fn init(home: &Home, token: Option<String>) -> anyhow::Result<()> {
    if home.is_initialized() {
        println!("ghpulse is already initialized.");
        println!("Config: {}", home.config_path().display());
        println!("Database: {}", home.db_path().display());
        return Ok(());
    }
    let config = Config::default().with_token_override(token);
    config
        .save(&home.config_path())
        .context("failed to save config")?;
    println!("Created config: {}", home.config_path().display());
    connect(&home.db_path())
        .await
        .context("failed to create database")?;
    println!("Created database: {}", home.db_path().display());
    if config.token().is_none() {
        println!(
            "\nNo GitHub token set. Add one to the config or export GITHUB_TOKEN, \
             then run `ghpulse sync`."
        );
    } else {
        println!("\nRun `ghpulse sync` to import the accounts you follow.");
    }
    Ok(())
}

async fn sync(home: &Home) -> anyhow::Result<()> {
    let (config, db) = open(home).await?;
    config.require_token()?;
    let client = github(&config, interrupt_token())?;
    let following = client
        .list_following()
        .await
        .context("failed to list followed accounts")?;
    let mut added = 0_usize;
    for user in following {
        if db.add_account(&Account::from_profile(user)).await? {
            added += 1;
        }
    }
    let total = db.list_accounts().await?.len();
    println!("Added {added} accounts, tracking {total}.");
    Ok(())
}

async fn add(home: &Home, login: &str) -> anyhow::Result<()> {
    let (config, db) = open(home).await?;
    if db.account_exists(login).await? {
        println!("{login} is already tracked.");
        return Ok(());
    }
    let account = if config.token().is_some() {
        let client = github(&config, interrupt_token())?;
        match client.get_user(login).await {
            Ok(profile) => Account::from_profile(profile),
            Err(err) => {
                tracing::warn!("Could not fetch the profile of {login}: {err}");
                Account::new(login)
            }
        }
    } else {
        Account::new(login)
    };
    if db.add_account(&account).await? {
        println!("Now tracking {}.", account.login);
    } else {
        println!("{} is already tracked.", account.login);
    }
    Ok(())
}

async fn remove(home: &Home, login: &str) -> anyhow::Result<()> {
    let (_, db) = open(home).await?;
    if !db.remove_account(login).await? {
        bail!("{login} is not tracked");
    }
    println!("Stopped tracking {login}.");
    Ok(())
}

async fn fetch(home: &Home, concurrency: Option<usize>) -> anyhow::Result<()> {
    let (config, db) = open(home).await?;
    config.require_token()?;
    let logins: Vec<String> = db
        .list_accounts()
        .await?
        .into_iter()
        .map(|account| account.login)
        .collect();
    if logins.is_empty() {
        println!("No accounts tracked. Run `ghpulse sync` or `ghpulse add <login>`.");
        return Ok(());
    }
    let cancel = interrupt_token();
    let client = Arc::new(github(&config, cancel.clone())?);
    let remote: Arc<dyn Remote> = Arc::<GitHubClient>::clone(&client);
    println!("Fetching activity for {} accounts...\n", logins.len());
    let totals = Ingestor::new(remote, db)
        .with_cancellation(cancel)
        .run(logins, concurrency.unwrap_or(config.fetch.concurrency))
        .await
        .context("fetch aborted")?;
    print!(
        "{}",
        render::run_totals(&totals, client.remaining_quota(), client.quota_reset_at())
    );
    println!("Run `ghpulse digest` to see the summary.");
    Ok(())
}

async fn digest(home: &Home, days: Option<u32>, smart: bool) -> anyhow::Result<()> {
    let (config, db) = open(home).await?;
    let days = days.unwrap_or(config.digest.default_days);
    let view = query_digest(&db, Duration::days(i64::from(days))).await?;
    let tracked = db.list_accounts().await?.len();
    let snapshot = view.snapshot();

    let summary = if smart {
        let summarizer =
            OllamaClient::new(&config.llm.base_url, &config.llm.model, DEFAULT_TIMEOUT)?;
        match summarizer.summarize(&snapshot).await {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::warn!("LLM analysis unavailable: {err}");
                None
            }
        }
    } else {
        None
    };

    print!("{}", render::digest(&view, tracked, summary.as_deref()));
    let record = DigestRecord {
        period_start: view.since,
        period_end: view.until,
        content: serde_json::to_string(&snapshot)?,
        summary,
        created_at: Utc::now(),
    };
    db.insert_digest(&record).await?;
    Ok(())
}

async fn last_digest(home: &Home) -> anyhow::Result<()> {
    let (_, db) = open(home).await?;
    let Some(record) = db.latest_digest().await? else {
        println!("No digest stored yet. Run `ghpulse digest` first.");
        return Ok(());
    };
    let snapshot: DigestSnapshot = serde_json::from_str(&record.content)
        .context("stored digest is not a valid snapshot")?;
    print!(
        "{}",
        render::stored_digest(&snapshot, record.created_at, record.summary.as_deref())
    );
    Ok(())
}

async fn show(home: &Home, login: &str, days: Option<u32>) -> anyhow::Result<()> {
    let (config, db) = open(home).await?;
    let Some(account) = db.find_account(login).await? else {
        bail!("{login} is not tracked");
    };
    let days = days.unwrap_or(config.digest.default_days);
    let cutoff = window_start(Utc::now(), Duration::days(i64::from(days)))?;
    let commits = db.commits_since(login, cutoff).await?;
    let repos: Vec<_> = db
        .new_repos_since(cutoff)
        .await?
        .into_iter()
        .filter(|repo| repo.login == login)
        .collect();
    let stars: Vec<_> = db
        .stars_since(cutoff)
        .await?
        .into_iter()
        .filter(|star| star.login == login)
        .collect();
    print!(
        "{}",
        render::account_activity(&account, days, &commits, &repos, &stars)
    );
    Ok(())
}
