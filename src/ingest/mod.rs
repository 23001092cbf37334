//! Concurrent ingestion of tracked accounts' public activity.
//!
//! One job runs per account, at most `limit` at a time. A job fetches the account's
//! events, repositories and stars independently, persists them with idempotent inserts
//! and reports how many rows were new. Remote failures stay inside the job; storage
//! failures abort the whole run.
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::db::models::account::Manager as _;
use crate::db::models::commit::{CommitRecord, Manager as _};
use crate::db::models::repo::{Manager as _, RepoRecord};
use crate::db::models::star::{Manager as _, StarRecord};
use crate::db::DatabaseConnection;
use crate::error::{Error, Result};
use crate::remote::{Event, Remote};

/// Trailing window, in days, of repositories and stars persisted by a run.
pub const INGESTION_WINDOW_DAYS: i64 = 90;

/// Outcome of one account's ingestion job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountReport {
    /// Account login.
    pub login: String,
    /// Newly stored commits.
    pub commits: u64,
    /// Newly stored repositories.
    pub repos: u64,
    /// Newly stored stars.
    pub stars: u64,
    /// Sub-fetches (events, repositories, stars) that failed.
    pub failed_fetches: u32,
}

impl AccountReport {
    fn new(login: &str) -> Self {
        Self {
            login: login.to_owned(),
            ..Self::default()
        }
    }

    fn fetch_failed(&mut self, what: &str, err: &Error) {
        tracing::warn!(login = %self.login, "Failed to fetch {what}: {err}");
        self.failed_fetches += 1;
    }
}

/// Totals of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTotals {
    /// Newly stored commits across all accounts.
    pub commits: u64,
    /// Newly stored repositories across all accounts.
    pub repos: u64,
    /// Newly stored stars across all accounts.
    pub stars: u64,
    /// Per-account reports, ordered by login.
    pub accounts: Vec<AccountReport>,
}

impl RunTotals {
    /// Fold one account's report into the totals.
    pub fn record(&mut self, report: AccountReport) {
        self.commits += report.commits;
        self.repos += report.repos;
        self.stars += report.stars;
        self.accounts.push(report);
    }

    /// Number of accounts with at least one failed sub-fetch.
    #[must_use]
    pub fn partially_failed(&self) -> usize {
        self.accounts
            .iter()
            .filter(|report| report.failed_fetches > 0)
            .count()
    }
}

/// Runs ingestion jobs against a [`Remote`] and the activity store.
pub struct Ingestor {
    /// Remote platform.
    remote: Arc<dyn Remote>,
    /// Activity store.
    store: DatabaseConnection,
    /// Stops permit waits and outstanding jobs.
    cancel: CancellationToken,
}

impl Ingestor {
    /// Ingestor over `remote` writing into `store`.
    #[must_use]
    pub fn new(remote: Arc<dyn Remote>, store: DatabaseConnection) -> Self {
        Self {
            remote,
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the run when `cancel` fires.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ingest every account in `accounts`, running at most `limit` jobs at once.
    /// A `limit` of 0 is treated as 1.
    ///
    /// # Errors
    /// Errors with `Error::Storage` if the store fails, which aborts the remaining jobs,
    /// or with `Error::Cancelled` if the run was cancelled. Remote failures are counted
    /// per account and never fail the run.
    pub async fn run(&self, accounts: Vec<String>, limit: usize) -> Result<RunTotals> {
        let limit = limit.max(1);
        tracing::info!("Ingesting {} accounts, {limit} at a time", accounts.len());
        let semaphore = Arc::new(Semaphore::new(limit));
        let totals = Arc::new(Mutex::new(RunTotals::default()));
        let mut jobs: JoinSet<Result<()>> = JoinSet::new();

        for login in accounts {
            let semaphore = Arc::clone(&semaphore);
            let remote = Arc::clone(&self.remote);
            let store = self.store.clone();
            let totals = Arc::clone(&totals);
            let cancel = self.cancel.clone();
            jobs.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    permit = semaphore.acquire_owned() => permit.map_err(|_| Error::Cancelled)?,
                };
                let report = ingest_account(remote.as_ref(), &store, &login).await?;
                totals
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .record(report);
                Ok(())
            });
        }

        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break Err(Error::Cancelled),
                next = jobs.join_next() => next,
            };
            match next {
                None => break Ok(()),
                Some(Ok(Ok(()))) => {}
                Some(Ok(Err(err))) => break Err(err),
                Some(Err(join_err)) => {
                    if join_err.is_panic() {
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                }
            }
        };
        if let Err(err) = outcome {
            tracing::error!("Ingestion aborted: {err}");
            jobs.abort_all();
            while jobs.join_next().await.is_some() {}
            return Err(err);
        }

        let mut totals =
            std::mem::take(&mut *totals.lock().unwrap_or_else(PoisonError::into_inner));
        totals
            .accounts
            .sort_by(|left, right| left.login.cmp(&right.login));
        tracing::info!(
            "Ingested {} commits, {} repos, {} stars",
            totals.commits,
            totals.repos,
            totals.stars
        );
        Ok(totals)
    }
}

/// Fetch and persist one account's activity.
///
/// # Errors
/// Errors if the store fails or the quota wait is cancelled.
#[instrument(skip(remote, store))]
async fn ingest_account(
    remote: &dyn Remote,
    store: &DatabaseConnection,
    login: &str,
) -> Result<AccountReport> {
    remote.wait_for_quota().await?;
    let cutoff = Utc::now() - Duration::days(INGESTION_WINDOW_DAYS);
    let mut report = AccountReport::new(login);

    match remote.get_public_events(login).await {
        Ok(events) => report.commits = store_commits(store, login, &events).await?,
        Err(err) if err.is_remote() => report.fetch_failed("events", &err),
        Err(err) => return Err(err),
    }

    match remote.get_repositories(login).await {
        Ok(repos) => {
            for repo in repos.into_iter().filter(|repo| repo.created_at >= cutoff) {
                if store.insert_repo(&RepoRecord::from_summary(login, repo)).await? {
                    report.repos += 1;
                }
            }
        }
        Err(err) if err.is_remote() => report.fetch_failed("repositories", &err),
        Err(err) => return Err(err),
    }

    match remote.get_starred(login).await {
        Ok(starred) => {
            for star in starred.into_iter().filter(|star| star.starred_at >= cutoff) {
                if store.insert_star(&StarRecord::from_starred(login, star)).await? {
                    report.stars += 1;
                }
            }
        }
        Err(err) if err.is_remote() => report.fetch_failed("starred repositories", &err),
        Err(err) => return Err(err),
    }

    store.touch_last_fetched(login, Utc::now()).await?;
    tracing::debug!(
        "{login}: {} commits, {} repos, {} stars",
        report.commits,
        report.repos,
        report.stars
    );
    Ok(report)
}

/// Persist the commits of every push event; returns how many were new.
async fn store_commits(store: &DatabaseConnection, login: &str, events: &[Event]) -> Result<u64> {
    let mut inserted = 0;
    for event in events.iter().filter(|event| event.is_push()) {
        let commits = match event.push_commits() {
            Ok(commits) => commits,
            Err(err) => {
                tracing::debug!(login, repo = %event.repo.name, "Skipping push event: {err}");
                continue;
            }
        };
        for commit in commits {
            let record = CommitRecord {
                login: login.to_owned(),
                repo_name: event.repo.name.clone(),
                sha: commit.sha,
                message: commit.message,
                committed_at: event.created_at,
            };
            if store.insert_commit(&record).await? {
                inserted += 1;
            }
        }
    }
    Ok(inserted)
}
