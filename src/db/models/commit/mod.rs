use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod manager;

/// Trait for managing ingested commits.
#[async_trait]
pub trait Manager {
    /// Insert a commit unless `(login, sha)` is already stored.
    /// Returns whether a new row was created.
    async fn insert_commit(&self, commit: &CommitRecord) -> Result<bool>;
    /// Commits of `login` at or after `cutoff`, most recent first.
    async fn commits_since(&self, login: &str, cutoff: DateTime<Utc>) -> Result<Vec<CommitRecord>>;
    /// Number of commits per account at or after `cutoff`.
    async fn commit_counts_by_account(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeMap<String, i64>>;
    /// The `limit` accounts with the most commits at or after `cutoff`.
    async fn top_active_accounts(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ActiveAccount>>;
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Model for a pushed commit.
///
/// Unique per `(login, sha)`: the same SHA pushed to two repositories is stored once.
pub struct CommitRecord {
    /// Account that pushed the commit.
    pub login: String,
    /// `owner/name` of the repository it was pushed to first.
    pub repo_name: String,
    /// Commit hash.
    pub sha: String,
    /// Commit message.
    pub message: String,
    /// Time of the push event.
    pub committed_at: DateTime<Utc>,
}

/// Commit activity of one account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ActiveAccount {
    /// Account login.
    pub login: String,
    /// Commits in the window.
    pub commit_count: i64,
    /// Distinct repositories touched, sorted.
    pub repos: Vec<String>,
}
