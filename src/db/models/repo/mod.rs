use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::remote::RepoSummary;

pub mod manager;

/// Trait for managing newly created repositories.
#[async_trait]
pub trait Manager {
    /// Insert a repository unless `(login, full_name)` is already stored.
    /// Returns whether a new row was created.
    async fn insert_repo(&self, repo: &RepoRecord) -> Result<bool>;
    /// Repositories of all accounts created at or after `cutoff`, most recent first.
    async fn new_repos_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RepoRecord>>;
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Model for a repository created by a tracked account.
pub struct RepoRecord {
    /// Owning account.
    pub login: String,
    /// Short name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Description snapshot.
    pub description: Option<String>,
    /// Primary language snapshot.
    pub language: Option<String>,
    /// Stargazer count when first ingested.
    pub stars: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl RepoRecord {
    /// Record of `repo` owned by `login`.
    #[must_use]
    pub fn from_summary(login: &str, repo: RepoSummary) -> Self {
        Self {
            login: login.to_owned(),
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            language: repo.language,
            stars: repo.stars,
            created_at: repo.created_at,
        }
    }
}
