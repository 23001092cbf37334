use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::remote::StarredRepo;

pub mod manager;

/// Trait for managing stars.
#[async_trait]
pub trait Manager {
    /// Insert a star unless `(login, repo_full_name)` is already stored.
    /// Returns whether a new row was created.
    async fn insert_star(&self, star: &StarRecord) -> Result<bool>;
    /// Stars of all accounts at or after `cutoff`, most recent first.
    async fn stars_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StarRecord>>;
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Model for a repository starred by a tracked account.
pub struct StarRecord {
    /// Account that starred.
    pub login: String,
    /// `owner/name` of the starred repository.
    pub repo_full_name: String,
    /// Description snapshot.
    pub repo_description: Option<String>,
    /// Language snapshot.
    pub repo_language: Option<String>,
    /// Stargazer count snapshot.
    pub repo_stars: i64,
    /// When the star was given.
    pub starred_at: DateTime<Utc>,
}

impl StarRecord {
    /// Record of `starred` by `login`.
    #[must_use]
    pub fn from_starred(login: &str, starred: StarredRepo) -> Self {
        Self {
            login: login.to_owned(),
            repo_full_name: starred.repo.full_name,
            repo_description: starred.repo.description,
            repo_language: starred.repo.language,
            repo_stars: starred.repo.stars,
            starred_at: starred.starred_at,
        }
    }
}
