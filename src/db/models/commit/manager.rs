//! Manager for the commit model.
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ActiveAccount, CommitRecord};
use crate::db::DatabaseConnection;
use crate::error::Result;

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Insert a commit. The `UNIQUE (login, sha)` constraint decides, so two jobs racing on
    /// the same key still produce a single row.
    ///
    /// # Errors
    /// Errors if the commit cannot be inserted into the database.
    async fn insert_commit(&self, commit: &CommitRecord) -> Result<bool> {
        let statement = "
            INSERT INTO commits ( login, repo_name, sha, message, committed_at )
            VALUES ( $1, $2, $3, $4, $5 )
            ON CONFLICT ( login, sha ) DO NOTHING
        ";
        let result = sqlx::query(statement)
            .bind(&commit.login)
            .bind(&commit.repo_name)
            .bind(&commit.sha)
            .bind(&commit.message)
            .bind(commit.committed_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Commits of one account since `cutoff`.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn commits_since(&self, login: &str, cutoff: DateTime<Utc>) -> Result<Vec<CommitRecord>> {
        let statement = "
            SELECT c.login, c.repo_name, c.sha, c.message, c.committed_at
            FROM commits c
            WHERE c.login = $1 AND c.committed_at >= $2
            ORDER BY c.committed_at DESC, c.id DESC
        ";
        let rows = sqlx::query_as::<_, CommitRecord>(statement)
            .bind(login)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Commit count per account since `cutoff`.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn commit_counts_by_account(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<BTreeMap<String, i64>> {
        let statement = "
            SELECT c.login, COUNT(*)
            FROM commits c
            WHERE c.committed_at >= $1
            GROUP BY c.login
        ";
        let rows = sqlx::query_as::<_, (String, i64)>(statement)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    /// Most active accounts since `cutoff`; ties are broken by login.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn top_active_accounts(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ActiveAccount>> {
        // Repository full names never contain a comma, so the default separator is safe.
        let statement = "
            SELECT c.login, COUNT(*) AS commit_count, GROUP_CONCAT(DISTINCT c.repo_name) AS repos
            FROM commits c
            WHERE c.committed_at >= $1
            GROUP BY c.login
            ORDER BY commit_count DESC, c.login ASC
            LIMIT $2
        ";
        let rows = sqlx::query_as::<_, (String, i64, Option<String>)>(statement)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        let active = rows
            .into_iter()
            .map(|(login, commit_count, repos)| {
                let mut repos: Vec<String> = repos
                    .unwrap_or_default()
                    .split(',')
                    .filter(|repo| !repo.is_empty())
                    .map(str::to_owned)
                    .collect();
                repos.sort();
                ActiveAccount {
                    login,
                    commit_count,
                    repos,
                }
            })
            .collect();
        Ok(active)
    }
}
