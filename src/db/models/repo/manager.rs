//! Manager for the repository model.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::RepoRecord;
use crate::db::DatabaseConnection;
use crate::error::Result;

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Insert a repository, ignoring duplicates.
    ///
    /// # Errors
    /// Errors if the repository cannot be inserted into the database.
    async fn insert_repo(&self, repo: &RepoRecord) -> Result<bool> {
        let statement = "
            INSERT INTO repos ( login, name, full_name, description, language, stars, created_at )
            VALUES ( $1, $2, $3, $4, $5, $6, $7 )
            ON CONFLICT ( login, full_name ) DO NOTHING
        ";
        let result = sqlx::query(statement)
            .bind(&repo.login)
            .bind(&repo.name)
            .bind(&repo.full_name)
            .bind(&repo.description)
            .bind(&repo.language)
            .bind(repo.stars)
            .bind(repo.created_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Repositories created since `cutoff`.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn new_repos_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RepoRecord>> {
        let statement = "
            SELECT r.login, r.name, r.full_name, r.description, r.language, r.stars, r.created_at
            FROM repos r
            WHERE r.created_at >= $1
            ORDER BY r.created_at DESC, r.id DESC
        ";
        let rows = sqlx::query_as::<_, RepoRecord>(statement)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
