//! Manager for the star model.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::StarRecord;
use crate::db::DatabaseConnection;
use crate::error::Result;

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Insert a star, ignoring duplicates.
    ///
    /// # Errors
    /// Errors if the star cannot be inserted into the database.
    async fn insert_star(&self, star: &StarRecord) -> Result<bool> {
        let statement = "
            INSERT INTO stars ( login, repo_full_name, repo_description, repo_language, repo_stars, starred_at )
            VALUES ( $1, $2, $3, $4, $5, $6 )
            ON CONFLICT ( login, repo_full_name ) DO NOTHING
        ";
        let result = sqlx::query(statement)
            .bind(&star.login)
            .bind(&star.repo_full_name)
            .bind(&star.repo_description)
            .bind(&star.repo_language)
            .bind(star.repo_stars)
            .bind(star.starred_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Stars given since `cutoff`.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn stars_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<StarRecord>> {
        let statement = "
            SELECT s.login, s.repo_full_name, s.repo_description, s.repo_language, s.repo_stars, s.starred_at
            FROM stars s
            WHERE s.starred_at >= $1
            ORDER BY s.starred_at DESC, s.id DESC
        ";
        let rows = sqlx::query_as::<_, StarRecord>(statement)
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
