//! Manager for the digest model.
use async_trait::async_trait;

use super::DigestRecord;
use crate::db::DatabaseConnection;
use crate::error::Result;

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Insert a digest.
    ///
    /// # Errors
    /// Errors if the digest cannot be inserted into the database.
    async fn insert_digest(&self, digest: &DigestRecord) -> Result<i64> {
        let statement = "
            INSERT INTO digests ( period_start, period_end, content, summary, created_at )
            VALUES ( $1, $2, $3, $4, $5 )
        ";
        let result = sqlx::query(statement)
            .bind(digest.period_start)
            .bind(digest.period_end)
            .bind(&digest.content)
            .bind(&digest.summary)
            .bind(digest.created_at)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// Latest digest.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn latest_digest(&self) -> Result<Option<DigestRecord>> {
        let statement = "
            SELECT d.period_start, d.period_end, d.content, d.summary, d.created_at
            FROM digests d
            ORDER BY d.created_at DESC, d.id DESC
            LIMIT 1
        ";
        let row = sqlx::query_as::<_, DigestRecord>(statement)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
