//! Manager for the account model.
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::Account;
use crate::db::DatabaseConnection;
use crate::error::Result;

#[async_trait]
impl super::Manager for DatabaseConnection {
    /// Insert an account unless its login is already tracked.
    ///
    /// # Errors
    /// Errors if the account cannot be inserted into the database.
    async fn add_account(&self, account: &Account) -> Result<bool> {
        let statement = "
            INSERT INTO accounts ( login, name, avatar_url, bio, followers, following, added_at, last_fetched )
            VALUES ( $1, $2, $3, $4, $5, $6, $7, $8 )
            ON CONFLICT ( login ) DO NOTHING
        ";
        let result = sqlx::query(statement)
            .bind(&account.login)
            .bind(&account.name)
            .bind(&account.avatar_url)
            .bind(&account.bio)
            .bind(account.followers)
            .bind(account.following)
            .bind(account.added_at)
            .bind(account.last_fetched)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Delete an account; foreign keys cascade to its activity.
    ///
    /// # Errors
    /// Errors if the account cannot be deleted.
    async fn remove_account(&self, login: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE login = $1")
            .bind(login)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find one account by login.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn find_account(&self, login: &str) -> Result<Option<Account>> {
        let statement = "
            SELECT a.login, a.name, a.avatar_url, a.bio, a.followers, a.following, a.added_at, a.last_fetched
            FROM accounts a
            WHERE a.login = $1
            LIMIT 1
        ";
        let row = sqlx::query_as::<_, Account>(statement)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// All accounts, alphabetically.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn list_accounts(&self) -> Result<Vec<Account>> {
        let statement = "
            SELECT a.login, a.name, a.avatar_url, a.bio, a.followers, a.following, a.added_at, a.last_fetched
            FROM accounts a
            ORDER BY a.login
        ";
        let rows = sqlx::query_as::<_, Account>(statement)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Whether `login` is tracked.
    ///
    /// # Errors
    /// Errors if can't establish a connection to the database.
    async fn account_exists(&self, login: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE login = $1")
            .bind(login)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Set `last_fetched`.
    ///
    /// # Errors
    /// Errors if the account cannot be updated.
    async fn touch_last_fetched(&self, login: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE accounts SET last_fetched = $1 WHERE login = $2")
            .bind(at)
            .bind(login)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
