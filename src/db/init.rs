use crate::db::{DatabaseConnection, Db};
use crate::error::Result;
use std::env;
use std::path::Path;

/// Connects to a database and applies migrations.
/// We use `SQLite` at `db_path` by default, but we can override this by setting the
/// `DATABASE_URL` environment variable.
///
/// # Errors
/// Errors if connection to database fails or the schema cannot be applied.
/// Connections can fail if the parent directory does not exist, or if the database URL is invalid.
pub async fn connect(db_path: &Path) -> Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| sqlite_url(db_path));
    connect_url(&db_url).await
}

/// Connects to the database at `db_url` and applies migrations.
///
/// # Errors
/// Errors if connection to database fails or the schema cannot be applied.
pub async fn connect_url(db_url: &str) -> Result<DatabaseConnection> {
    let connection = DatabaseConnection::connect(db_url).await?;
    tracing::debug!("Connected to database");
    sqlx::migrate!("./migrations/sqlite")
        .run(&connection.pool)
        .await?;
    Ok(connection)
}

/// `sqlite://` URL that creates the file if missing.
#[must_use]
pub fn sqlite_url(db_path: &Path) -> String {
    format!("sqlite://{}?mode=rwc", db_path.to_string_lossy())
}
