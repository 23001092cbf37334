use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod manager;

/// Trait for managing rendered digests.
#[async_trait]
pub trait Manager {
    /// Store a digest and return its id.
    async fn insert_digest(&self, digest: &DigestRecord) -> Result<i64>;
    /// Most recently created digest, if any.
    async fn latest_digest(&self) -> Result<Option<DigestRecord>>;
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Model for a digest that was shown to the user.
pub struct DigestRecord {
    /// Start of the window.
    pub period_start: DateTime<Utc>,
    /// End of the window.
    pub period_end: DateTime<Utc>,
    /// Serialized digest snapshot (JSON).
    pub content: String,
    /// LLM summary, when one was requested and succeeded.
    pub summary: Option<String>,
    /// When the digest was produced.
    pub created_at: DateTime<Utc>,
}
