//! Error taxonomy shared by the remote client, the store and the ingestion run.
//!
//! Whether an error is fatal depends on where it surfaces: `Transport`, `Api` and
//! `Decode` are contained per sub-fetch by the ingestor, while `Storage` aborts a run.

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong in ghpulse.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request never produced a response (DNS, TLS, connection reset, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The remote answered with a non-2xx status.
    #[error("API error: HTTP {status}")]
    Api {
        /// HTTP status code of the rejected request.
        status: u16,
    },
    /// A response body or a nested payload was not the expected shape.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// The activity store failed to read or write.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    /// The schema could not be applied.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// Configuration could not be read, parsed or validated.
    #[error("configuration error: {0}")]
    Config(String),
    /// No API token is configured but the operation needs one.
    #[error("GitHub token not set; add it to the config file or export GITHUB_TOKEN")]
    CredentialMissing,
    /// The operator aborted the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// `true` for errors the ingestor contains at sub-fetch level.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Api { .. } | Self::Decode(_)
        )
    }
}
