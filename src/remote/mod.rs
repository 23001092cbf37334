//! Client side of the hosted-code-platform REST API.
//!
//! [`Remote`] is the seam the ingestor talks through; [`client::GitHubClient`] is the
//! HTTP implementation. Response types mirror only the fields ghpulse persists.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod client;
pub mod quota;

/// Event type whose payload carries pushed commits.
pub const PUSH_EVENT: &str = "PushEvent";

/// Operations the ingestion pipeline needs from the remote platform.
#[async_trait]
pub trait Remote: Send + Sync {
    /// Every account the authenticated user follows, across all pages.
    async fn list_following(&self) -> Result<Vec<UserSummary>>;
    /// Profile of a single account.
    async fn get_user(&self, login: &str) -> Result<UserSummary>;
    /// Most recent page of public events for `login`.
    async fn get_public_events(&self, login: &str) -> Result<Vec<Event>>;
    /// Most recently created repositories owned by `login`, newest first.
    async fn get_repositories(&self, login: &str) -> Result<Vec<RepoSummary>>;
    /// Most recently starred repositories of `login`, with the star time.
    async fn get_starred(&self, login: &str) -> Result<Vec<StarredRepo>>;
    /// Requests left in the current rate-limit window, if known.
    fn remaining_quota(&self) -> Option<u32>;
    /// When the current rate-limit window resets, if known.
    fn quota_reset_at(&self) -> Option<DateTime<Utc>>;
    /// Hold the calling task while the quota is nearly spent.
    async fn wait_for_quota(&self) -> Result<()>;
}

/// Public profile of an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserSummary {
    /// Username, case preserved as returned by the API.
    pub login: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Avatar URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Profile bio.
    #[serde(default)]
    pub bio: Option<String>,
    /// Follower count (absent on list endpoints).
    #[serde(default)]
    pub followers: i64,
    /// Following count (absent on list endpoints).
    #[serde(default)]
    pub following: i64,
}

/// Repository an event refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventRepo {
    /// `owner/name`.
    pub name: String,
}

/// One entry of the public event feed. The payload stays undecoded until asked for.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Event {
    /// Raw event type, e.g. `PushEvent`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Repository the event happened in.
    pub repo: EventRepo,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// A commit listed in a push payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushCommit {
    /// Commit hash.
    pub sha: String,
    /// Commit message.
    #[serde(default)]
    pub message: String,
}

/// Body of a `PushEvent` payload.
#[derive(Debug, Deserialize)]
struct PushPayload {
    /// Pushed commits.
    commits: Vec<PushCommit>,
}

impl Event {
    /// Whether this is a push.
    #[must_use]
    pub fn is_push(&self) -> bool {
        self.kind == PUSH_EVENT
    }

    /// Decode the push payload into its commits.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::Decode`] when the payload has no well-formed
    /// `commits` list.
    pub fn push_commits(&self) -> Result<Vec<PushCommit>> {
        let payload = PushPayload::deserialize(&self.payload)?;
        Ok(payload.commits)
    }
}

/// Repository as listed for an owner or inside a star.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepoSummary {
    /// Short name.
    pub name: String,
    /// `owner/name`.
    pub full_name: String,
    /// Description, if any.
    #[serde(default)]
    pub description: Option<String>,
    /// Primary language, if detected.
    #[serde(default)]
    pub language: Option<String>,
    /// Stargazer count at fetch time.
    #[serde(default, rename = "stargazers_count")]
    pub stars: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Entry of the starred list when requested with the star media type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StarredRepo {
    /// When the account starred the repository.
    pub starred_at: DateTime<Utc>,
    /// The starred repository.
    pub repo: RepoSummary,
}
