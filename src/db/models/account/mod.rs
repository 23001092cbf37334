use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::remote::UserSummary;

pub mod manager;

/// Trait for managing tracked accounts.
#[async_trait]
pub trait Manager {
    /// Start tracking an account. Returns `false` if it was already tracked.
    async fn add_account(&self, account: &Account) -> Result<bool>;
    /// Stop tracking an account; its commits, repos and stars go with it.
    /// Returns `false` if it was not tracked.
    async fn remove_account(&self, login: &str) -> Result<bool>;
    /// Find one account by login.
    async fn find_account(&self, login: &str) -> Result<Option<Account>>;
    /// All tracked accounts ordered by login.
    async fn list_accounts(&self) -> Result<Vec<Account>>;
    /// Whether `login` is tracked.
    async fn account_exists(&self, login: &str) -> Result<bool>;
    /// Record that an ingestion attempt for `login` finished at `at`.
    async fn touch_last_fetched(&self, login: &str, at: DateTime<Utc>) -> Result<()>;
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
/// Model for a tracked account.
pub struct Account {
    /// Username, case-sensitive as returned by the API.
    pub login: String,
    /// Display name.
    pub name: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// Profile bio.
    pub bio: Option<String>,
    /// Followers at the time the account was added.
    pub followers: i64,
    /// Following at the time the account was added.
    pub following: i64,
    /// When tracking started.
    pub added_at: DateTime<Utc>,
    /// When an ingestion attempt last completed. `None` means never fetched.
    pub last_fetched: Option<DateTime<Utc>>,
}

impl Account {
    /// Account known only by login.
    #[must_use]
    pub fn new(login: &str) -> Self {
        Self::from_profile(UserSummary {
            login: login.to_owned(),
            ..UserSummary::default()
        })
    }

    /// Account built from a fetched profile, added now.
    #[must_use]
    pub fn from_profile(profile: UserSummary) -> Self {
        Self {
            login: profile.login,
            name: profile.name,
            avatar_url: profile.avatar_url,
            bio: profile.bio,
            followers: profile.followers,
            following: profile.following,
            added_at: Utc::now(),
            last_fetched: None,
        }
    }

    /// Display name, falling back to the login.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.login)
    }
}
