//! Cross-account views over stored activity.
//!
//! Everything here is read-only. [`query_digest`] gathers the raw rows for a window and
//! derives the trending and language views from them in memory.
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::commit::{ActiveAccount, Manager as _};
use crate::db::models::repo::{Manager as _, RepoRecord};
use crate::db::models::star::{Manager as _, StarRecord};
use crate::db::DatabaseConnection;
use crate::error::{Error, Result};

/// Distinct accounts that must star a repository for it to trend.
pub const TRENDING_THRESHOLD: usize = 2;
/// Trending repositories kept.
pub const TRENDING_LIMIT: usize = 10;
/// Languages kept in the mix.
pub const LANGUAGE_LIMIT: usize = 5;
/// Accounts kept in the most-active list.
pub const TOP_ACTIVE_LIMIT: i64 = 5;

/// A repository starred by several tracked accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendingRepo {
    /// `owner/name`.
    pub repo_full_name: String,
    /// Description of the most recent star snapshot.
    pub description: Option<String>,
    /// Language of the most recent star snapshot.
    pub language: Option<String>,
    /// Accounts that starred it, ascending.
    pub starred_by: Vec<String>,
}

impl TrendingRepo {
    /// Number of distinct accounts that starred the repository.
    #[must_use]
    pub fn star_count(&self) -> usize {
        self.starred_by.len()
    }
}

/// Share of one language among tagged repositories and stars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    /// Language name.
    pub language: String,
    /// Occurrences in the window.
    pub count: u64,
    /// Share of all tagged occurrences, 0 to 100.
    pub percentage: f64,
}

/// Repositories starred by at least `threshold` distinct accounts, most starred first,
/// ties by name. At most `limit` entries.
#[must_use]
pub fn trending(stars: &[StarRecord], threshold: usize, limit: usize) -> Vec<TrendingRepo> {
    let mut grouped: BTreeMap<&str, (&StarRecord, BTreeSet<&str>)> = BTreeMap::new();
    for star in stars {
        grouped
            .entry(star.repo_full_name.as_str())
            .or_insert_with(|| (star, BTreeSet::new()))
            .1
            .insert(star.login.as_str());
    }
    let mut trending: Vec<TrendingRepo> = grouped
        .into_iter()
        .filter(|(_, (_, logins))| logins.len() >= threshold)
        .map(|(repo, (first, logins))| TrendingRepo {
            repo_full_name: repo.to_owned(),
            description: first.repo_description.clone(),
            language: first.repo_language.clone(),
            starred_by: logins.into_iter().map(str::to_owned).collect(),
        })
        .collect();
    // Stable sort keeps the name order of the map for equal counts.
    trending.sort_by(|left, right| right.star_count().cmp(&left.star_count()));
    trending.truncate(limit);
    trending
}

/// Language tally over new repositories and stars, each occurrence weighted equally.
/// Untagged entries are left out of both the counts and the total.
#[must_use]
pub fn language_mix(
    repos: &[RepoRecord],
    stars: &[StarRecord],
    limit: usize,
) -> Vec<LanguageShare> {
    let mut tally: BTreeMap<&str, u64> = BTreeMap::new();
    let languages = repos
        .iter()
        .map(|repo| repo.language.as_deref())
        .chain(stars.iter().map(|star| star.repo_language.as_deref()))
        .flatten()
        .filter(|language| !language.is_empty());
    for language in languages {
        *tally.entry(language).or_default() += 1;
    }
    let total: u64 = tally.values().sum();
    let mut mix: Vec<LanguageShare> = tally
        .into_iter()
        .map(|(language, count)| LanguageShare {
            language: language.to_owned(),
            count,
            percentage: percent(count, total),
        })
        .collect();
    mix.sort_by(|left, right| right.count.cmp(&left.count));
    mix.truncate(limit);
    mix
}

#[allow(clippy::cast_precision_loss, reason = "Counts stay far below 2^52")]
fn percent(count: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    count as f64 * 100.0 / total as f64
}

/// Activity of all tracked accounts over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Digest {
    /// Window start (inclusive).
    pub since: DateTime<Utc>,
    /// Window end.
    pub until: DateTime<Utc>,
    /// Commits per account.
    pub commit_counts: BTreeMap<String, i64>,
    /// Repositories created in the window, newest first.
    pub new_repos: Vec<RepoRecord>,
    /// Stars given in the window, newest first.
    pub new_stars: Vec<StarRecord>,
    /// Repositories starred by several accounts.
    pub trending: Vec<TrendingRepo>,
    /// Most common languages.
    pub languages: Vec<LanguageShare>,
    /// Accounts with the most commits.
    pub top_active: Vec<ActiveAccount>,
}

impl Digest {
    /// Commits across all accounts.
    #[must_use]
    pub fn total_commits(&self) -> i64 {
        self.commit_counts.values().sum()
    }

    /// The condensed form handed to a summarizer.
    #[must_use]
    pub fn snapshot(&self) -> DigestSnapshot {
        DigestSnapshot {
            since: self.since,
            until: self.until,
            total_commits: self.total_commits(),
            total_repos: self.new_repos.len(),
            total_stars: self.new_stars.len(),
            top_languages: self
                .languages
                .iter()
                .map(|share| share.language.clone())
                .collect(),
            trending_repos: self
                .trending
                .iter()
                .map(|repo| repo.repo_full_name.clone())
                .collect(),
            most_active: self.top_active.first().map(|active| active.login.clone()),
            active_accounts: self.top_active.clone(),
        }
    }
}

/// Plain, serializable summary of a [`Digest`]. Stored with each digest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DigestSnapshot {
    /// Window start.
    pub since: DateTime<Utc>,
    /// Window end.
    pub until: DateTime<Utc>,
    /// Commits across all accounts.
    pub total_commits: i64,
    /// Repositories created.
    pub total_repos: usize,
    /// Stars given.
    pub total_stars: usize,
    /// Language names, most common first.
    pub top_languages: Vec<String>,
    /// Trending repository names.
    pub trending_repos: Vec<String>,
    /// Login of the most active account.
    pub most_active: Option<String>,
    /// Most active accounts with the repositories they pushed to.
    pub active_accounts: Vec<ActiveAccount>,
}

/// Start of the `window` ending at `until`.
///
/// # Errors
/// Errors with `Error::Config` if the start falls outside the representable date range.
pub fn window_start(until: DateTime<Utc>, window: Duration) -> Result<DateTime<Utc>> {
    until
        .checked_sub_signed(window)
        .ok_or_else(|| Error::Config(format!("a {} day window is out of range", window.num_days())))
}

/// Digest of the trailing `window` ending now.
///
/// # Errors
/// Errors if the window is out of range or the store cannot be read.
pub async fn query_digest(conn: &DatabaseConnection, window: Duration) -> Result<Digest> {
    let until = Utc::now();
    query_digest_between(conn, window_start(until, window)?, until).await
}

/// Digest of activity at or after `since`, labelled as ending at `until`.
///
/// # Errors
/// Errors if the store cannot be read.
pub async fn query_digest_between(
    conn: &DatabaseConnection,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Digest> {
    let commit_counts = conn.commit_counts_by_account(since).await?;
    let new_repos = conn.new_repos_since(since).await?;
    let new_stars = conn.stars_since(since).await?;
    let top_active = conn.top_active_accounts(since, TOP_ACTIVE_LIMIT).await?;
    let trending = trending(&new_stars, TRENDING_THRESHOLD, TRENDING_LIMIT);
    let languages = language_mix(&new_repos, &new_stars, LANGUAGE_LIMIT);
    Ok(Digest {
        since,
        until,
        commit_counts,
        new_repos,
        new_stars,
        trending,
        languages,
        top_active,
    })
}
