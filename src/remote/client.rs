//! HTTP implementation of [`Remote`] against the GitHub REST API.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::quota::Quota;
use super::{Event, Remote, RepoSummary, StarredRepo, UserSummary};
use crate::error::{Error, Result};

/// Public API host.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Largest page size the API accepts.
pub const PAGE_SIZE: u32 = 100;

/// Default media type.
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
/// Media type that adds `starred_at` to the starred list.
const STAR_MEDIA_TYPE: &str = "application/vnd.github.star+json";
/// Pinned REST API version.
const API_VERSION: &str = "2022-11-28";

/// Rate-limit aware GitHub client.
///
/// Cheap to share behind an `Arc`; the quota tracker is internally synchronised.
#[derive(Debug)]
pub struct GitHubClient {
    /// Underlying HTTP client (connection pool, timeout).
    http: reqwest::Client,
    /// API root, always with a trailing slash.
    base_url: Url,
    /// Bearer token, if configured.
    token: Option<String>,
    /// Last observed rate limit.
    quota: Quota,
    /// Aborts in-flight requests and quota waits.
    cancel: CancellationToken,
}

impl GitHubClient {
    /// Build a client.
    ///
    /// # Errors
    /// Errors if `base_url` is not a valid URL or the HTTP client cannot be built.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|err| Error::Config(format!("invalid API base URL `{base_url}`: {err}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base,
            token: token.filter(|value| !value.is_empty()),
            quota: Quota::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Tie every request and quota wait to `cancel`.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolve an API path (without leading slash) against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|err| Error::Config(format!("invalid API path `{path}`: {err}")))
    }

    /// Issue a GET and return the body of a 2xx response.
    ///
    /// Quota headers are recorded before the status is looked at, so error responses
    /// still keep the rate-limit view current.
    async fn get(&self, url: Url, accept: &str) -> Result<Vec<u8>> {
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, accept)
            .header(USER_AGENT, concat!("ghpulse/", env!("CARGO_PKG_VERSION")))
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
            response = request.send() => response?,
        };
        self.quota.observe(response.headers());

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%url, status = status.as_u16(), "GitHub API rejected request");
            return Err(Error::Api {
                status: status.as_u16(),
            });
        }

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            body = response.bytes() => Ok(body?.to_vec()),
        }
    }

    /// GET a JSON array, skipping items that do not decode.
    async fn get_list<T: DeserializeOwned>(&self, url: Url, accept: &str) -> Result<Vec<T>> {
        let body = self.get(url, accept).await?;
        decode_items(&body)
    }

    /// URL of a per-user endpoint with `per_page` and extra query pairs.
    fn user_endpoint(&self, login: &str, tail: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.endpoint(&format!("users/{login}/{tail}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("per_page", &PAGE_SIZE.to_string());
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// Decode a JSON array item by item. A body that is not an array is an error; an item
/// that does not match `T` is skipped.
///
/// # Errors
/// Returns [`Error::Decode`] if `body` is not a JSON array.
pub fn decode_items<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>> {
    let raw: Vec<serde_json::Value> = serde_json::from_slice(body)?;
    let mut items = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<T>(value) {
            Ok(item) => items.push(item),
            Err(err) => tracing::debug!("Skipping malformed item: {err}"),
        }
    }
    Ok(items)
}

#[async_trait]
impl Remote for GitHubClient {
    async fn list_following(&self) -> Result<Vec<UserSummary>> {
        let mut users = Vec::new();
        let mut page: u32 = 1;
        loop {
            let mut url = self.endpoint("user/following")?;
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            let batch: Vec<UserSummary> = self.get_list(url, JSON_MEDIA_TYPE).await?;
            if batch.is_empty() {
                break;
            }
            users.extend(batch);
            page += 1;
        }
        Ok(users)
    }

    async fn get_user(&self, login: &str) -> Result<UserSummary> {
        let url = self.endpoint(&format!("users/{login}"))?;
        let body = self.get(url, JSON_MEDIA_TYPE).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_public_events(&self, login: &str) -> Result<Vec<Event>> {
        let url = self.user_endpoint(login, "events/public", &[])?;
        self.get_list(url, JSON_MEDIA_TYPE).await
    }

    async fn get_repositories(&self, login: &str) -> Result<Vec<RepoSummary>> {
        let url = self.user_endpoint(
            login,
            "repos",
            &[("sort", "created"), ("direction", "desc")],
        )?;
        self.get_list(url, JSON_MEDIA_TYPE).await
    }

    async fn get_starred(&self, login: &str) -> Result<Vec<StarredRepo>> {
        let url = self.user_endpoint(login, "starred", &[])?;
        self.get_list(url, STAR_MEDIA_TYPE).await
    }

    fn remaining_quota(&self) -> Option<u32> {
        self.quota.snapshot().remaining
    }

    fn quota_reset_at(&self) -> Option<DateTime<Utc>> {
        self.quota.snapshot().reset_at
    }

    async fn wait_for_quota(&self) -> Result<()> {
        self.quota.wait(&self.cancel).await
    }
}
