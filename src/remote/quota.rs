//! Rate-limit bookkeeping shared by every concurrent request.
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Below this many remaining requests, callers wait for the window to reset.
pub const LOW_WATER_MARK: u32 = 10;

/// Added on top of the advertised reset time before requests resume.
pub const SAFETY_MARGIN: Duration = Duration::from_secs(1);

/// Header carrying the number of requests left in the current window.
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Header carrying the window reset as epoch seconds.
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Last quota observed on a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaState {
    /// Requests left; `None` until a response has carried the header.
    pub remaining: Option<u32>,
    /// When the window resets; `None` until observed.
    pub reset_at: Option<DateTime<Utc>>,
}

impl QuotaState {
    /// How long a caller must hold off at `now`, if at all.
    #[must_use]
    pub fn backoff(&self, now: DateTime<Utc>) -> Option<Duration> {
        let remaining = self.remaining?;
        let reset_at = self.reset_at?;
        if remaining >= LOW_WATER_MARK || reset_at <= now {
            return None;
        }
        let until_reset = (reset_at - now).to_std().ok()?;
        Some(until_reset + SAFETY_MARGIN)
    }
}

/// Quota state behind a single lock.
///
/// Both fields are always read and written together so concurrent jobs never observe
/// a remaining count from one response paired with the reset time of another.
#[derive(Debug, Default)]
pub struct Quota {
    /// Guarded state.
    state: Mutex<QuotaState>,
}

impl Quota {
    /// Fresh tracker with nothing observed yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> QuotaState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the state directly.
    pub fn record(&self, remaining: u32, reset_at: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.remaining = Some(remaining);
        state.reset_at = Some(reset_at);
    }

    /// Update from response headers. Absent or unparsable headers leave the
    /// corresponding field untouched.
    pub fn observe(&self, headers: &HeaderMap) {
        let remaining = header_value(headers, REMAINING_HEADER)
            .and_then(|value| value.parse::<u32>().ok());
        let reset_at = header_value(headers, RESET_HEADER)
            .and_then(|value| value.parse::<i64>().ok())
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        if remaining.is_none() && reset_at.is_none() {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if remaining.is_some() {
            state.remaining = remaining;
        }
        if reset_at.is_some() {
            state.reset_at = reset_at;
        }
    }

    /// Suspend the calling task until the window resets when the quota is nearly spent.
    /// Returns immediately otherwise. Other tasks are unaffected until they call this too.
    ///
    /// # Errors
    /// Returns [`Error::Cancelled`] if `cancel` fires while waiting.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        let state = self.snapshot();
        let Some(backoff) = state.backoff(Utc::now()) else {
            return Ok(());
        };
        tracing::warn!(
            remaining = state.remaining,
            wait_secs = backoff.as_secs(),
            "Rate limit low, waiting for reset"
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            () = tokio::time::sleep(backoff) => Ok(()),
        }
    }
}

/// Header as a trimmed string, if present and valid ASCII.
fn header_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}
