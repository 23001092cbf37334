//! Optional prose summaries of a digest.
//!
//! A summarizer only ever sees a [`DigestSnapshot`]; it has no access to the store.
use std::fmt::Write as _;

use async_trait::async_trait;

use crate::digest::DigestSnapshot;
use crate::error::Result;

pub mod ollama;

/// Longest repository list, in characters, shown per account in a prompt.
const REPO_LIST_WIDTH: usize = 80;

/// Turns a digest snapshot into a short text.
#[async_trait]
pub trait Summarize: Send + Sync {
    /// Summarize `snapshot`.
    ///
    /// # Errors
    /// Errors if the backend cannot be reached or answers with an error.
    async fn summarize(&self, snapshot: &DigestSnapshot) -> Result<String>;
}

/// Prompt asking for a few insights on `snapshot`.
#[must_use]
pub fn digest_prompt(snapshot: &DigestSnapshot) -> String {
    let mut prompt = String::from(
        "Analyze this GitHub activity digest and provide 2-3 brief insights about what developers are focusing on.\n\n",
    );
    prompt.push_str("Activity Summary:\n");
    // Writing into a String cannot fail.
    let _ = writeln!(prompt, "- {} total commits", snapshot.total_commits);
    let _ = writeln!(prompt, "- {} new repositories created", snapshot.total_repos);
    let _ = writeln!(prompt, "- {} repositories starred", snapshot.total_stars);
    if !snapshot.top_languages.is_empty() {
        let _ = writeln!(prompt, "- Top languages: {}", snapshot.top_languages.join(", "));
    }
    if !snapshot.trending_repos.is_empty() {
        let _ = writeln!(
            prompt,
            "- Trending repos (starred by multiple devs): {}",
            snapshot.trending_repos.join(", ")
        );
    }
    if let Some(login) = &snapshot.most_active {
        let _ = writeln!(prompt, "- Most active: {login}");
    }
    if !snapshot.active_accounts.is_empty() {
        prompt.push_str("\nActive developers:\n");
        for active in &snapshot.active_accounts {
            let repos = truncate(&active.repos.join(", "), REPO_LIST_WIDTH);
            let _ = writeln!(
                prompt,
                "- {}: {} commits in {repos}",
                active.login, active.commit_count
            );
        }
    }
    prompt.push_str(
        "\nProvide 2-3 concise bullet points about emerging trends, technology focus areas, or notable patterns. Be specific and actionable. Keep each bullet under 100 characters.",
    );
    prompt
}

/// `text` cut to at most `width` characters, ending in `...` when cut.
pub(crate) fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_owned();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
