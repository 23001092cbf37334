//! Plain-text views printed by the CLI.
use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};

use crate::db::models::account::Account;
use crate::db::models::commit::CommitRecord;
use crate::db::models::repo::RepoRecord;
use crate::db::models::star::StarRecord;
use crate::digest::{Digest, DigestSnapshot};
use crate::ingest::RunTotals;
use crate::summary::truncate;

/// Entries shown per digest section.
const SECTION_LIMIT: usize = 5;
/// Width of a description line.
const DESCRIPTION_WIDTH: usize = 50;
/// Width of a commit message line.
const MESSAGE_WIDTH: usize = 60;
/// Underline of the digest title.
const RULE: &str = "--------------------------------------";

/// `at` in the local timezone, formatted with `format`.
fn local(at: DateTime<Utc>, format: &str) -> String {
    at.with_timezone(&Local).format(format).to_string()
}

/// Tracked accounts with their last fetch time.
#[must_use]
pub fn accounts(accounts: &[Account]) -> String {
    if accounts.is_empty() {
        return "No accounts tracked. Run `ghpulse sync` or `ghpulse add <login>`.\n".to_owned();
    }
    let mut out = format!("Tracking {} accounts\n\n", accounts.len());
    for account in accounts {
        let fetched = account
            .last_fetched
            .map_or_else(|| "never".to_owned(), |at| local(at, "%Y-%m-%d %H:%M"));
        let _ = writeln!(
            out,
            "  {:<24} {:<28} last fetched {fetched}",
            account.login,
            account.display_name()
        );
    }
    out
}

/// Per-account and overall counts of an ingestion run, plus the remaining quota.
#[must_use]
pub fn run_totals(
    totals: &RunTotals,
    remaining: Option<u32>,
    reset_at: Option<DateTime<Utc>>,
) -> String {
    let mut out = String::new();
    for report in &totals.accounts {
        let _ = write!(
            out,
            "  {}: {} commits, {} repos, {} stars",
            report.login, report.commits, report.repos, report.stars
        );
        if report.failed_fetches > 0 {
            let _ = write!(out, " ({} fetches failed)", report.failed_fetches);
        }
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "\nFetch complete: {} commits, {} new repos, {} stars",
        totals.commits, totals.repos, totals.stars
    );
    let partial = totals.partially_failed();
    if partial > 0 {
        let _ = writeln!(out, "{partial} accounts were only partially fetched");
    }
    if let Some(remaining) = remaining {
        let reset = reset_at.map_or_else(|| "unknown".to_owned(), |at| local(at, "%H:%M"));
        let _ = writeln!(out, "Rate limit: {remaining} requests remaining (resets {reset})");
    }
    out
}

/// Full digest view, with the summary section when one was produced.
#[must_use]
pub fn digest(digest: &Digest, tracked: usize, summary: Option<&str>) -> String {
    let mut out = format!(
        "\nGITHUB DIGEST ({} - {})\n{RULE}\n\n",
        local(digest.since, "%b %-d"),
        local(digest.until, "%b %-d, %Y")
    );
    let _ = writeln!(
        out,
        "Summary: {tracked} accounts · {} commits · {} new repos · {} stars\n",
        digest.total_commits(),
        digest.new_repos.len(),
        digest.new_stars.len()
    );

    if !digest.top_active.is_empty() {
        out.push_str("Most Active\n");
        for active in &digest.top_active {
            let _ = writeln!(out, "  {:<20} {} commits", active.login, active.commit_count);
        }
        out.push('\n');
    }

    if !digest.new_repos.is_empty() {
        out.push_str("New Repositories\n");
        for repo in digest.new_repos.iter().take(SECTION_LIMIT) {
            let _ = writeln!(
                out,
                "  {}\n    {}",
                repo.full_name,
                description(repo.description.as_deref())
            );
        }
        out.push('\n');
    }

    if !digest.new_stars.is_empty() {
        out.push_str("Recent Stars\n");
        for (repo, logins) in stars_by_repo(&digest.new_stars).into_iter().take(SECTION_LIMIT) {
            let _ = writeln!(out, "  {repo}\n    ★ by {}", logins.join(", "));
        }
        out.push('\n');
    }

    if !digest.trending.is_empty() {
        out.push_str("Trending (starred by multiple accounts)\n");
        for repo in &digest.trending {
            let _ = writeln!(
                out,
                "  {}\n    ★ by {}",
                repo.repo_full_name,
                repo.starred_by.join(", ")
            );
        }
        out.push('\n');
    }

    if !digest.languages.is_empty() {
        let parts: Vec<String> = digest
            .languages
            .iter()
            .map(|share| format!("{} ({:.0}%)", share.language, share.percentage))
            .collect();
        let _ = writeln!(out, "Languages\n  {}\n", parts.join(" · "));
    }

    if let Some(summary) = summary {
        out.push_str("Focus Areas (AI-generated)\n");
        for line in summary.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let _ = writeln!(out, "  {line}");
        }
        out.push('\n');
    }
    out
}

/// A stored digest, recalled from its snapshot.
#[must_use]
pub fn stored_digest(
    snapshot: &DigestSnapshot,
    created_at: DateTime<Utc>,
    summary: Option<&str>,
) -> String {
    let mut out = format!(
        "\nGITHUB DIGEST ({} - {})\n{RULE}\n",
        local(snapshot.since, "%b %-d"),
        local(snapshot.until, "%b %-d, %Y")
    );
    let _ = writeln!(
        out,
        "Stored {}\n\nSummary: {} commits · {} new repos · {} stars\n",
        local(created_at, "%Y-%m-%d %H:%M"),
        snapshot.total_commits,
        snapshot.total_repos,
        snapshot.total_stars
    );
    if !snapshot.active_accounts.is_empty() {
        out.push_str("Most Active\n");
        for active in &snapshot.active_accounts {
            let _ = writeln!(out, "  {:<20} {} commits", active.login, active.commit_count);
        }
        out.push('\n');
    }
    if !snapshot.trending_repos.is_empty() {
        let _ = writeln!(out, "Trending\n  {}\n", snapshot.trending_repos.join(", "));
    }
    if !snapshot.top_languages.is_empty() {
        let _ = writeln!(out, "Languages\n  {}\n", snapshot.top_languages.join(" · "));
    }
    if let Some(summary) = summary {
        out.push_str("Focus Areas (AI-generated)\n");
        for line in summary.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let _ = writeln!(out, "  {line}");
        }
        out.push('\n');
    }
    out
}

/// Activity of one account: commits grouped by repository, new repositories, stars.
#[must_use]
pub fn account_activity(
    account: &Account,
    days: u32,
    commits: &[CommitRecord],
    repos: &[RepoRecord],
    stars: &[StarRecord],
) -> String {
    let mut out = format!(
        "\n{} (@{}), last {days} days\n{RULE}\n",
        account.display_name(),
        account.login
    );
    if let Some(bio) = account.bio.as_deref().filter(|bio| !bio.is_empty()) {
        let _ = writeln!(out, "{bio}");
    }
    out.push('\n');

    if commits.is_empty() && repos.is_empty() && stars.is_empty() {
        out.push_str("No activity in this period.\n");
        return out;
    }

    if !commits.is_empty() {
        let _ = writeln!(out, "Commits ({})", commits.len());
        let mut by_repo: BTreeMap<&str, Vec<&CommitRecord>> = BTreeMap::new();
        for commit in commits {
            by_repo.entry(commit.repo_name.as_str()).or_default().push(commit);
        }
        for (repo, commits) in by_repo {
            let _ = writeln!(out, "  {repo} ({})", commits.len());
            for commit in commits.iter().take(SECTION_LIMIT) {
                let short_sha: String = commit.sha.chars().take(7).collect();
                let message = commit.message.lines().next().unwrap_or_default();
                let _ = writeln!(out, "    {short_sha} {}", truncate(message, MESSAGE_WIDTH));
            }
        }
        out.push('\n');
    }

    if !repos.is_empty() {
        out.push_str("New Repositories\n");
        for repo in repos {
            let language = repo.language.as_deref().unwrap_or("-");
            let _ = writeln!(
                out,
                "  {} [{language}] {}",
                repo.full_name,
                description(repo.description.as_deref())
            );
        }
        out.push('\n');
    }

    if !stars.is_empty() {
        out.push_str("Starred\n");
        for star in stars {
            let _ = writeln!(
                out,
                "  {} ({} stars) {}",
                star.repo_full_name,
                star.repo_stars,
                local(star.starred_at, "%Y-%m-%d")
            );
        }
        out.push('\n');
    }
    out
}

fn description(text: Option<&str>) -> String {
    match text.filter(|text| !text.is_empty()) {
        Some(text) => truncate(text, DESCRIPTION_WIDTH),
        None => "(no description)".to_owned(),
    }
}

/// Stars grouped by repository, most starred first, ties by name.
fn stars_by_repo(stars: &[StarRecord]) -> Vec<(&str, Vec<&str>)> {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for star in stars {
        grouped
            .entry(star.repo_full_name.as_str())
            .or_default()
            .push(star.login.as_str());
    }
    let mut sorted: Vec<(&str, Vec<&str>)> = grouped.into_iter().collect();
    sorted.sort_by(|left, right| right.1.len().cmp(&left.1.len()));
    sorted
}
