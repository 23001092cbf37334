use chrono::Utc;
use tokio::task::JoinSet;

use crate::common::{days_ago, initialize_store, initialize_store_with};
use ghpulse::db::models::account::{Account, Manager as _};
use ghpulse::db::models::commit::{CommitRecord, Manager as _};
use ghpulse::db::models::digest::{DigestRecord, Manager as _};
use ghpulse::db::models::repo::{Manager as _, RepoRecord};
use ghpulse::db::models::star::{Manager as _, StarRecord};
use ghpulse::error::Error;

fn commit(login: &str, repo: &str, sha: &str, days: i64) -> CommitRecord {
    CommitRecord {
        login: login.to_owned(),
        repo_name: repo.to_owned(),
        sha: sha.to_owned(),
        message: format!("commit {sha}"),
        committed_at: days_ago(days),
    }
}

fn star(login: &str, repo: &str, days: i64) -> StarRecord {
    StarRecord {
        login: login.to_owned(),
        repo_full_name: repo.to_owned(),
        repo_description: None,
        repo_language: Some("Rust".to_owned()),
        repo_stars: 10,
        starred_at: days_ago(days),
    }
}

#[tokio::test]
async fn test_add_account_when_already_tracked_expect_false() {
    let (_dir, db) = initialize_store().await;
    assert!(db.add_account(&Account::new("octocat")).await.unwrap());
    assert!(!db.add_account(&Account::new("octocat")).await.unwrap());
    assert_eq!(db.list_accounts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_accounts_expect_login_order() {
    let (_dir, db) = initialize_store_with(&["zed", "Alice", "bob"]).await;
    let actual: Vec<String> = db
        .list_accounts()
        .await
        .unwrap()
        .into_iter()
        .map(|account| account.login)
        .collect();
    assert_eq!(actual, vec!["Alice", "bob", "zed"]);
}

#[tokio::test]
async fn test_touch_last_fetched_expect_timestamp_stored() {
    let (_dir, db) = initialize_store_with(&["octocat"]).await;
    assert_eq!(db.find_account("octocat").await.unwrap().unwrap().last_fetched, None);
    let at = Utc::now();
    db.touch_last_fetched("octocat", at).await.unwrap();
    let actual = db.find_account("octocat").await.unwrap().unwrap();
    assert_eq!(actual.last_fetched, Some(at));
}

#[tokio::test]
async fn test_insert_commit_when_duplicate_expect_false_and_single_row() {
    let (_dir, db) = initialize_store_with(&["alice"]).await;
    let record = commit("alice", "alice/app", "abc123", 1);
    assert!(db.insert_commit(&record).await.unwrap());
    assert!(!db.insert_commit(&record).await.unwrap());
    assert_eq!(db.commits_since("alice", days_ago(7)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_insert_commit_when_same_sha_other_repo_expect_first_write_wins() {
    let (_dir, db) = initialize_store_with(&["alice"]).await;
    assert!(db.insert_commit(&commit("alice", "alice/one", "abc", 1)).await.unwrap());
    assert!(!db.insert_commit(&commit("alice", "alice/two", "abc", 1)).await.unwrap());
    let actual = db.commits_since("alice", days_ago(7)).await.unwrap();
    assert_eq!(actual.len(), 1);
    assert_eq!(actual[0].repo_name, "alice/one");
}

#[tokio::test]
async fn test_insert_commit_when_same_sha_other_account_expect_both_stored() {
    let (_dir, db) = initialize_store_with(&["alice", "bob"]).await;
    assert!(db.insert_commit(&commit("alice", "shared/repo", "abc", 1)).await.unwrap());
    assert!(db.insert_commit(&commit("bob", "shared/repo", "abc", 1)).await.unwrap());
}

#[tokio::test]
async fn test_insert_commit_when_account_unknown_expect_storage_error() {
    let (_dir, db) = initialize_store().await;
    let actual = db.insert_commit(&commit("ghost", "ghost/repo", "abc", 1)).await.unwrap_err();
    assert!(matches!(actual, Error::Storage(_)), "{actual}");
}

#[tokio::test]
async fn test_commits_since_expect_window_and_recency_order() {
    let (_dir, db) = initialize_store_with(&["alice"]).await;
    db.insert_commit(&commit("alice", "alice/app", "old", 10)).await.unwrap();
    db.insert_commit(&commit("alice", "alice/app", "mid", 3)).await.unwrap();
    db.insert_commit(&commit("alice", "alice/app", "new", 1)).await.unwrap();
    let actual: Vec<String> = db
        .commits_since("alice", days_ago(7))
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.sha)
        .collect();
    assert_eq!(actual, vec!["new", "mid"]);
}

#[tokio::test]
async fn test_commits_since_when_cutoff_equals_timestamp_expect_included() {
    let (_dir, db) = initialize_store_with(&["alice"]).await;
    let record = commit("alice", "alice/app", "edge", 3);
    db.insert_commit(&record).await.unwrap();
    let actual = db.commits_since("alice", record.committed_at).await.unwrap();
    assert_eq!(actual, vec![record]);
}

#[tokio::test]
async fn test_commit_counts_by_account_expect_counts_in_window() {
    let (_dir, db) = initialize_store_with(&["alice", "bob"]).await;
    db.insert_commit(&commit("alice", "alice/app", "a1", 1)).await.unwrap();
    db.insert_commit(&commit("alice", "alice/app", "a2", 2)).await.unwrap();
    db.insert_commit(&commit("bob", "bob/app", "b1", 30)).await.unwrap();
    let actual = db.commit_counts_by_account(days_ago(7)).await.unwrap();
    assert_eq!(actual.len(), 1);
    assert_eq!(actual.get("alice"), Some(&2));
}

#[tokio::test]
async fn test_top_active_accounts_when_tied_expect_login_order_and_sorted_repos() {
    let (_dir, db) = initialize_store_with(&["carol", "alice", "bob"]).await;
    db.insert_commit(&commit("carol", "carol/z", "c1", 1)).await.unwrap();
    db.insert_commit(&commit("carol", "carol/a", "c2", 1)).await.unwrap();
    db.insert_commit(&commit("carol", "carol/z", "c3", 1)).await.unwrap();
    db.insert_commit(&commit("bob", "bob/x", "b1", 1)).await.unwrap();
    db.insert_commit(&commit("bob", "bob/x", "b2", 1)).await.unwrap();
    db.insert_commit(&commit("alice", "alice/y", "a1", 1)).await.unwrap();
    db.insert_commit(&commit("alice", "alice/y", "a2", 1)).await.unwrap();
    let actual = db.top_active_accounts(days_ago(7), 2).await.unwrap();
    assert_eq!(actual.len(), 2);
    assert_eq!(actual[0].login, "carol");
    assert_eq!(actual[0].commit_count, 3);
    assert_eq!(actual[0].repos, vec!["carol/a", "carol/z"]);
    assert_eq!(actual[1].login, "alice");
}

#[tokio::test]
async fn test_insert_repo_when_duplicate_expect_snapshot_not_overwritten() {
    let (_dir, db) = initialize_store_with(&["alice"]).await;
    let mut record = RepoRecord {
        login: "alice".to_owned(),
        name: "app".to_owned(),
        full_name: "alice/app".to_owned(),
        description: Some("first".to_owned()),
        language: Some("Rust".to_owned()),
        stars: 1,
        created_at: days_ago(2),
    };
    assert!(db.insert_repo(&record).await.unwrap());
    record.description = Some("second".to_owned());
    record.stars = 99;
    assert!(!db.insert_repo(&record).await.unwrap());
    let actual = db.new_repos_since(days_ago(7)).await.unwrap();
    assert_eq!(actual.len(), 1);
    assert_eq!(actual[0].description.as_deref(), Some("first"));
    assert_eq!(actual[0].stars, 1);
}

#[tokio::test]
async fn test_stars_since_expect_all_accounts_most_recent_first() {
    let (_dir, db) = initialize_store_with(&["alice", "bob"]).await;
    db.insert_star(&star("alice", "x/one", 3)).await.unwrap();
    db.insert_star(&star("bob", "x/two", 1)).await.unwrap();
    db.insert_star(&star("bob", "x/old", 40)).await.unwrap();
    assert!(!db.insert_star(&star("alice", "x/one", 2)).await.unwrap());
    let actual: Vec<String> = db
        .stars_since(days_ago(7))
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.repo_full_name)
        .collect();
    assert_eq!(actual, vec!["x/two", "x/one"]);
}

#[tokio::test]
async fn test_remove_account_expect_activity_cascaded() {
    let (_dir, db) = initialize_store_with(&["alice", "bob"]).await;
    db.insert_commit(&commit("alice", "alice/app", "a1", 1)).await.unwrap();
    db.insert_star(&star("alice", "x/one", 1)).await.unwrap();
    db.insert_commit(&commit("bob", "bob/app", "b1", 1)).await.unwrap();

    assert!(db.remove_account("alice").await.unwrap());
    assert!(!db.remove_account("alice").await.unwrap());
    assert!(!db.account_exists("alice").await.unwrap());

    db.add_account(&Account::new("alice")).await.unwrap();
    assert!(db.commits_since("alice", days_ago(7)).await.unwrap().is_empty());
    assert!(db.stars_since(days_ago(7)).await.unwrap().is_empty());
    assert_eq!(db.commits_since("bob", days_ago(7)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_latest_digest_expect_most_recent_record() {
    let (_dir, db) = initialize_store().await;
    assert_eq!(db.latest_digest().await.unwrap(), None);
    let first = DigestRecord {
        period_start: days_ago(14),
        period_end: days_ago(7),
        content: "{}".to_owned(),
        summary: None,
        created_at: days_ago(7),
    };
    let second = DigestRecord {
        period_start: days_ago(7),
        period_end: Utc::now(),
        content: r#"{"total_commits":3}"#.to_owned(),
        summary: Some("- busy week".to_owned()),
        created_at: Utc::now(),
    };
    let first_id = db.insert_digest(&first).await.unwrap();
    let second_id = db.insert_digest(&second).await.unwrap();
    assert!(second_id > first_id);
    assert_eq!(db.latest_digest().await.unwrap(), Some(second));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_insert_commit_when_writers_race_on_same_key_expect_one_row() {
    let (_dir, db) = initialize_store_with(&["alice"]).await;
    let record = commit("alice", "alice/app", "abc123", 1);
    let mut writers = JoinSet::new();
    for _ in 0..32 {
        let db = db.clone();
        let record = record.clone();
        writers.spawn(async move { db.insert_commit(&record).await.unwrap() });
    }
    let mut created = 0;
    while let Some(inserted) = writers.join_next().await {
        if inserted.unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    let stored = db.commits_since("alice", days_ago(7)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].sha, record.sha);
}
