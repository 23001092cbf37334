use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::{tempdir, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use ghpulse::db::init::connect;
use ghpulse::db::models::account::{Account, Manager as _};
use ghpulse::db::DatabaseConnection;
use ghpulse::error::{Error, Result};
use ghpulse::remote::{
    Event, EventRepo, Remote, RepoSummary, StarredRepo, UserSummary, PUSH_EVENT,
};

/// Fresh store in a temporary directory. Keep the `TempDir` alive for the test.
pub async fn initialize_store() -> (TempDir, DatabaseConnection) {
    let dir = tempdir().unwrap();
    let db = connect(&dir.path().join("ghpulse.db")).await.unwrap();
    (dir, db)
}

/// Fresh store tracking `logins`.
pub async fn initialize_store_with(logins: &[&str]) -> (TempDir, DatabaseConnection) {
    let (dir, db) = initialize_store().await;
    for login in logins {
        assert!(db.add_account(&Account::new(login)).await.unwrap());
    }
    (dir, db)
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - chrono::Duration::days(days)
}

pub fn push_event(repo: &str, shas: &[&str], created_at: DateTime<Utc>) -> Event {
    let commits: Vec<serde_json::Value> = shas
        .iter()
        .map(|sha| serde_json::json!({"sha": sha, "message": format!("commit {sha}")}))
        .collect();
    Event {
        kind: PUSH_EVENT.to_owned(),
        repo: EventRepo {
            name: repo.to_owned(),
        },
        payload: serde_json::json!({ "commits": commits }),
        created_at,
    }
}

pub fn repo_summary(
    full_name: &str,
    language: Option<&str>,
    created_at: DateTime<Utc>,
) -> RepoSummary {
    let name = full_name.rsplit('/').next().unwrap_or(full_name);
    RepoSummary {
        name: name.to_owned(),
        full_name: full_name.to_owned(),
        description: Some(format!("{name} description")),
        language: language.map(str::to_owned),
        stars: 3,
        created_at,
    }
}

pub fn starred(full_name: &str, language: Option<&str>, starred_at: DateTime<Utc>) -> StarredRepo {
    StarredRepo {
        starred_at,
        repo: repo_summary(full_name, language, days_ago(400)),
    }
}

/// Sub-fetch of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Events,
    Repos,
    Starred,
}

/// In-memory [`Remote`] that records how many calls overlap.
#[derive(Default)]
pub struct FakeRemote {
    pub events: HashMap<String, Vec<Event>>,
    pub repos: HashMap<String, Vec<RepoSummary>>,
    pub starred: HashMap<String, Vec<StarredRepo>>,
    pub failures: HashSet<(String, Endpoint)>,
    pub delay: Duration,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub quota_waits: AtomicUsize,
    /// The first caller of `wait_for_quota` sleeps this long.
    pub quota_stall: Duration,
    pub quota_stalled: AtomicBool,
    /// Completed calls, in completion order.
    pub calls: Mutex<Vec<(String, Endpoint)>>,
}

impl FakeRemote {
    pub fn with_events(mut self, login: &str, events: Vec<Event>) -> Self {
        self.events.insert(login.to_owned(), events);
        self
    }

    pub fn with_repos(mut self, login: &str, repos: Vec<RepoSummary>) -> Self {
        self.repos.insert(login.to_owned(), repos);
        self
    }

    pub fn with_starred(mut self, login: &str, starred: Vec<StarredRepo>) -> Self {
        self.starred.insert(login.to_owned(), starred);
        self
    }

    pub fn failing(mut self, login: &str, endpoint: Endpoint) -> Self {
        self.failures.insert((login.to_owned(), endpoint));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_quota_stall(mut self, stall: Duration) -> Self {
        self.quota_stall = stall;
        self
    }

    pub fn completed_calls(&self) -> Vec<(String, Endpoint)> {
        self.calls.lock().unwrap().clone()
    }

    async fn call<T: Clone>(
        &self,
        login: &str,
        endpoint: Endpoint,
        source: &HashMap<String, Vec<T>>,
    ) -> Result<Vec<T>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push((login.to_owned(), endpoint));
        if self.failures.contains(&(login.to_owned(), endpoint)) {
            return Err(Error::Api { status: 502 });
        }
        Ok(source.get(login).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn list_following(&self) -> Result<Vec<UserSummary>> {
        Ok(vec![])
    }

    async fn get_user(&self, login: &str) -> Result<UserSummary> {
        Ok(UserSummary {
            login: login.to_owned(),
            ..UserSummary::default()
        })
    }

    async fn get_public_events(&self, login: &str) -> Result<Vec<Event>> {
        self.call(login, Endpoint::Events, &self.events).await
    }

    async fn get_repositories(&self, login: &str) -> Result<Vec<RepoSummary>> {
        self.call(login, Endpoint::Repos, &self.repos).await
    }

    async fn get_starred(&self, login: &str) -> Result<Vec<StarredRepo>> {
        self.call(login, Endpoint::Starred, &self.starred).await
    }

    fn remaining_quota(&self) -> Option<u32> {
        None
    }

    fn quota_reset_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    async fn wait_for_quota(&self) -> Result<()> {
        self.quota_waits.fetch_add(1, Ordering::SeqCst);
        if !self.quota_stall.is_zero() && !self.quota_stalled.swap(true, Ordering::SeqCst) {
            tokio::time::sleep(self.quota_stall).await;
        }
        Ok(())
    }
}

/// Serve `response` (a raw HTTP/1.1 response) to the first connection and return the
/// base URL plus a handle resolving to the raw request that was received.
pub async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();
        request
    });
    (format!("http://{addr}"), handle)
}

/// Serve every connection with the response of the first route whose prefix matches the
/// request path. Unmatched paths get a 404. Returns the base URL.
pub async fn serve_routes(routes: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let request = read_request(&mut socket).await;
            let path = request.split_whitespace().nth(1).unwrap_or_default();
            let response = routes
                .iter()
                .find(|(prefix, _)| path.starts_with(prefix))
                .map_or_else(
                    || http_response("404 Not Found", 100, 0, "{}"),
                    |(_, response)| response.clone(),
                );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });
    format!("http://{addr}")
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0_u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = socket.read(&mut buf).await.unwrap();
        if read == 0 {
            break;
        }
        request.extend_from_slice(&buf[..read]);
    }
    String::from_utf8_lossy(&request).into_owned()
}

/// Raw HTTP response with quota headers.
pub fn http_response(status: &str, remaining: u32, reset: i64, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\n\
         x-ratelimit-remaining: {remaining}\r\nx-ratelimit-reset: {reset}\r\n\
         content-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}
