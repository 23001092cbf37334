//! User configuration and on-disk layout.
//!
//! Everything lives under one home directory (`$GHPULSE_HOME`, or `~/.ghpulse`):
//! `config.toml` and the `ghpulse.db` activity store.
use std::env;
use std::fs::{create_dir_all, read_to_string, write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::remote::client::DEFAULT_BASE_URL;
use crate::summary::ollama;

/// Environment variable overriding the home directory.
pub const HOME_ENV: &str = "GHPULSE_HOME";
/// Environment variable overriding the configured token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
/// Config file name inside the home directory.
pub const CONFIG_FILE: &str = "config.toml";
/// Database file name inside the home directory.
pub const DATABASE_FILE: &str = "ghpulse.db";
/// Longest digest window, in days.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Location of ghpulse's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Home {
    /// Home directory.
    pub root: PathBuf,
}

impl Home {
    /// Home at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `explicit` if given, else `$GHPULSE_HOME`, else `~/.ghpulse`.
    ///
    /// # Errors
    /// Errors if no explicit path is given and the user's home directory is unknown.
    pub fn resolve(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = explicit.or_else(|| env::var_os(HOME_ENV).map(PathBuf::from)) {
            return Ok(Self::new(root));
        }
        dirs::home_dir()
            .map(|home| Self::new(home.join(".ghpulse")))
            .ok_or_else(|| Error::Config("could not determine the home directory".to_owned()))
    }

    /// Path of the config file.
    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Path of the activity store.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    /// Whether a config file exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.config_path().is_file()
    }
}

/// API access.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GitHub {
    /// Personal access token. Empty means unset.
    pub token: String,
    /// API root; point it at an enterprise host if needed.
    pub base_url: String,
}

impl Default for GitHub {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

/// Ingestion settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Fetch {
    /// Accounts ingested at once.
    pub concurrency: usize,
    /// HTTP timeout per request, in seconds.
    pub timeout_seconds: u64,
}

impl Default for Fetch {
    fn default() -> Self {
        Self {
            concurrency: 5,
            timeout_seconds: 30,
        }
    }
}

/// Digest settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DigestSettings {
    /// Window, in days, when `--days` is not given.
    pub default_days: u32,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self { default_days: 7 }
    }
}

/// Summarizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Llm {
    /// Backend name; only `ollama` is supported.
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Server address.
    pub base_url: String,
}

impl Default for Llm {
    fn default() -> Self {
        Self {
            provider: "ollama".to_owned(),
            model: ollama::DEFAULT_MODEL.to_owned(),
            base_url: ollama::DEFAULT_BASE_URL.to_owned(),
        }
    }
}

/// Contents of `config.toml`. Missing sections and keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// API access.
    pub github: GitHub,
    /// Ingestion settings.
    pub fetch: Fetch,
    /// Digest settings.
    pub digest: DigestSettings,
    /// Summarizer settings.
    pub llm: Llm,
}

impl Config {
    /// Parse and validate a config document.
    ///
    /// # Errors
    /// Errors if the document is not valid TOML or holds invalid values.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| Error::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, then apply the `GITHUB_TOKEN` override.
    ///
    /// # Errors
    /// Errors if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read_to_string(path)
            .map_err(|err| Error::Config(format!("cannot read {}: {err}", path.display())))?;
        let config = Self::parse(&text)?.with_token_override(env::var(TOKEN_ENV).ok());
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write the config to `path`, creating its directory.
    ///
    /// # Errors
    /// Errors if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)
                .map_err(|err| {
                    Error::Config(format!("cannot create {}: {err}", parent.display()))
                })?;
        }
        let text = toml::to_string_pretty(self).map_err(|err| Error::Config(err.to_string()))?;
        write(path, text)
            .map_err(|err| Error::Config(format!("cannot write {}: {err}", path.display())))?;
        restrict_permissions(path)?;
        Ok(())
    }

    /// Replace the token with `token` when it is set and non-empty.
    #[must_use]
    pub fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|token| !token.trim().is_empty()) {
            self.github.token = token;
        }
        self
    }

    /// The configured token.
    ///
    /// # Errors
    /// Errors with `Error::CredentialMissing` if no token is set.
    pub fn require_token(&self) -> Result<&str> {
        let token = self.github.token.trim();
        if token.is_empty() {
            return Err(Error::CredentialMissing);
        }
        Ok(token)
    }

    /// The token, if one is set.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.require_token().ok().map(str::to_owned)
    }

    /// HTTP timeout for API requests.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.fetch.timeout_seconds)
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.github.base_url)
            .map_err(|err| Error::Config(format!("github.base_url: {err}")))?;
        Url::parse(&self.llm.base_url)
            .map_err(|err| Error::Config(format!("llm.base_url: {err}")))?;
        if self.fetch.timeout_seconds == 0 {
            return Err(Error::Config("fetch.timeout_seconds must be positive".to_owned()));
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.digest.default_days) {
            return Err(Error::Config(format!(
                "digest.default_days must be between 1 and {MAX_WINDOW_DAYS}"
            )));
        }
        if self.llm.provider != "ollama" {
            return Err(Error::Config(format!(
                "llm.provider `{}` is not supported",
                self.llm.provider
            )));
        }
        Ok(())
    }
}

/// Owner read/write only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|err| Error::Config(format!("cannot restrict {}: {err}", path.display())))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps, reason = "Mirrors the unix signature")]
const fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
