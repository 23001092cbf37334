//! Summaries from a local Ollama server.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{digest_prompt, Summarize};
use crate::digest::DigestSnapshot;
use crate::error::{Error, Result};

/// Default server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
/// Default model.
pub const DEFAULT_MODEL: &str = "llama3.2";
/// Generation is slow on modest hardware.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Body of a `/api/generate` call.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    /// Model name.
    model: &'a str,
    /// Full prompt text.
    prompt: &'a str,
    /// Always `false`: the answer comes back as one JSON object.
    stream: bool,
}

/// Non-streamed `/api/generate` answer; other fields are ignored.
#[derive(Deserialize)]
struct GenerateResponse {
    /// Generated text.
    response: String,
}

/// Client for the `/api/generate` endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// HTTP client carrying the generation timeout.
    http: reqwest::Client,
    /// Server address without a trailing slash.
    base_url: String,
    /// Model name.
    model: String,
}

impl OllamaClient {
    /// Client for `model` served at `base_url`.
    ///
    /// # Errors
    /// Errors if the HTTP client cannot be built.
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
        })
    }

    /// Run `prompt` through the model and return the trimmed answer.
    ///
    /// # Errors
    /// Errors on transport failure, a non-2xx status or an unexpected body.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        let generated: GenerateResponse = serde_json::from_slice(&body)?;
        Ok(generated.response.trim().to_owned())
    }
}

#[async_trait]
impl Summarize for OllamaClient {
    async fn summarize(&self, snapshot: &DigestSnapshot) -> Result<String> {
        tracing::info!("Asking {} for a summary", self.model);
        self.generate(&digest_prompt(snapshot)).await
    }
}
