//! Minimax chat-completion client.

use super::LanguageModel;
use crate::{
    config::settings::InsightConfig,
    errors::{Error, Result},
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const API_KEY_VAR: &str = "MINIMAX_API_KEY";

/// Minimax API client.
pub struct MinimaxClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl MinimaxClient {
    /// Create a client for the configured endpoint and model.
    ///
    /// Every request is bounded by `config.timeout_secs`.
    pub fn new(config: &InsightConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/text/chatcompletion_v2",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
        })
    }

    /// Create a client with the API key from `MINIMAX_API_KEY`.
    ///
    /// Returns `Ok(None)` when the variable is unset or empty.
    pub fn from_env(config: &InsightConfig) -> Result<Option<Self>> {
        env_api_key()
            .map(|key| Self::new(config, key))
            .transpose()
    }

    /// Whether `MINIMAX_API_KEY` holds a usable key, without building a client.
    pub fn is_configured() -> bool {
        env_api_key().is_some()
    }
}

fn env_api_key() -> Option<String> {
    usable_key(std::env::var(API_KEY_VAR).ok())
}

fn usable_key(raw: Option<String>) -> Option<String> {
    raw.filter(|key| !key.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    base_resp: Option<BaseResp>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

/// Minimax reports API-level failures in the body of a 200 response.
#[derive(Debug, Deserialize)]
struct BaseResp {
    status_code: i64,
    #[serde(default)]
    status_msg: String,
}

fn build_request<'a>(
    model: &'a str,
    system: Option<&'a str>,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt,
    });
    ChatRequest {
        model,
        messages,
        temperature,
        max_tokens,
    }
}

fn upstream(message: impl Into<String>) -> Error {
    Error::UpstreamUnavailable {
        message: message.into(),
    }
}

/// Pulls the first choice's text out of a response body.
fn extract_content(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| upstream(format!("Failed to parse response: {e}")))?;

    if let Some(base) = parsed.base_resp.filter(|b| b.status_code != 0) {
        return Err(upstream(format!(
            "Minimax error {}: {}",
            base.status_code, base.status_msg
        )));
    }

    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| upstream("No choices in response"))
}

#[async_trait]
impl LanguageModel for MinimaxClient {
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let request = build_request(&self.model, system, prompt, temperature, max_tokens);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(upstream(format!("HTTP {status}: {body}")));
        }
        debug!("Minimax responded with {} bytes", body.len());
        extract_content(&body)
    }
}
