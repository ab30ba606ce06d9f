use super::{ChatBackend, ChatRequest, CompletionFailure};
use crate::config::ModelsConfig;
use crate::error::{Error, Result};
use crate::notify::{classify_http_failure, excerpt, Notifier};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn first_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .filter_map(|c| c.message.and_then(|m| m.content))
            .map(|t| t.trim().to_string())
            .find(|t| !t.is_empty())
    }
}

/// OpenAI-compatible `/chat/completions` client
pub struct HttpChatBackend {
    client: Client,
    endpoint: Url,
    api_key: String,
    site_url: Option<String>,
    no_capacity_markers: Vec<String>,
    notifier: Arc<dyn Notifier>,
}

impl HttpChatBackend {
    /// Build from config, reading the API key from the environment
    pub fn from_config(config: &ModelsConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            Error::Config(format!(
                "No model API key: set {}",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key, notifier)
    }

    pub fn new(config: &ModelsConfig, api_key: String, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let endpoint = Url::parse(&format!(
            "{}/chat/completions",
            config.api_url.trim_end_matches('/')
        ))
        .map_err(|e| Error::Config(format!("Invalid models.api_url: {}", e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            site_url: config.site_url.clone(),
            no_capacity_markers: config
                .no_capacity_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
            notifier,
        })
    }

    fn signals_no_capacity(&self, body: &str) -> bool {
        let body = body.to_lowercase();
        self.no_capacity_markers
            .iter()
            .any(|marker| !marker.is_empty() && body.contains(marker.as_str()))
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn complete(&self, request: &ChatRequest) -> std::result::Result<String, CompletionFailure> {
        let body = CompletionBody {
            model: &request.model,
            messages: [Message {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(site) = &self.site_url {
            builder = builder.header("HTTP-Referer", site);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                CompletionFailure::Timeout
            } else {
                CompletionFailure::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CompletionFailure::Timeout
            } else {
                CompletionFailure::Transport(e.to_string())
            }
        })?;

        if !status.is_success() {
            if self.signals_no_capacity(&text) {
                return Err(CompletionFailure::NoCapacity(excerpt(&text, 200)));
            }
            let kind = classify_http_failure(status.as_u16(), &text);
            self.notifier.notify(
                kind,
                &format!(
                    "model {} returned HTTP {}: {}",
                    request.model,
                    status.as_u16(),
                    excerpt(&text, 200)
                ),
            );
            return Err(CompletionFailure::Http {
                status: status.as_u16(),
                body: excerpt(&text, 200),
            });
        }

        let parsed: CompletionResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(e) => {
                if self.signals_no_capacity(&text) {
                    return Err(CompletionFailure::NoCapacity(excerpt(&text, 200)));
                }
                return Err(CompletionFailure::Malformed(e.to_string()));
            }
        };

        if parsed.choices.is_empty() {
            debug!(model = %request.model, "Completion has no choices");
            if self.signals_no_capacity(&text) {
                return Err(CompletionFailure::NoCapacity(excerpt(&text, 200)));
            }
            return Err(CompletionFailure::Malformed("no choices".to_string()));
        }

        parsed.first_text().ok_or(CompletionFailure::Empty)
    }
}
