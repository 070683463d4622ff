use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::error::{AppError, ProviderError, Result};

const TEMPERATURE: f64 = 0.1;
const MAX_TOKENS: u32 = 1000;

/// Anything that can turn a single prompt into completion text.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError>;
}

#[async_trait]
impl<T: Completion + ?Sized> Completion for Arc<T> {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        (**self).complete(prompt).await
    }
}

#[derive(Debug)]
enum AuthScheme {
    None,
    Bearer,
    Header(&'static str),
}

#[derive(Debug)]
enum PathStep {
    Key(&'static str),
    Index(usize),
}

/// Everything that distinguishes one backend from another.
struct Backend {
    id: &'static str,
    /// May contain `{model}`.
    endpoint: &'static str,
    default_model: &'static str,
    auth: AuthScheme,
    extra_headers: &'static [(&'static str, &'static str)],
    envelope: fn(model: &str, prompt: &str) -> Value,
    completion_path: &'static [PathStep],
}

fn chat_envelope(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS,
        "stream": false,
    })
}

fn messages_envelope(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": MAX_TOKENS,
        "temperature": TEMPERATURE,
        "messages": [{ "role": "user", "content": prompt }],
        "stream": false,
    })
}

fn generate_envelope(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": { "temperature": TEMPERATURE },
    })
}

fn inference_envelope(_model: &str, prompt: &str) -> Value {
    json!({
        "inputs": prompt,
        "parameters": { "max_new_tokens": MAX_TOKENS, "temperature": TEMPERATURE },
    })
}

static BACKENDS: &[Backend] = &[
    Backend {
        id: "openai",
        endpoint: "https://api.openai.com/v1/chat/completions",
        default_model: "gpt-3.5-turbo",
        auth: AuthScheme::Bearer,
        extra_headers: &[],
        envelope: chat_envelope,
        completion_path: &[
            PathStep::Key("choices"),
            PathStep::Index(0),
            PathStep::Key("message"),
            PathStep::Key("content"),
        ],
    },
    Backend {
        id: "anthropic",
        endpoint: "https://api.anthropic.com/v1/messages",
        default_model: "claude-3-haiku-20240307",
        auth: AuthScheme::Header("x-api-key"),
        extra_headers: &[("anthropic-version", "2023-06-01")],
        envelope: messages_envelope,
        completion_path: &[PathStep::Key("content"), PathStep::Index(0), PathStep::Key("text")],
    },
    Backend {
        id: "ollama",
        endpoint: "http://localhost:11434/api/generate",
        default_model: "llama2",
        auth: AuthScheme::None,
        extra_headers: &[],
        envelope: generate_envelope,
        completion_path: &[PathStep::Key("response")],
    },
    Backend {
        id: "huggingface",
        endpoint: "https://api-inference.huggingface.co/models/{model}",
        default_model: "microsoft/DialoGPT-medium",
        auth: AuthScheme::Bearer,
        extra_headers: &[],
        envelope: inference_envelope,
        completion_path: &[PathStep::Index(0), PathStep::Key("generated_text")],
    },
];

/// Identifiers accepted by [`Provider::new`].
pub fn backend_ids() -> impl Iterator<Item = &'static str> {
    BACKENDS.iter().map(|b| b.id)
}

/// Construction options for a [`Provider`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            endpoint: None,
            timeout: Duration::from_secs(60),
        }
    }
}

pub struct Provider {
    client: Client,
    backend: &'static Backend,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("backend", &self.backend.id)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Provider {
    /// Select a backend by identifier. Fails immediately for unknown identifiers,
    /// missing credentials or an invalid endpoint override.
    pub fn new(backend_id: &str, settings: ProviderSettings) -> Result<Self> {
        let wanted = backend_id.trim().to_ascii_lowercase();
        let backend = BACKENDS
            .iter()
            .find(|b| b.id == wanted)
            .ok_or_else(|| AppError::UnknownProvider(backend_id.to_string()))?;

        let api_key = settings.api_key.filter(|k| !k.trim().is_empty());
        if api_key.is_none() && !matches!(backend.auth, AuthScheme::None) {
            return Err(AppError::Config(format!(
                "backend '{}' requires an API key",
                backend.id
            )));
        }

        let model = settings
            .model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| backend.default_model.to_string());

        let endpoint = match settings.endpoint {
            Some(endpoint) => {
                Url::parse(&endpoint).map_err(|e| {
                    AppError::Config(format!("invalid endpoint '{}': {}", endpoint, e))
                })?;
                endpoint
            }
            None => backend.endpoint.replace("{model}", &model),
        };

        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            backend,
            endpoint,
            model,
            api_key,
        })
    }

    pub fn backend_id(&self) -> &'static str {
        self.backend.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Completion for Provider {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, ProviderError> {
        let body = (self.backend.envelope)(&self.model, prompt);

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = match self.backend.auth {
                AuthScheme::None => request,
                AuthScheme::Bearer => request.bearer_auth(key),
                AuthScheme::Header(name) => request.header(name, key),
            };
        }
        for (name, value) in self.backend.extra_headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let payload: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::MalformedBody(format!("not JSON: {}", e)))?;

        extract_completion(&payload, self.backend.completion_path)
    }
}

fn extract_completion(
    payload: &Value,
    path: &[PathStep],
) -> std::result::Result<String, ProviderError> {
    let mut cursor = payload;
    for step in path {
        let next = match step {
            PathStep::Key(key) => cursor.get(*key),
            PathStep::Index(index) => cursor.get(*index),
        };
        cursor = next.ok_or_else(|| {
            ProviderError::MalformedBody(format!("missing {}", render_path(path)))
        })?;
    }
    cursor
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::MalformedBody(format!("{} is not text", render_path(path))))
}

fn render_path(path: &[PathStep]) -> String {
    let mut rendered = String::new();
    for step in path {
        match step {
            PathStep::Key(key) => {
                if !rendered.is_empty() {
                    rendered.push('.');
                }
                rendered.push_str(key);
            }
            PathStep::Index(index) => rendered.push_str(&format!("[{}]", index)),
        }
    }
    rendered
}
