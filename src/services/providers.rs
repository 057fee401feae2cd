// AI Provider Service
// Chat completion calls against Groq, OpenAI, DeepSeek and Anthropic

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use super::config_store::{AppConfig, ConfigStore};

const GROQ_DEFAULT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEEPSEEK_DEFAULT_URL: &str = "https://api.deepseek.com/chat/completions";
const ANTHROPIC_DEFAULT_URL: &str = "https://api.anthropic.com/v1/messages";

pub const GROQ_DEFAULT_MODEL: &str = "llama3-70b-8192";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
pub const ANTHROPIC_DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

const HTTP_TIMEOUT_SECS: u64 = 80;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Missing content in response")]
    MissingContent,
    #[error("JSON parse error: {0}")]
    JsonError(String),
    #[error("API key not configured")]
    MissingApiKey,
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Provider disabled: {0}")]
    Disabled(String),
}

impl ProviderError {
    /// Whether another attempt could succeed. Configuration problems and
    /// client-side HTTP errors (other than 408/429) will not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(e) => !e.is_builder(),
            ProviderError::ApiError { status, .. } => {
                matches!(*status, 408 | 429) || *status >= 500
            }
            ProviderError::MissingContent | ProviderError::JsonError(_) => true,
            ProviderError::MissingApiKey
            | ProviderError::UnknownProvider(_)
            | ProviderError::Disabled(_) => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSpec {
    pub name: String,
    pub model: String,
}

pub fn parse_provider(spec: &str) -> ProviderSpec {
    let parts: Vec<&str> = spec.splitn(2, ':').collect();
    if parts.len() == 2 {
        ProviderSpec {
            name: parts[0].trim().to_string(),
            model: parts[1].trim().to_string(),
        }
    } else {
        ProviderSpec {
            name: spec.trim().to_string(),
            model: String::new(),
        }
    }
}

pub fn default_model(provider: &str) -> Option<&'static str> {
    match provider {
        "groq" => Some(GROQ_DEFAULT_MODEL),
        "openai" => Some(OPENAI_DEFAULT_MODEL),
        "deepseek" => Some(DEEPSEEK_DEFAULT_MODEL),
        "anthropic" | "claude" => Some(ANTHROPIC_DEFAULT_MODEL),
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: i32,
    temperature: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageResponse>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResult {
    pub content: String,
    pub latency_ms: i64,
}

/// A single prompt for the completion service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: i32,
}

/// Text completion backend consumed by the LLM analyzer.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatResult, ProviderError>;

    /// Label used in logs.
    fn describe(&self) -> String {
        "completion-service".to_string()
    }
}

pub struct ProviderClient {
    client: Client,
    groq_url: String,
    openai_url: String,
    deepseek_url: String,
    anthropic_url: String,
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self::with_client(client)
    }

    pub fn with_proxy(proxy_url: &str) -> Result<Self, ProviderError> {
        let proxy = reqwest::Proxy::all(proxy_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .proxy(proxy)
            .build()?;

        Ok(Self::with_client(client))
    }

    fn with_client(client: Client) -> Self {
        Self {
            client,
            groq_url: env::var("GROQ_API_URL").unwrap_or_else(|_| GROQ_DEFAULT_URL.to_string()),
            openai_url: env::var("OPENAI_API_URL").unwrap_or_else(|_| OPENAI_DEFAULT_URL.to_string()),
            deepseek_url: env::var("DEEPSEEK_API_URL")
                .unwrap_or_else(|_| DEEPSEEK_DEFAULT_URL.to_string()),
            anthropic_url: env::var("ANTHROPIC_API_URL")
                .unwrap_or_else(|_| ANTHROPIC_DEFAULT_URL.to_string()),
        }
    }

    /// Default endpoint for a provider name.
    pub fn endpoint(&self, provider: &str) -> Option<&str> {
        match provider {
            "groq" => Some(&self.groq_url),
            "openai" => Some(&self.openai_url),
            "deepseek" => Some(&self.deepseek_url),
            "anthropic" | "claude" => Some(&self.anthropic_url),
            _ => None,
        }
    }

    /// OpenAI-compatible chat completion (Groq, OpenAI, DeepSeek).
    pub async fn call_chat_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        user: &str,
        max_tokens: i32,
        temperature: f64,
    ) -> Result<ChatResult, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            max_tokens,
            temperature,
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let message = data
            .choices
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.message.as_ref());

        let mut content = message
            .and_then(|m| m.content.clone())
            .filter(|c| !c.trim().is_empty());

        // Reasoning models sometimes leave content empty and put the JSON in reasoning.
        if content.is_none() {
            if let Some(reasoning) = message.and_then(|m| m.reasoning_content.as_deref()) {
                if let Ok(json_re) = Regex::new(r"(?s)\{.*\}") {
                    content = json_re.find(reasoning).map(|m| m.as_str().to_string());
                }
            }
        }

        let content = content.ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }

    pub async fn call_anthropic_api(
        &self,
        url: &str,
        model: &str,
        api_key: &str,
        user: &str,
        max_tokens: i32,
        temperature: f64,
    ) -> Result<ChatResult, ProviderError> {
        #[derive(Serialize)]
        struct AnthropicRequest {
            model: String,
            max_tokens: i32,
            temperature: f64,
            messages: Vec<ChatMessage>,
        }

        #[derive(Deserialize)]
        struct AnthropicResponse {
            content: Option<Vec<AnthropicContent>>,
        }

        #[derive(Deserialize)]
        struct AnthropicContent {
            text: Option<String>,
        }

        let request = AnthropicRequest {
            model: model.to_string(),
            max_tokens,
            temperature,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
        };

        let start = Instant::now();

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as i64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let data: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::JsonError(e.to_string()))?;

        let content = data
            .content
            .and_then(|c| c.into_iter().find_map(|c| c.text))
            .ok_or(ProviderError::MissingContent)?;

        Ok(ChatResult { content, latency_ms })
    }
}

/// A provider client bound to one provider, model, endpoint and key.
pub struct ConfiguredProvider {
    client: ProviderClient,
    spec: ProviderSpec,
    url: Option<String>,
    api_key: Option<String>,
    enabled: bool,
}

impl ConfiguredProvider {
    pub fn new(client: ProviderClient, spec: ProviderSpec, url: Option<String>, api_key: Option<String>) -> Self {
        let spec = if spec.model.is_empty() {
            ProviderSpec {
                model: default_model(&spec.name).unwrap_or_default().to_string(),
                name: spec.name,
            }
        } else {
            spec
        };
        Self {
            client,
            spec,
            url,
            api_key,
            enabled: true,
        }
    }

    /// Resolve provider, endpoint and key from the config and environment.
    pub fn from_config(config: &AppConfig, store: Option<&ConfigStore>) -> Result<Self, ProviderError> {
        let mut spec = parse_provider(&config.provider_spec());
        if spec.model.is_empty() {
            if let Some(model) = config.providers.get(&spec.name).and_then(|p| p.model.clone()) {
                spec.model = model;
            }
        }

        let client = match config.proxy_url() {
            Some(proxy) => ProviderClient::with_proxy(&proxy)?,
            None => ProviderClient::new(),
        };

        let url = config
            .providers
            .get(&spec.name)
            .and_then(|p| p.base_url.clone())
            .filter(|u| !u.trim().is_empty());

        let api_key = get_api_key(&spec.name, store).or_else(|| config.api_keys.get(&spec.name).cloned());
        let enabled = config.providers.get(&spec.name).map(|p| p.enabled).unwrap_or(true);

        Ok(Self::new(client, spec, url, api_key).with_enabled(enabled))
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl CompletionService for ConfiguredProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<ChatResult, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::Disabled(self.spec.name.clone()));
        }
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        let url = match self.url.as_deref() {
            Some(u) => u,
            None => self
                .client
                .endpoint(&self.spec.name)
                .ok_or_else(|| ProviderError::UnknownProvider(self.spec.name.clone()))?,
        };

        debug!(
            provider = %self.spec.name,
            model = %self.spec.model,
            max_tokens = request.max_tokens,
            "provider.request"
        );

        match self.spec.name.as_str() {
            "anthropic" | "claude" => {
                self.client
                    .call_anthropic_api(
                        url,
                        &self.spec.model,
                        api_key,
                        &request.prompt,
                        request.max_tokens,
                        request.temperature,
                    )
                    .await
            }
            "groq" | "openai" | "deepseek" => {
                self.client
                    .call_chat_api(
                        url,
                        &self.spec.model,
                        api_key,
                        &request.prompt,
                        request.max_tokens,
                        request.temperature,
                    )
                    .await
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.spec.name, self.spec.model)
    }
}

/// Get API key from environment or config file
pub fn get_api_key(provider: &str, store: Option<&ConfigStore>) -> Option<String> {
    let env_keys = match provider {
        "groq" => vec!["GROQ_API_KEY", "NAIJAVERIFY_GROQ_API_KEY"],
        "openai" => vec!["OPENAI_API_KEY", "NAIJAVERIFY_OPENAI_API_KEY"],
        "deepseek" => vec!["DEEPSEEK_API_KEY", "NAIJAVERIFY_DEEPSEEK_API_KEY"],
        "anthropic" | "claude" => vec!["ANTHROPIC_API_KEY", "NAIJAVERIFY_ANTHROPIC_API_KEY"],
        _ => vec![],
    };

    for key in env_keys {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    if let Some(store) = store {
        if let Ok(Some(key)) = store.get_api_key(provider) {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Some(key);
            }
        }
    }

    None
}
