use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Translator;
use crate::error::TranslateError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TARGET_LANGUAGE: &str = "Chinese";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatTranslatorConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub target_language: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for ChatTranslatorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            target_language: DEFAULT_TARGET_LANGUAGE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl ChatTranslatorConfig {
    pub fn system_prompt(&self) -> String {
        format!(
            "Translate the following text into {}. Output only the translation:",
            self.target_language
        )
    }

    /// Resolves `path` against the base URL, which is treated as a directory.
    pub fn endpoint(&self, path: &str) -> Result<Url, TranslateError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(TranslateError::not_configured("base_url"));
        }
        let mut normalized = base.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Url::parse(&normalized)
            .and_then(|url| url.join(path))
            .map_err(|_| TranslateError::InvalidEndpoint {
                value: base.to_string(),
            })
    }

    fn bearer(&self) -> Result<&str, TranslateError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            Err(TranslateError::not_configured("api_key"))
        } else {
            Ok(key)
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    id: String,
}

pub(crate) fn build_request(config: &ChatTranslatorConfig, text: &str) -> ChatRequest {
    ChatRequest {
        model: config.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: config.system_prompt(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: text.to_string(),
            },
        ],
        temperature: config.temperature,
    }
}

/// Extracts `choices[0].message.content`, trimmed.
pub(crate) fn parse_completion(body: &str) -> Result<String, TranslateError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .unwrap_or_default();
    if content.is_empty() {
        return Err(TranslateError::EmptyResponse);
    }
    Ok(content)
}

pub(crate) fn parse_models(body: &str) -> Result<Vec<String>, TranslateError> {
    let response: ModelsResponse = serde_json::from_str(body)?;
    Ok(response.data.into_iter().map(|model| model.id).collect())
}

/// Translator backed by an OpenAI-compatible chat-completions endpoint.
pub struct ChatTranslator {
    config: ChatTranslatorConfig,
    http_client: reqwest::Client,
}

impl ChatTranslator {
    pub fn new(config: ChatTranslatorConfig) -> Result<Self, TranslateError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ChatTranslatorConfig {
        &self.config
    }

    /// Lists model ids; doubles as a connection test.
    pub async fn list_models(&self) -> Result<Vec<String>, TranslateError> {
        let url = self.config.endpoint("models")?;
        let key = self.config.bearer()?;
        let body = self
            .bounded(async {
                let response = self.http_client.get(url).bearer_auth(key).send().await?;
                read_body(response).await
            })
            .await?;
        parse_models(&body)
    }

    async fn bounded<F>(&self, request: F) -> Result<String, TranslateError>
    where
        F: std::future::Future<Output = Result<String, TranslateError>>,
    {
        match tokio::time::timeout(self.config.timeout, request).await {
            Ok(Err(TranslateError::Http(err))) if err.is_timeout() => Err(TranslateError::Timeout {
                after: self.config.timeout,
            }),
            Ok(result) => result,
            Err(_) => Err(TranslateError::Timeout {
                after: self.config.timeout,
            }),
        }
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, TranslateError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TranslateError::Status {
            code: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[async_trait]
impl Translator for ChatTranslator {
    fn name(&self) -> &'static str {
        "chat-completions"
    }

    async fn translate(&self, text: &str) -> Result<String, TranslateError> {
        let url = self.config.endpoint("chat/completions")?;
        let key = self.config.bearer()?;
        let payload = build_request(&self.config, text);
        let started = Instant::now();

        let result = self
            .bounded(async {
                let response = self
                    .http_client
                    .post(url)
                    .bearer_auth(key)
                    .json(&payload)
                    .send()
                    .await?;
                read_body(response).await
            })
            .await
            .and_then(|body| parse_completion(&body));

        match &result {
            Ok(translated) => debug!(
                model = %self.config.model,
                chars = text.chars().count(),
                translated_chars = translated.chars().count(),
                elapsed = ?started.elapsed(),
                "translation completed"
            ),
            Err(err) => warn!(
                model = %self.config.model,
                elapsed = ?started.elapsed(),
                error = %err,
                "translation failed"
            ),
        }
        result
    }
}
