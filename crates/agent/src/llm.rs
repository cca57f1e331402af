use std::time::Duration;

use async_trait::async_trait;
use cartline_core::config::{LlmConfig, LlmProvider};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm client is not configured: {0}")]
    NotConfigured(String),
    #[error("llm request failed: {0}")]
    Transport(String),
    #[error("llm request timed out: {0}")]
    Timeout(String),
    #[error("llm provider returned status {status}")]
    Status { status: u16 },
    #[error("llm response was malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Completion client for the OpenAI, Anthropic and Ollama HTTP APIs.
pub struct HttpLlmClient {
    client: Client,
    provider: LlmProvider,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    temperature: f32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        if config.provider != LlmProvider::Ollama && config.api_key.is_none() {
            return Err(LlmError::NotConfigured("llm.api_key".to_owned()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|error| LlmError::NotConfigured(error.to_string()))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(config.provider).to_owned())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            client,
            provider: config.provider,
            base_url,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn endpoint(&self) -> String {
        match self.provider {
            LlmProvider::OpenAi => format!("{}/chat/completions", self.base_url),
            LlmProvider::Anthropic => format!("{}/v1/messages", self.base_url),
            LlmProvider::Ollama => format!("{}/api/generate", self.base_url),
        }
    }

    fn request_body(&self, prompt: &str) -> Value {
        match self.provider {
            LlmProvider::OpenAi => json!({
                "model": self.model,
                "temperature": self.temperature,
                "messages": [{ "role": "user", "content": prompt }],
            }),
            LlmProvider::Anthropic => json!({
                "model": self.model,
                "max_tokens": 1024,
                "temperature": self.temperature,
                "messages": [{ "role": "user", "content": prompt }],
            }),
            LlmProvider::Ollama => json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
                "options": { "temperature": self.temperature },
            }),
        }
    }
}

fn default_base_url(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::OpenAi => "https://api.openai.com/v1",
        LlmProvider::Anthropic => "https://api.anthropic.com",
        LlmProvider::Ollama => "http://localhost:11434",
    }
}

fn extract_text(provider: LlmProvider, payload: &Value) -> Option<String> {
    let text = match provider {
        LlmProvider::OpenAi => payload.pointer("/choices/0/message/content"),
        LlmProvider::Anthropic => payload.pointer("/content/0/text"),
        LlmProvider::Ollama => payload.get("response"),
    }?;
    text.as_str().map(str::to_owned)
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut request = self.client.post(self.endpoint()).json(&self.request_body(prompt));
        request = match (self.provider, &self.api_key) {
            (LlmProvider::OpenAi, Some(key)) => request.bearer_auth(key.expose_secret()),
            (LlmProvider::Anthropic, Some(key)) => request
                .header("x-api-key", key.expose_secret())
                .header("anthropic-version", "2023-06-01"),
            _ => request,
        };

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                LlmError::Timeout(error.to_string())
            } else {
                LlmError::Transport(error.to_string())
            }
        })?;
        if !response.status().is_success() {
            return Err(LlmError::Status { status: response.status().as_u16() });
        }

        let payload: Value =
            response.json().await.map_err(|error| LlmError::Malformed(error.to_string()))?;
        extract_text(self.provider, &payload)
            .ok_or_else(|| LlmError::Malformed("completion text missing".to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use cartline_core::config::{AppConfig, LlmProvider};
    use serde_json::json;

    use super::{extract_text, HttpLlmClient, LlmError};

    #[test]
    fn hosted_providers_require_an_api_key() {
        let config = AppConfig::default();
        let result = HttpLlmClient::from_config(&config.llm);
        assert!(matches!(result, Err(LlmError::NotConfigured(ref key)) if key == "llm.api_key"));
    }

    #[test]
    fn ollama_needs_no_key_and_uses_local_endpoint() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Ollama;

        let client = HttpLlmClient::from_config(&config.llm).expect("ollama client");
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
        assert_eq!(client.request_body("hi")["stream"], json!(false));
    }

    #[test]
    fn completion_text_is_read_per_provider() {
        let openai = json!({ "choices": [{ "message": { "content": "Action: search_products" } }] });
        let anthropic = json!({ "content": [{ "type": "text", "text": "Final Answer: hi" }] });
        let ollama = json!({ "response": "ok" });

        assert_eq!(
            extract_text(LlmProvider::OpenAi, &openai).as_deref(),
            Some("Action: search_products")
        );
        assert_eq!(extract_text(LlmProvider::Anthropic, &anthropic).as_deref(), Some("Final Answer: hi"));
        assert_eq!(extract_text(LlmProvider::Ollama, &ollama).as_deref(), Some("ok"));
        assert_eq!(extract_text(LlmProvider::OpenAi, &json!({})), None);
    }
}
