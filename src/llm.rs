//! Chat-model access for the generators.
//!
//! Every configured provider speaks the OpenAI chat-completions protocol
//! (Groq and OpenAI both do), so one client type covers them all.
//! [`select_chat_model`] walks `[[llm.providers]]` in order and picks the
//! first entry whose API key resolved.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{LlmConfig, LlmProviderConfig};
use crate::error::RagError;

/// A prompt-in, text-out language model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider and model, e.g. `"groq/llama3-70b-8192"`. Used in logs.
    fn describe(&self) -> String;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompatibleChat {
    client: Client,
    name: String,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleChat {
    pub fn new(provider: &LlmProviderConfig, timeout_secs: u64) -> Result<Self, RagError> {
        let api_key = provider.api_key.clone().ok_or_else(|| {
            RagError::Configuration(format!(
                "llm provider '{}' has no API key ({} is unset)",
                provider.name, provider.api_key_env
            ))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RagError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            name: provider.name.clone(),
            endpoint: format!(
                "{}/chat/completions",
                provider.base_url.trim_end_matches('/')
            ),
            api_key,
            model: provider.model.clone(),
            temperature: provider.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleChat {
    fn describe(&self) -> String {
        format!("{}/{}", self.name, self.model)
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{} returned {}: {}", self.describe(), status, body);
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("{} returned no completion", self.describe()))
    }
}

/// Pick the first provider in `config.providers` with a resolved API key.
///
/// # Errors
///
/// [`RagError::Configuration`] when no provider has a credential.
pub fn select_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, RagError> {
    let provider = config
        .providers
        .iter()
        .find(|p| p.api_key.is_some())
        .ok_or_else(|| {
            let envs: Vec<&str> = config
                .providers
                .iter()
                .map(|p| p.api_key_env.as_str())
                .collect();
            RagError::Configuration(format!(
                "no chat model credential found; set one of: {}",
                envs.join(", ")
            ))
        })?;

    let model = OpenAiCompatibleChat::new(provider, config.timeout_secs)?;
    tracing::debug!(model = %model.describe(), "selected chat model");
    Ok(Arc::new(model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_keys(groq: Option<&str>, openai: Option<&str>) -> LlmConfig {
        let mut config = LlmConfig::default();
        config.providers[0].api_key = groq.map(str::to_string);
        config.providers[1].api_key = openai.map(str::to_string);
        config
    }

    #[test]
    fn test_prefers_first_provider() {
        let model = select_chat_model(&with_keys(Some("gsk"), Some("sk"))).unwrap();
        assert_eq!(model.describe(), "groq/llama3-70b-8192");
    }

    #[test]
    fn test_falls_back_to_next_provider() {
        let model = select_chat_model(&with_keys(None, Some("sk"))).unwrap();
        assert_eq!(model.describe(), "openai/gpt-4o");
    }

    #[test]
    fn test_no_credentials_is_configuration_error() {
        let err = select_chat_model(&with_keys(None, None)).err().unwrap();
        match err {
            RagError::Configuration(msg) => {
                assert!(msg.contains("GROQ_API_KEY"));
                assert!(msg.contains("OPENAI_API_KEY"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let mut provider = LlmConfig::default().providers.remove(0);
        provider.base_url = "http://localhost:9999/v1/".to_string();
        provider.api_key = Some("k".to_string());
        let chat = OpenAiCompatibleChat::new(&provider, 5).unwrap();
        assert_eq!(chat.endpoint, "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"| Test Case ID |"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("| Test Case ID |")
        );
    }
}
