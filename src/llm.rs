//! Language-model capability and its providers.
//!
//! | Config Value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"openai"` | [`OpenAIChat`] | `{url}/chat/completions` (default url `https://api.openai.com/v1`) |
//! | `"ollama"` | [`OllamaGenerate`] | `{url}/api/generate`, non-streaming |
//! | `"disabled"` | [`DisabledModel`] | none; every call fails |
//!
//! Any OpenAI-compatible server (vLLM, llama.cpp server, Ollama's `/v1`)
//! works through the `openai` provider by pointing `llm.url` at it.
//! Both HTTP providers retry 429/5xx/network errors with exponential backoff.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::http::{self, JsonEndpoint};

/// Text-in, text-out model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> Result<String> {
        bail!("Language model provider is disabled (set [llm] provider in the config)")
    }
}

/// OpenAI-compatible chat completions.
pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for OpenAI provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        // Local servers usually accept any key, so a missing variable is not fatal.
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::debug!(var = %config.api_key_env, "no API key in environment");
        }

        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let endpoint = JsonEndpoint {
            client: &self.client,
            url: format!("{}/chat/completions", self.url),
            bearer: self.api_key.as_deref(),
            service: "OpenAI-compatible",
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });
        parse_chat_response(&endpoint.post(&body).await?)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Ollama's native completion endpoint.
pub struct OllamaGenerate {
    model: String,
    url: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaGenerate {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url: url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaGenerate {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let endpoint = JsonEndpoint {
            client: &self.client,
            url: format!("{}/api/generate", self.url),
            bearer: None,
            service: "Ollama",
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        });
        let json = endpoint.post(&body).await?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing response"))
    }
}

/// Create the configured [`LanguageModel`].
pub fn create_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaGenerate::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
