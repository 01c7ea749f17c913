//! HTTP completion client behind the `LlmClient` trait consumed by the
//! intent extractor. Supports the providers named in `llm.provider`; the
//! extractor degrades to pattern parsing whenever this client errors, so
//! failures here are never fatal to a request.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::{json, Value};

use arcpay_agent::LlmClient;
use arcpay_core::config::{LlmConfig, LlmProvider};

pub struct HttpLlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpLlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_ref()
            .map(|api_key| api_key.expose_secret())
            .ok_or_else(|| anyhow!("llm.api_key is not configured"))
    }

    async fn request_completion(&self, prompt: &str) -> Result<String> {
        match self.config.provider {
            LlmProvider::Ollama => {
                let base_url = self
                    .config
                    .base_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("llm.base_url is not configured"))?;
                let response: Value = self
                    .client
                    .post(format!("{}/api/generate", base_url.trim_end_matches('/')))
                    .json(&json!({
                        "model": self.config.model,
                        "prompt": prompt,
                        "stream": false,
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                parse_ollama_response(&response)
            }
            LlmProvider::OpenAi => {
                let base_url =
                    self.config.base_url.as_deref().unwrap_or("https://api.openai.com");
                let response: Value = self
                    .client
                    .post(format!("{}/v1/chat/completions", base_url.trim_end_matches('/')))
                    .bearer_auth(self.api_key()?)
                    .json(&json!({
                        "model": self.config.model,
                        "messages": [{"role": "user", "content": prompt}],
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                parse_openai_response(&response)
            }
            LlmProvider::Anthropic => {
                let base_url =
                    self.config.base_url.as_deref().unwrap_or("https://api.anthropic.com");
                let response: Value = self
                    .client
                    .post(format!("{}/v1/messages", base_url.trim_end_matches('/')))
                    .header("x-api-key", self.api_key()?)
                    .header("anthropic-version", "2023-06-01")
                    .json(&json!({
                        "model": self.config.model,
                        "max_tokens": 1024,
                        "messages": [{"role": "user", "content": prompt}],
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                parse_anthropic_response(&response)
            }
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = anyhow!("no completion attempts made");
        for attempt in 0..=self.config.max_retries {
            match self.request_completion(prompt).await {
                Ok(completion) => return Ok(completion),
                Err(attempt_error) => {
                    last_error = attempt_error.context(format!("completion attempt {attempt}"));
                }
            }
        }
        Err(last_error)
    }
}

fn parse_ollama_response(response: &Value) -> Result<String> {
    response["response"]
        .as_str()
        .map(str::to_owned)
        .context("ollama response missing `response` field")
}

fn parse_openai_response(response: &Value) -> Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_owned)
        .context("openai response missing `choices[0].message.content`")
}

fn parse_anthropic_response(response: &Value) -> Result<String> {
    response["content"][0]["text"]
        .as_str()
        .map(str::to_owned)
        .context("anthropic response missing `content[0].text`")
}
