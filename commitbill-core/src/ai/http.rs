//! HTTP-backed text generation (Ollama, Claude, OpenAI).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;

use crate::config::{AiBackendConfig, AiProvider};
use crate::error::{Error, Result};

use super::{ai_error, TextGenerator};

const MAX_TOKENS: u32 = 2000;

/// Text generator calling an LLM provider's HTTP API
pub struct HttpTextGenerator {
    model: String,
    provider: AiProvider,
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpTextGenerator {
    pub fn new(config: &AiBackendConfig) -> Result<Self> {
        if config.provider == AiProvider::Command {
            return Err(Error::Config(
                "ai.provider = \"command\" is not an HTTP provider".to_string(),
            ));
        }

        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config("ai.model is required for HTTP providers".to_string()))?;
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());

        if matches!(config.provider, AiProvider::Claude | AiProvider::OpenAI)
            && config.api_key.is_none()
        {
            return Err(Error::Config(
                "ai.api_key (or provider env var) is required".to_string(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model,
            provider: config.provider,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    async fn post(
        &self,
        name: &str,
        url: String,
        headers: HeaderMap,
        body: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| ai_error(&format!("{name} request failed"), e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ai_error(&format!("{name} read body failed"), e))?;
        if !status.is_success() {
            return Err(Error::Ai(format!(
                "{} returned {}: {}",
                name,
                status.as_u16(),
                text
            )));
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn api_key_header(&self, prefix: &str) -> Result<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}{}",
            prefix,
            self.api_key.as_deref().unwrap_or_default()
        ))
        .map_err(|e| ai_error("invalid api key header", e))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self.provider {
            AiProvider::Ollama => {
                let json = self
                    .post(
                        "ollama",
                        format!("{}/api/generate", self.endpoint),
                        headers,
                        json!({
                            "model": self.model,
                            "prompt": prompt,
                            "stream": false,
                        }),
                    )
                    .await?;
                json.get("response")
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .ok_or_else(|| {
                        Error::Ai("ollama response missing string field `response`".to_string())
                    })
            }
            AiProvider::Claude => {
                headers.insert("x-api-key", self.api_key_header("")?);
                headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

                let json = self
                    .post(
                        "claude",
                        format!("{}/v1/messages", self.endpoint),
                        headers,
                        json!({
                            "model": self.model,
                            "max_tokens": MAX_TOKENS,
                            "messages": [{ "role": "user", "content": prompt }],
                        }),
                    )
                    .await?;
                json.get("content")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.get("text"))
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .ok_or_else(|| Error::Ai("claude response missing content[0].text".to_string()))
            }
            AiProvider::OpenAI => {
                headers.insert(AUTHORIZATION, self.api_key_header("Bearer ")?);

                let json = self
                    .post(
                        "openai",
                        format!("{}/v1/chat/completions", self.endpoint),
                        headers,
                        json!({
                            "model": self.model,
                            "messages": [{ "role": "user", "content": prompt }],
                        }),
                    )
                    .await?;
                json.get("choices")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.get("message"))
                    .and_then(|v| v.get("content"))
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .ok_or_else(|| {
                        Error::Ai("openai response missing choices[0].message.content".to_string())
                    })
            }
            AiProvider::Command => Err(Error::Ai(
                "command provider cannot be served over HTTP".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(provider: AiProvider, api_key: Option<&str>) -> AiBackendConfig {
        AiBackendConfig {
            provider,
            command: "claude".to_string(),
            args: vec![],
            model: Some("test-model".to_string()),
            endpoint: None,
            api_key: api_key.map(ToString::to_string),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let generator = HttpTextGenerator::new(&backend(AiProvider::Ollama, None)).unwrap();
        assert_eq!(generator.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_hosted_providers_require_key() {
        assert!(HttpTextGenerator::new(&backend(AiProvider::Claude, None)).is_err());
        assert!(HttpTextGenerator::new(&backend(AiProvider::OpenAI, Some("sk"))).is_ok());
    }

    #[test]
    fn test_model_required() {
        let mut config = backend(AiProvider::Ollama, None);
        config.model = None;
        assert!(matches!(
            HttpTextGenerator::new(&config),
            Err(Error::Config(_))
        ));
    }
}
