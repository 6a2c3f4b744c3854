//! HTTP completion adapter.
//!
//! Speaks the OpenAI chat-completions dialect (official, Azure and compatible
//! endpoints) and the Anthropic messages dialect. One request per call, no
//! retries: the caller owns retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{ProviderError, ProviderResult};
use crate::provider::{CompletionProvider, CompletionRequest, SamplingConfig};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const AZURE_API_VERSION: &str = "2024-02-01";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MAX_TOKENS: u32 = 4096;

/// Completion provider backed by a remote HTTP API.
pub struct HttpCompletionProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HttpCompletionProvider {
    /// Create an adapter; fails when the configuration is incomplete.
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::InvalidConfig(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// URL the request for `model` is sent to.
    pub fn endpoint_url(&self, model: &str) -> String {
        let base = self
            .config
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'));
        match (self.config.provider, base) {
            (ProviderKind::OpenAI, None) => OPENAI_URL.to_string(),
            (ProviderKind::OpenAI | ProviderKind::Custom, Some(base)) => {
                format!("{}/chat/completions", base)
            }
            (ProviderKind::Azure, Some(base)) => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                base, model, AZURE_API_VERSION
            ),
            (ProviderKind::Anthropic, None) => ANTHROPIC_URL.to_string(),
            (ProviderKind::Anthropic, Some(base)) => format!("{}/messages", base),
            // validate() rejects these at construction
            (ProviderKind::Azure | ProviderKind::Custom, None) => OPENAI_URL.to_string(),
        }
    }

    async fn send(&self, url: &str, body: &impl Serialize) -> ProviderResult<reqwest::Response> {
        let builder = self.client.post(url).header("Content-Type", "application/json");
        let builder = match self.config.provider {
            ProviderKind::OpenAI | ProviderKind::Custom => {
                builder.header("Authorization", format!("Bearer {}", self.config.api_key))
            }
            ProviderKind::Azure => builder.header("api-key", &self.config.api_key),
            ProviderKind::Anthropic => builder
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
        };

        let response = builder.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn complete_openai(&self, model: &str, prompt: String, sampling: &SamplingConfig) -> ProviderResult<String> {
        let request = build_openai_request(model, prompt, sampling);
        let response = self.send(&self.endpoint_url(model), &request).await?;
        let body: OpenAIResponse = response.json().await?;
        extract_openai_content(body)
    }

    async fn complete_anthropic(&self, model: &str, prompt: String, sampling: &SamplingConfig) -> ProviderResult<String> {
        let request = build_anthropic_request(model, prompt, sampling);
        let response = self.send(&self.endpoint_url(model), &request).await?;
        let body: AnthropicResponse = response.json().await?;
        extract_anthropic_content(body)
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        let prompt = request.render()?;
        let model = request.model.as_deref().unwrap_or(&self.config.model);

        info!(
            "Requesting completion from {:?} model {} ({} prompt chars)",
            self.config.provider,
            model,
            prompt.len()
        );

        let content = match self.config.provider {
            ProviderKind::Anthropic => self.complete_anthropic(model, prompt, &request.sampling).await?,
            _ => self.complete_openai(model, prompt, &request.sampling).await?,
        };

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }
}

fn build_openai_request(model: &str, prompt: String, sampling: &SamplingConfig) -> OpenAIRequest {
    OpenAIRequest {
        model: model.to_string(),
        messages: vec![OpenAIMessage {
            role: "user".to_string(),
            content: prompt,
        }],
        max_tokens: sampling.max_tokens,
        temperature: sampling.temperature,
        top_p: sampling.top_p,
    }
}

fn build_anthropic_request(model: &str, prompt: String, sampling: &SamplingConfig) -> AnthropicRequest {
    AnthropicRequest {
        model: model.to_string(),
        max_tokens: sampling.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
        messages: vec![AnthropicMessage {
            role: "user".to_string(),
            content: prompt,
        }],
        temperature: sampling.temperature,
        top_p: sampling.top_p,
    }
}

fn extract_openai_content(body: OpenAIResponse) -> ProviderResult<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".to_string()))
}

fn extract_anthropic_content(body: AnthropicResponse) -> ProviderResult<String> {
    let text: String = body
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect();
    if text.is_empty() {
        return Err(ProviderError::MalformedResponse(
            "no text content in response".to_string(),
        ));
    }
    Ok(text)
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

// Anthropic API types
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampling() -> SamplingConfig {
        SamplingConfig::new().max_tokens(2000).temperature(0.7).top_p(0.9)
    }

    #[test]
    fn test_endpoint_urls() {
        let openai = HttpCompletionProvider::new(ProviderConfig::new(ProviderKind::OpenAI, "k")).unwrap();
        assert_eq!(openai.endpoint_url("gpt-4"), OPENAI_URL);

        let custom = HttpCompletionProvider::new(
            ProviderConfig::new(ProviderKind::Custom, "k").with_endpoint("http://localhost:8000/v1/"),
        )
        .unwrap();
        assert_eq!(custom.endpoint_url("qwen"), "http://localhost:8000/v1/chat/completions");

        let azure = HttpCompletionProvider::new(
            ProviderConfig::new(ProviderKind::Azure, "k").with_endpoint("https://acme.openai.azure.com"),
        )
        .unwrap();
        assert_eq!(
            azure.endpoint_url("gpt-4"),
            "https://acme.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-02-01"
        );

        let anthropic = HttpCompletionProvider::new(ProviderConfig::new(ProviderKind::Anthropic, "k")).unwrap();
        assert_eq!(anthropic.endpoint_url("claude"), ANTHROPIC_URL);
    }

    #[test]
    fn test_new_rejects_incomplete_config() {
        assert!(HttpCompletionProvider::new(ProviderConfig::new(ProviderKind::Azure, "k")).is_err());
        assert!(HttpCompletionProvider::new(ProviderConfig::new(ProviderKind::OpenAI, "")).is_err());
    }

    #[test]
    fn test_openai_request_body() {
        let body = serde_json::to_value(build_openai_request("gpt-4", "hi".into(), &sampling())).unwrap();
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert_eq!(body["max_tokens"], 2000);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((body["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);

        let body = serde_json::to_value(build_openai_request("gpt-4", "hi".into(), &SamplingConfig::new())).unwrap();
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_anthropic_request_defaults_max_tokens() {
        let body = serde_json::to_value(build_anthropic_request("claude", "hi".into(), &SamplingConfig::new())).unwrap();
        assert_eq!(body["max_tokens"], ANTHROPIC_DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_extract_openai_content() {
        let body: OpenAIResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"<Grid/>"}}]}"#).unwrap();
        assert_eq!(extract_openai_content(body).unwrap(), "<Grid/>");

        let body: OpenAIResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_openai_content(body), Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_extract_anthropic_content() {
        let body: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"<Grid>"},{"type":"text","text":"</Grid>"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_anthropic_content(body).unwrap(), "<Grid></Grid>");

        let body: AnthropicResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(extract_anthropic_content(body).is_err());
    }

    #[tokio::test]
    async fn test_unresolved_placeholder_fails_before_network() {
        let provider = HttpCompletionProvider::new(
            ProviderConfig::new(ProviderKind::Custom, "k").with_endpoint("http://127.0.0.1:9"),
        )
        .unwrap();
        let request = CompletionRequest::new("{{missing}}");
        assert_eq!(
            provider.complete(&request).await.unwrap_err(),
            ProviderError::UnresolvedPlaceholder("missing".to_string())
        );
    }
}
