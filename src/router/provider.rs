//! Reasoning-call collaborator: the trait seam and its HTTP implementation.
//!
//! The router never talks to the network directly; it goes through
//! [`ReasoningProvider`], which executes exactly one request per `invoke`.
//! Retry, fallback, and timeout policy all live in the router so that test
//! providers stay trivial.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::Effort;
use crate::config::{ProviderConfig, RequestConfig};
use crate::error::{ProviderError, ProviderResult};

/// A single reasoning request handed to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct InvokeRequest {
    /// Optional system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The user-facing prompt.
    pub prompt: String,
    /// Response token ceiling.
    pub max_tokens: u32,
    /// Reasoning-depth control. Mutually exclusive with `temperature`;
    /// the router rejects conflicting payloads before they reach here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<Effort>,
    /// Sampling randomness control.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl InvokeRequest {
    /// Create a request with just a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 2000,
            effort: None,
            temperature: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the response token ceiling.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the reasoning effort.
    pub fn with_effort(mut self, effort: Effort) -> Self {
        self.effort = Some(effort);
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The provider's answer to one request.
#[derive(Debug, Clone)]
pub struct InvokeResponse {
    /// Generated answer text.
    pub text: String,
    /// The concrete model variant that served the request. May be a dated
    /// variant of the requested identifier.
    pub model: String,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
}

/// Outbound reasoning-call collaborator.
///
/// One `invoke` is one upstream request; implementations must not retry
/// internally.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Execute a single reasoning call against the given concrete model.
    async fn invoke(&self, model: &str, request: InvokeRequest) -> ProviderResult<InvokeResponse>;
}

/// HTTP-backed provider.
#[derive(Clone)]
pub struct HttpProvider {
    client: Client,
    base_url: String,
    api_key: String,
    timeout_ms: u64,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    prompt: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    effort: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompleteResponse {
    text: String,
    model: Option<String>,
    usage: Option<UsageBody>,
}

#[derive(Deserialize)]
struct UsageBody {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl HttpProvider {
    /// Create a new HTTP provider.
    pub fn new(config: &ProviderConfig, request_config: &RequestConfig) -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ProviderError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ReasoningProvider for HttpProvider {
    async fn invoke(&self, model: &str, request: InvokeRequest) -> ProviderResult<InvokeResponse> {
        let url = format!("{}/v1/complete", self.base_url);

        debug!(model = %model, prompt_len = request.prompt.len(), "Invoking reasoning call");

        let body = CompleteRequest {
            model,
            system: request.system.as_deref(),
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            effort: request.effort.map(|e| e.as_str()),
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Auth { message },
                408 => ProviderError::Timeout {
                    timeout_ms: self.timeout_ms,
                },
                429 => ProviderError::RateLimited { message },
                status if status >= 500 => ProviderError::Upstream { status, message },
                _ => ProviderError::Malformed { message },
            });
        }

        let parsed: CompleteResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        let usage = parsed.usage.unwrap_or(UsageBody {
            input_tokens: None,
            output_tokens: None,
        });

        Ok(InvokeResponse {
            text: parsed.text,
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
        })
    }
}
