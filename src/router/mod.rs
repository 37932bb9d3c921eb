//! Model-tier router with retry, fallback, and family normalization.
//!
//! The router owns the tier ladder (capability/cost descending), executes
//! calls through a [`ReasoningProvider`], retries transient failures at the
//! same tier with exponential backoff, falls back one tier at a time when
//! retries are exhausted, and reports every completed call to the telemetry
//! aggregator. Fatal failures (auth, malformed requests) are surfaced
//! immediately with no fallback.

mod family;
mod provider;

pub use family::ModelFamily;
pub use provider::{HttpProvider, InvokeRequest, InvokeResponse, ReasoningProvider};

#[cfg(test)]
pub use provider::MockReasoningProvider;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::config::{RequestConfig, RouterConfig};
use crate::error::{ProviderError, RouterError, RouterResult};
use crate::telemetry::TelemetryAggregator;

/// A capability/cost tier in the routing ladder, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLevel {
    /// Largest, most capable, most expensive.
    Deep,
    /// The everyday default.
    Standard,
    /// Smallest and cheapest.
    Light,
}

impl TierLevel {
    /// Tier name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TierLevel::Deep => "deep",
            TierLevel::Standard => "standard",
            TierLevel::Light => "light",
        }
    }

    /// Ordinal position in the ladder (0 = most capable).
    pub fn ordinal(&self) -> u8 {
        match self {
            TierLevel::Deep => 0,
            TierLevel::Standard => 1,
            TierLevel::Light => 2,
        }
    }

    /// The next tier down the ladder, if any.
    pub fn next_lower(&self) -> Option<TierLevel> {
        match self {
            TierLevel::Deep => Some(TierLevel::Standard),
            TierLevel::Standard => Some(TierLevel::Light),
            TierLevel::Light => None,
        }
    }
}

impl std::fmt::Display for TierLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TierLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deep" => Ok(TierLevel::Deep),
            "standard" => Ok(TierLevel::Standard),
            "light" => Ok(TierLevel::Light),
            _ => Err(format!("Unknown tier: {}", s)),
        }
    }
}

/// Reasoning-depth control for a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    /// Shallow reasoning.
    Low,
    /// Balanced reasoning.
    Medium,
    /// Deep reasoning.
    High,
}

impl Effort {
    /// Effort name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Effort::Low => "low",
            Effort::Medium => "medium",
            Effort::High => "high",
        }
    }
}

impl std::fmt::Display for Effort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Effort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Effort::Low),
            "medium" => Ok(Effort::Medium),
            "high" => Ok(Effort::High),
            _ => Err(format!("Unknown effort: {}", s)),
        }
    }
}

/// One call's content and generation controls.
#[derive(Debug, Clone)]
pub struct CallPayload {
    /// The prompt to answer.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Reasoning-depth control. Mutually exclusive with `temperature`.
    pub effort: Option<Effort>,
    /// Randomness control. Mutually exclusive with `effort`.
    pub temperature: Option<f32>,
}

impl CallPayload {
    /// Create a payload with just a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            effort: None,
            temperature: None,
        }
    }

    /// Set the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
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

/// Accounting record for one completed request/response pair.
#[derive(Debug, Clone, Serialize)]
pub struct ModelCallRecord {
    /// The logical identifier the caller asked for.
    pub requested_model: String,
    /// Normalized family of the variant that actually served the call.
    pub resolved_family: ModelFamily,
    /// The tier that served the call.
    pub tier: TierLevel,
    /// Prompt tokens consumed.
    pub input_tokens: u64,
    /// Completion tokens produced.
    pub output_tokens: u64,
    /// Derived cost; never negative, zero when the family rate is unknown.
    pub cost_usd: f64,
    /// Wall-clock duration of the serving attempt.
    pub latency_ms: u64,
}

/// A successful routed call: the answer text plus its accounting record.
#[derive(Debug, Clone)]
pub struct RoutedCall {
    /// The generated answer.
    pub text: String,
    /// The accounting record, already reported to telemetry.
    pub record: ModelCallRecord,
}

/// The model-tier router.
pub struct ModelRouter {
    provider: Arc<dyn ReasoningProvider>,
    config: RouterConfig,
    request: RequestConfig,
    max_tokens: u32,
    telemetry: Arc<TelemetryAggregator>,
}

impl ModelRouter {
    /// Create a new router over the given provider.
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        config: RouterConfig,
        request: RequestConfig,
        max_tokens: u32,
        telemetry: Arc<TelemetryAggregator>,
    ) -> Self {
        Self {
            provider,
            config,
            request,
            max_tokens,
            telemetry,
        }
    }

    /// The concrete model identifier configured for a tier.
    pub fn model_for(&self, tier: TierLevel) -> &str {
        match tier {
            TierLevel::Deep => &self.config.deep_model,
            TierLevel::Standard => &self.config.standard_model,
            TierLevel::Light => &self.config.light_model,
        }
    }

    /// Execute a call starting at `tier_hint`, retrying transient failures
    /// at the same tier up to the configured bound, then falling back one
    /// tier at a time until success or the ladder is exhausted.
    ///
    /// A tier shift is reported exactly once, and only when the serving
    /// tier differs from the requested tier; same-tier retries are not
    /// shifts. Payloads that set both effort and temperature are rejected
    /// before anything is dispatched.
    pub async fn call(&self, payload: CallPayload, tier_hint: TierLevel) -> RouterResult<RoutedCall> {
        if payload.effort.is_some() && payload.temperature.is_some() {
            return Err(RouterError::ConfigConflict {
                message: "effort and temperature are mutually exclusive".to_string(),
            });
        }

        let requested_model = self.model_for(tier_hint).to_string();
        let mut tier = tier_hint;
        let mut attempts: u32 = 0;
        let mut last_error: Option<ProviderError> = None;

        loop {
            let model = self.model_for(tier);

            let mut retry = 0;
            while retry <= self.request.max_retries {
                if retry > 0 {
                    let delay = Duration::from_millis(
                        self.request.retry_delay_ms * (2_u64.pow(retry - 1)),
                    );
                    warn!(
                        model = %model,
                        tier = %tier,
                        retry = retry,
                        delay_ms = delay.as_millis(),
                        "Retrying reasoning call"
                    );
                    tokio::time::sleep(delay).await;
                }

                attempts += 1;
                let start = Instant::now();
                let request = self.build_request(&payload);

                let result = match tokio::time::timeout(
                    Duration::from_millis(self.request.timeout_ms),
                    self.provider.invoke(model, request),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout {
                        timeout_ms: self.request.timeout_ms,
                    }),
                };

                match result {
                    Ok(response) => {
                        let latency_ms = start.elapsed().as_millis() as u64;

                        if tier != tier_hint {
                            self.telemetry.record_tier_shift(tier_hint, tier);
                        }

                        let mut record = ModelCallRecord {
                            requested_model: requested_model.clone(),
                            resolved_family: ModelFamily::normalize(&response.model),
                            tier,
                            input_tokens: response.input_tokens,
                            output_tokens: response.output_tokens,
                            cost_usd: 0.0,
                            latency_ms,
                        };
                        self.telemetry.record(&mut record);

                        info!(
                            model = %response.model,
                            family = %record.resolved_family,
                            tier = %tier,
                            input_tokens = record.input_tokens,
                            output_tokens = record.output_tokens,
                            latency_ms = latency_ms,
                            "Reasoning call succeeded"
                        );

                        return Ok(RoutedCall {
                            text: response.text,
                            record,
                        });
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(
                            model = %model,
                            tier = %tier,
                            error = %e,
                            attempt = attempts,
                            "Transient reasoning call failure"
                        );
                        last_error = Some(e);
                        retry += 1;
                    }
                    Err(e) => {
                        error!(
                            model = %model,
                            tier = %tier,
                            error = %e,
                            "Fatal reasoning call failure, no fallback"
                        );
                        return Err(RouterError::Fatal(e));
                    }
                }
            }

            match tier.next_lower() {
                Some(lower) => {
                    info!(
                        from = %tier,
                        to = %lower,
                        "Tier retries exhausted, falling back"
                    );
                    tier = lower;
                }
                None => {
                    return Err(RouterError::TiersExhausted {
                        requested: tier_hint.to_string(),
                        attempts,
                        last_error: last_error
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "unknown error".to_string()),
                    });
                }
            }
        }
    }

    fn build_request(&self, payload: &CallPayload) -> InvokeRequest {
        let mut request =
            InvokeRequest::new(payload.prompt.clone()).with_max_tokens(self.max_tokens);
        if let Some(system) = &payload.system {
            request = request.with_system(system.clone());
        }
        if let Some(effort) = payload.effort {
            request = request.with_effort(effort);
        }
        if let Some(temperature) = payload.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }
}
