use std::env;

use crate::error::AppError;
use crate::router::{Effort, TierLevel};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    pub request: RequestConfig,
    pub router: RouterConfig,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub logging: LoggingConfig,
}

/// Reasoning provider API configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Model tier ladder configuration.
///
/// One concrete model identifier per tier, capability/cost descending.
/// Dated variants are fine here; the router normalizes them to families
/// for telemetry grouping.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub deep_model: String,
    pub standard_model: String,
    pub light_model: String,
    pub default_tier: TierLevel,
    pub default_effort: Option<Effort>,
}

/// Retrieval cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub capacity: usize,
}

/// Decomposition controller configuration
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Master switch: when false every query is answered directly,
    /// no decomposition.
    pub enabled: bool,
    pub complexity_threshold: f64,
    pub max_parallel_calls: usize,
    pub session_timeout_ms: u64,
    pub default_max_depth: u32,
    pub default_budget: u32,
    pub max_tokens: u32,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let provider = ProviderConfig {
            api_key: env::var("PROVIDER_API_KEY").map_err(|_| AppError::Config {
                message: "PROVIDER_API_KEY is required".to_string(),
            })?,
            base_url: env::var("PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.rlm-engine.dev".to_string()),
        };

        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30000),
            max_retries: env::var("MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            retry_delay_ms: env::var("RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
        };

        let router = RouterConfig {
            deep_model: env::var("MODEL_DEEP")
                .unwrap_or_else(|_| "gpt-4o-2024-08-06".to_string()),
            standard_model: env::var("MODEL_STANDARD")
                .unwrap_or_else(|_| "gpt-4o-mini-2024-07-18".to_string()),
            light_model: env::var("MODEL_LIGHT")
                .unwrap_or_else(|_| "gpt-3.5-turbo-0125".to_string()),
            default_tier: env::var("DEFAULT_TIER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(TierLevel::Standard),
            default_effort: env::var("EFFORT").ok().and_then(|s| s.parse().ok()),
        };

        let cache = CacheConfig {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(256),
        };

        let resolver = ResolverConfig {
            enabled: env::var("RLM_ENABLED")
                .ok()
                .map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(true),
            complexity_threshold: env::var("COMPLEXITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.5),
            max_parallel_calls: env::var("MAX_PARALLEL_CALLS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(4),
            session_timeout_ms: env::var("SESSION_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120_000),
            default_max_depth: env::var("MAX_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            default_budget: env::var("CALL_BUDGET")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            max_tokens: env::var("MAX_TOKENS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2000),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        Ok(Config {
            provider,
            request,
            router,
            cache,
            resolver,
            logging,
        })
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            deep_model: "gpt-4o-2024-08-06".to_string(),
            standard_model: "gpt-4o-mini-2024-07-18".to_string(),
            light_model: "gpt-3.5-turbo-0125".to_string(),
            default_tier: TierLevel::Standard,
            default_effort: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            complexity_threshold: 0.5,
            max_parallel_calls: 4,
            session_timeout_ms: 120_000,
            default_max_depth: 2,
            default_budget: 16,
            max_tokens: 2000,
        }
    }
}
