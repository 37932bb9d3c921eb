//! Configuration loading tests.
//!
//! Environment variables are process-global, so every test here is
//! serialized with `serial_test` and cleans up after itself.

use serial_test::serial;
use std::env;

use rlm_engine::config::{Config, LogFormat};
use rlm_engine::router::TierLevel;

const ALL_VARS: &[&str] = &[
    "PROVIDER_API_KEY",
    "PROVIDER_BASE_URL",
    "REQUEST_TIMEOUT_MS",
    "MAX_RETRIES",
    "RETRY_DELAY_MS",
    "MODEL_DEEP",
    "MODEL_STANDARD",
    "MODEL_LIGHT",
    "DEFAULT_TIER",
    "EFFORT",
    "RLM_ENABLED",
    "CACHE_CAPACITY",
    "COMPLEXITY_THRESHOLD",
    "MAX_PARALLEL_CALLS",
    "SESSION_TIMEOUT_MS",
    "MAX_DEPTH",
    "CALL_BUDGET",
    "MAX_TOKENS",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

fn clear_env() {
    for var in ALL_VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_api_key_is_an_error() {
    clear_env();

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("PROVIDER_API_KEY is required"));
}

#[test]
#[serial]
fn test_defaults_applied_when_unset() {
    clear_env();
    env::set_var("PROVIDER_API_KEY", "test-key");

    let config = Config::from_env().expect("config should load");

    assert_eq!(config.provider.api_key, "test-key");
    assert_eq!(config.provider.base_url, "https://api.rlm-engine.dev");
    assert_eq!(config.request.timeout_ms, 30000);
    assert_eq!(config.request.max_retries, 2);
    assert_eq!(config.router.default_tier, TierLevel::Standard);
    assert!(config.router.default_effort.is_none());
    assert_eq!(config.cache.capacity, 256);
    assert!(config.resolver.enabled);
    assert!((config.resolver.complexity_threshold - 0.5).abs() < f64::EPSILON);
    assert_eq!(config.resolver.max_parallel_calls, 4);
    assert_eq!(config.resolver.default_max_depth, 2);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.logging.format, LogFormat::Pretty);

    clear_env();
}

#[test]
#[serial]
fn test_overrides_are_honored() {
    clear_env();
    env::set_var("PROVIDER_API_KEY", "test-key");
    env::set_var("PROVIDER_BASE_URL", "http://localhost:9999");
    env::set_var("REQUEST_TIMEOUT_MS", "1500");
    env::set_var("MODEL_DEEP", "gpt-4o-2025-06-01");
    env::set_var("DEFAULT_TIER", "deep");
    env::set_var("EFFORT", "high");
    env::set_var("RLM_ENABLED", "false");
    env::set_var("CACHE_CAPACITY", "32");
    env::set_var("MAX_DEPTH", "4");
    env::set_var("CALL_BUDGET", "50");
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().expect("config should load");

    assert_eq!(config.provider.base_url, "http://localhost:9999");
    assert_eq!(config.request.timeout_ms, 1500);
    assert_eq!(config.router.deep_model, "gpt-4o-2025-06-01");
    assert_eq!(config.router.default_tier, TierLevel::Deep);
    assert_eq!(
        config.router.default_effort,
        Some(rlm_engine::router::Effort::High)
    );
    assert!(!config.resolver.enabled);
    assert_eq!(config.cache.capacity, 32);
    assert_eq!(config.resolver.default_max_depth, 4);
    assert_eq!(config.resolver.default_budget, 50);
    assert_eq!(config.logging.format, LogFormat::Json);

    clear_env();
}

#[test]
#[serial]
fn test_invalid_numbers_fall_back_to_defaults() {
    clear_env();
    env::set_var("PROVIDER_API_KEY", "test-key");
    env::set_var("REQUEST_TIMEOUT_MS", "not-a-number");
    env::set_var("DEFAULT_TIER", "colossal");

    let config = Config::from_env().expect("config should load");

    assert_eq!(config.request.timeout_ms, 30000);
    assert_eq!(config.router.default_tier, TierLevel::Standard);

    clear_env();
}
