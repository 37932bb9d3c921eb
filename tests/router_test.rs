//! Integration tests for the model router over a mock HTTP provider.
//!
//! Exercises tier fallback ordering, tier-shift accounting, family
//! normalization, and fatal-error short-circuiting using wiremock.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rlm_engine::config::{ProviderConfig, RequestConfig, RouterConfig};
use rlm_engine::error::RouterError;
use rlm_engine::memory::CacheCounters;
use rlm_engine::router::{
    CallPayload, Effort, HttpProvider, ModelFamily, ModelRouter, TierLevel,
};
use rlm_engine::telemetry::{RateTable, TelemetryAggregator};

fn test_request_config() -> RequestConfig {
    RequestConfig {
        timeout_ms: 5000,
        max_retries: 1,
        retry_delay_ms: 1,
    }
}

fn build_router(mock_url: &str, telemetry: Arc<TelemetryAggregator>) -> ModelRouter {
    let provider_config = ProviderConfig {
        api_key: "test-api-key".to_string(),
        base_url: mock_url.to_string(),
    };
    let provider = HttpProvider::new(&provider_config, &test_request_config())
        .expect("Failed to create provider");

    ModelRouter::new(
        Arc::new(provider),
        RouterConfig::default(),
        test_request_config(),
        256,
        telemetry,
    )
}

fn test_telemetry() -> Arc<TelemetryAggregator> {
    Arc::new(TelemetryAggregator::new(
        RateTable::builtin(),
        Arc::new(CacheCounters::new()),
    ))
}

fn success_body(model: &str, input: u64, output: u64) -> serde_json::Value {
    json!({
        "text": "the answer",
        "model": model,
        "usage": { "input_tokens": input, "output_tokens": output }
    })
}

#[tokio::test]
async fn test_successful_call_reports_usage() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(success_body("gpt-4o-mini-2024-07-18", 120, 40)),
        )
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), Arc::clone(&telemetry));

    let routed = router
        .call(CallPayload::new("What changed?"), TierLevel::Standard)
        .await
        .expect("call should succeed");

    assert_eq!(routed.text, "the answer");
    assert_eq!(routed.record.resolved_family, ModelFamily::Gpt4oMini);
    assert_eq!(routed.record.input_tokens, 120);
    assert_eq!(routed.record.output_tokens, 40);
    assert!(routed.record.cost_usd > 0.0);

    let snap = telemetry.snapshot();
    assert_eq!(snap.input_tokens, 120);
    assert_eq!(snap.output_tokens, 40);
    assert_eq!(snap.tier_shifts, 0);
}

#[tokio::test]
async fn test_fallback_walks_ladder_with_one_tier_shift() {
    let mock_server = MockServer::start().await;

    // Deep and standard tiers always fail transiently; light succeeds.
    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .and(body_string_contains("gpt-4o-2024"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2) // initial attempt + 1 retry
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .and(body_string_contains("gpt-4o-mini"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .and(body_string_contains("gpt-3.5-turbo"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_body("gpt-3.5-turbo-0125", 50, 10)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), Arc::clone(&telemetry));

    let routed = router
        .call(CallPayload::new("What changed?"), TierLevel::Deep)
        .await
        .expect("light tier should eventually serve the call");

    assert_eq!(routed.record.tier, TierLevel::Light);
    assert_eq!(routed.record.resolved_family, ModelFamily::Gpt35Turbo);
    // Requested model stays the deep tier's identifier.
    assert!(routed.record.requested_model.starts_with("gpt-4o-2024"));

    // One deliberate shift (deep -> light), not one per retry or per tier.
    assert_eq!(telemetry.snapshot().tier_shifts, 1);
}

#[tokio::test]
async fn test_exhausted_ladder_reports_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), telemetry);

    let result = router
        .call(CallPayload::new("What changed?"), TierLevel::Deep)
        .await;

    match result {
        Err(RouterError::TiersExhausted {
            requested,
            attempts,
            last_error,
        }) => {
            assert_eq!(requested, "deep");
            // 3 tiers x (1 attempt + 1 retry)
            assert_eq!(attempts, 6);
            assert!(last_error.contains("Rate limited"));
        }
        other => panic!("Expected TiersExhausted, got {:?}", other.map(|r| r.record)),
    }
}

#[tokio::test]
async fn test_auth_failure_is_fatal_no_fallback() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1) // exactly one attempt: no retry, no fallback
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), Arc::clone(&telemetry));

    let result = router
        .call(CallPayload::new("What changed?"), TierLevel::Deep)
        .await;

    assert!(matches!(result, Err(RouterError::Fatal(_))));
    assert_eq!(telemetry.snapshot().input_tokens, 0);
}

#[tokio::test]
async fn test_conflicting_controls_never_reach_the_wire() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body("gpt-4o", 1, 1)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), telemetry);

    let payload = CallPayload::new("What changed?")
        .with_effort(Effort::High)
        .with_temperature(0.7);
    let result = router.call(payload, TierLevel::Standard).await;

    assert!(matches!(result, Err(RouterError::ConfigConflict { .. })));
}

#[tokio::test]
async fn test_dated_variants_group_under_one_family() {
    let mock_server = MockServer::start().await;

    // The provider alternates dated variants of the same family.
    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_body("gpt-4o-mini-2024-07-18", 100, 10)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(success_body("gpt-4o-mini-2025-01-31", 200, 20)),
        )
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), Arc::clone(&telemetry));

    router
        .call(CallPayload::new("first"), TierLevel::Standard)
        .await
        .unwrap();
    router
        .call(CallPayload::new("second"), TierLevel::Standard)
        .await
        .unwrap();

    let snap = telemetry.snapshot();
    assert_eq!(snap.families.len(), 1);
    let family = &snap.families["gpt-4o-mini"];
    assert_eq!(family.calls, 2);
    assert_eq!(family.input_tokens, 300);
    assert_eq!(family.output_tokens, 30);
}

#[tokio::test]
async fn test_missing_usage_defaults_to_zero_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/complete"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "text": "bare answer" })),
        )
        .mount(&mock_server)
        .await;

    let telemetry = test_telemetry();
    let router = build_router(&mock_server.uri(), telemetry);

    let routed = router
        .call(CallPayload::new("What changed?"), TierLevel::Standard)
        .await
        .unwrap();

    assert_eq!(routed.text, "bare answer");
    assert_eq!(routed.record.input_tokens, 0);
    assert_eq!(routed.record.output_tokens, 0);
    // Model omitted from the response: falls back to the requested id.
    assert_eq!(routed.record.resolved_family, ModelFamily::Gpt4oMini);
}
