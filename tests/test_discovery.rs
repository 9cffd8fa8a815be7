//! Capability discovery and snapshot isolation


use mortgage_router::agent::{RegistrySnapshot, Stage};
use mortgage_router::testing::MockLlmProvider;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_discovery_skips_bad_endpoints() {
    let good = MockServer::start().await;
    mount_card(&good, "credit_risk_agent", &["risk"]).await;

    let missing = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&missing)
        .await;

    let malformed = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not a card</html>"))
        .mount(&malformed)
        .await;

    let registry = registry(vec![
        good.uri(),
        missing.uri(),
        malformed.uri(),
        "http://127.0.0.1:1".to_string(),
    ]);
    let snapshot = registry.refresh().await;

    assert_eq!(snapshot.names(), vec!["credit_risk_agent"]);
    assert_eq!(
        snapshot.get("credit_risk_agent").unwrap().url,
        format!("{}/", good.uri())
    );
}

#[tokio::test]
async fn test_slow_descriptor_is_excluded_without_blocking_others() {
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARD_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "compliance_agent", "url": "http://x/"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&slow)
        .await;
    let fast = MockServer::start().await;
    mount_card(&fast, "document_agent", &["document"]).await;

    let registry = mortgage_router::agent::CapabilityRegistry::new(
        vec![slow.uri(), fast.uri()],
        reqwest::Client::new(),
        Duration::from_millis(300),
        CARD_PATH,
    );

    let started = std::time::Instant::now();
    let snapshot = registry.refresh().await;

    assert_eq!(snapshot.names(), vec!["document_agent"]);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_descriptor_without_name_is_keyed_by_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARD_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "description": "Regulatory compliance checks",
            "skills": [{"name": "compliance review", "tags": ["compliance"]}]
        })))
        .mount(&server)
        .await;

    let snapshot = registry(vec![server.uri()]).refresh().await;

    let descriptor = snapshot.get(&server.uri()).expect("keyed by endpoint");
    assert_eq!(descriptor.url, server.uri());
    // No canonical name, so the fuzzy match finds it
    assert_eq!(
        snapshot.find(&["compliance", "regulatory", "legal"]).unwrap().url,
        server.uri()
    );
}

#[tokio::test]
async fn test_refresh_does_not_disturb_held_snapshot() {
    let server = MockServer::start().await;
    mount_card(&server, "compliance_agent", &["compliance"]).await;

    let registry = registry(vec![server.uri()]);
    registry.refresh().await;
    let held = registry.snapshot();

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let fresh = registry.refresh().await;

    assert!(fresh.is_empty());
    assert!(registry.snapshot().is_empty());
    assert_eq!(held.names(), vec!["compliance_agent"]);
}

#[tokio::test]
async fn test_in_flight_request_keeps_its_snapshot() {
    let risk = worker_with_response(
        "credit_risk_agent",
        &["risk"],
        ResponseTemplate::new(200)
            .set_body_json(worker_reply(r#"{"risk_level": "low"}"#))
            .set_delay(Duration::from_millis(500)),
    )
    .await;
    let compliance = worker("compliance_agent", &["compliance"], r#"{"approved": true}"#).await;

    let registry = registry(vec![risk.uri(), compliance.uri()]);
    registry.refresh().await;
    let engine = engine(
        registry.clone(),
        Arc::new(MockLlmProvider::single_response("risk_only")),
        Duration::from_secs(5),
    );

    // Empty the registry while the risk call is still in flight
    let (state, _) = tokio::join!(engine.run("Assess credit risk", None), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        registry.swap(RegistrySnapshot::empty());
    });

    assert!(registry.snapshot().is_empty());
    assert!(state.fallback.is_empty());
    assert_eq!(
        state.executed,
        vec![Stage::RiskAssessment, Stage::ComplianceCheck]
    );
    assert_eq!(received_task_texts(&compliance).await.len(), 1);

    // The next request sees the empty registry and runs locally
    let next = engine.run("Assess credit risk", None).await;
    assert_eq!(next.fallback.len(), 2);
}

#[tokio::test]
async fn test_zero_endpoints_run_everything_locally() {
    let engine = discovered_engine(Vec::new(), "risk_only").await;

    let result = engine
        .process("Assess credit risk for applicant with 80000 income, 720 credit score")
        .await;

    assert_eq!(result["routing_decision"], "risk_only");
    assert_eq!(result["document_data"], json!({}));
    assert_eq!(result["risk_assessment"]["debt_to_income_ratio"], 0.0);
    assert_eq!(result["risk_assessment"]["risk_level"], "low");
    assert_eq!(result["compliance_result"]["approved"], true);
    assert_eq!(
        result["processing_summary"]["fallback_stages"],
        json!(["risk_assessment", "compliance_check"])
    );
}
