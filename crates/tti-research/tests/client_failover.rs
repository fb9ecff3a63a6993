//! # Integration Tests for the Research Client
//!
//! Exercises the two-provider failover chain and the batched lookup
//! path against wiremock servers: request construction, Bearer auth,
//! response normalization, index alignment, and the
//! all-providers-failed terminal error. No live provider access.

use std::sync::Arc;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tti_research::{
    BatchQuery, PolicySurchargeResolver, ProviderConfig, ResearchClient, ResearchConfig,
    ResearchError,
};
use tti_store::{MemoryPolicyCache, PolicyCache, PolicyCacheRecord};

fn single_provider(server: &MockServer) -> ResearchClient {
    let config = ResearchConfig {
        primary: Some(ProviderConfig::new(server.uri(), "test-api-key")),
        secondary: None,
    };
    ResearchClient::new(config).expect("client build")
}

fn dual_provider(primary: &MockServer, secondary: &MockServer) -> ResearchClient {
    let config = ResearchConfig {
        primary: Some(ProviderConfig::new(primary.uri(), "primary-key")),
        secondary: Some(ProviderConfig::new(secondary.uri(), "secondary-key")),
    };
    ResearchClient::new(config).expect("client build")
}

fn breakdown_body(hs_code: &str, mfn: f64, s301: f64) -> serde_json::Value {
    serde_json::json!({
        "hs_code": hs_code,
        "description": "test article",
        "base_mfn_rate": mfn,
        "section_301": s301,
        "section_232": 0.0,
        "usmca_rate": 0.0,
        "total_rate": 0.0,
        "confidence": "high",
        "policy_adjustments": []
    })
}

// ── Single lookup ────────────────────────────────────────────────────────

#[tokio::test]
async fn lookup_one_primary_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(serde_json::json!({
            "hs_code": "8517620000",
            "origin_country": "CN",
            "destination_country": "US",
            "section_301_applicable": true
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(breakdown_body("8517.62.00", 0.027, 0.25)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = single_provider(&server);
    let result = client
        .lookup_one("8517.62.00", "China", "US", Some("cellular modem"))
        .await
        .expect("lookup");

    assert_eq!(result.hs_code, "8517620000");
    assert!((result.base_mfn_rate - 0.027).abs() < 1e-9);
    assert!((result.section_301 - 0.25).abs() < 1e-9);
    // Total is recomputed locally, never trusted from the wire.
    assert!((result.total_rate - 0.277).abs() < 1e-9);
}

#[tokio::test]
async fn lookup_one_fails_over_to_secondary_on_server_error() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream saturated"))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup"))
        .and(header("Authorization", "Bearer secondary-key"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(breakdown_body("8471300100", 0.0, 0.0)),
        )
        .expect(1)
        .mount(&secondary)
        .await;

    let client = dual_provider(&primary, &secondary);
    let result = client
        .lookup_one("8471.30.01", "VN", "US", None)
        .await
        .expect("secondary should answer");

    assert_eq!(result.hs_code, "8471300100");
    assert_eq!(result.provider, tti_research::ProviderKind::Secondary);
}

#[tokio::test]
async fn lookup_one_unparseable_body_triggers_failover() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    // 200 with a body that does not match the schema is a fetch
    // failure, never a silent empty result.
    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(breakdown_body("8517620000", 0.027, 0.0)),
        )
        .expect(1)
        .mount(&secondary)
        .await;

    let client = dual_provider(&primary, &secondary);
    let result = client
        .lookup_one("8517620000", "MX", "US", None)
        .await
        .expect("secondary should answer");
    assert_eq!(result.provider, tti_research::ProviderKind::Secondary);
}

#[tokio::test]
async fn lookup_one_all_providers_failed() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    for server in [&primary, &secondary] {
        Mock::given(method("POST"))
            .and(path("/v1/rates/lookup"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(server)
            .await;
    }

    let client = dual_provider(&primary, &secondary);
    let err = client
        .lookup_one("8517620000", "CN", "US", None)
        .await
        .unwrap_err();

    match err {
        ResearchError::AllProvidersFailed { primary, secondary } => {
            assert!(primary.contains("500"), "primary detail: {primary}");
            assert!(secondary.contains("500"), "secondary detail: {secondary}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn lookup_one_without_any_provider_configured() {
    let client = ResearchClient::new(ResearchConfig::default()).expect("client build");
    let err = client
        .lookup_one("8517620000", "CN", "US", None)
        .await
        .unwrap_err();
    match err {
        ResearchError::AllProvidersFailed { primary, secondary } => {
            // Each empty slot reports itself as unconfigured, so the
            // aggregate error says which credentials are missing.
            assert!(primary.contains("primary") && primary.contains("not configured"));
            assert!(secondary.contains("secondary") && secondary.contains("not configured"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ── Batched lookup ───────────────────────────────────────────────────────

fn batch(queries: &[(&str, &str)]) -> Vec<BatchQuery> {
    queries
        .iter()
        .map(|(hs, origin)| BatchQuery {
            hs_code: (*hs).to_string(),
            origin_country: (*origin).to_string(),
            description: None,
        })
        .collect()
}

#[tokio::test]
async fn lookup_batch_is_one_http_call_and_index_aligned() {
    let server = MockServer::start().await;

    // Results deliberately out of order: alignment is by
    // component_index, not arrival order.
    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup-batch"))
        .and(header("Authorization", "Bearer test-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "component_index": 2, "hs_code": "9013805000", "base_mfn_rate": 0.045 },
                { "component_index": 0, "hs_code": "8517620000", "base_mfn_rate": 0.027 },
                { "component_index": 1, "hs_code": "8471300100", "base_mfn_rate": 0.0 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = single_provider(&server);
    let results = client
        .lookup_batch(
            "US",
            Some("networking appliance"),
            &batch(&[
                ("8517.62.00", "VN"),
                ("8471.30.01", "MY"),
                ("9013.80.50", "KR"),
            ]),
        )
        .await
        .expect("batch");

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].hs_code, "8517620000");
    assert_eq!(results[1].hs_code, "8471300100");
    assert_eq!(results[2].hs_code, "9013805000");
}

#[tokio::test]
async fn lookup_batch_short_response_fails_over() {
    let primary = MockServer::start().await;
    let secondary = MockServer::start().await;

    // Answers only one of two components: shape mismatch, failover.
    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup-batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "component_index": 0, "hs_code": "8517620000", "base_mfn_rate": 0.027 }
            ]
        })))
        .expect(1)
        .mount(&primary)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup-batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "component_index": 0, "hs_code": "8517620000", "base_mfn_rate": 0.027 },
                { "component_index": 1, "hs_code": "8471300100", "base_mfn_rate": 0.0 }
            ]
        })))
        .expect(1)
        .mount(&secondary)
        .await;

    let client = dual_provider(&primary, &secondary);
    let results = client
        .lookup_batch(
            "US",
            None,
            &batch(&[("8517620000", "VN"), ("8471300100", "MY")]),
        )
        .await
        .expect("secondary should answer");
    assert_eq!(results.len(), 2);
}

#[tokio::test]
async fn lookup_batch_revalidates_section_301_for_applicable_lanes() {
    let server = MockServer::start().await;

    // Provider reports a wrong surcharge for the CN→US lane; the
    // fallback chain holds a fresh authoritative snapshot.
    Mock::given(method("POST"))
        .and(path("/v1/rates/lookup-batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [
                { "component_index": 0, "hs_code": "8517620000",
                  "base_mfn_rate": 0.027, "section_301": 0.075 },
                { "component_index": 1, "hs_code": "8471300100",
                  "base_mfn_rate": 0.0, "section_301": 0.075 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let policy_cache = Arc::new(MemoryPolicyCache::new());
    policy_cache
        .put_policy(&PolicyCacheRecord {
            hs_code: "8517620000".to_string(),
            section_301: 0.25,
            verified_date: chrono::Utc::now() - chrono::Duration::days(3),
            expires_at: None,
            is_stale: false,
            data_source: "ustr_sync".to_string(),
            source_url: None,
        })
        .await;

    let resolver = Arc::new(PolicySurchargeResolver::new(
        policy_cache,
        Arc::new(NeverFetch),
    ));
    let client = single_provider(&server).with_surcharge_resolver(resolver);

    let results = client
        .lookup_batch(
            "US",
            None,
            &batch(&[("8517620000", "CN"), ("8471300100", "VN")]),
        )
        .await
        .expect("batch");

    // CN→US lane overridden by the authoritative snapshot.
    assert!((results[0].section_301 - 0.25).abs() < 1e-9);
    assert!((results[0].total_rate - 0.277).abs() < 1e-9);
    // VN lane untouched: Section 301 does not apply.
    assert!((results[1].section_301 - 0.075).abs() < 1e-9);
}

struct NeverFetch;

#[async_trait::async_trait]
impl tti_research::EmergencyFetch for NeverFetch {
    async fn fetch(
        &self,
        hs_code: &str,
    ) -> Result<tti_research::EmergencySurcharge, ResearchError> {
        Err(ResearchError::NotFound {
            hs_code: hs_code.to_string(),
        })
    }
}
