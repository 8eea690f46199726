// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cross-crate end-to-end scenarios (spec §8 "literal" scenarios 3 and 6,
//! exercised across `aperture-orchestrator`, `aperture-openapi`,
//! `aperture-graphql`, and `aperture-ingest` together rather than against
//! any single crate in isolation).

use std::sync::Arc;

use aperture_collab::HttpTransport;
use aperture_config::ScanConfig;
use aperture_core::{ApiStatus, ScanMode};
use aperture_mock::{MockApiDefinitionStore, MockIssueStore, MockSiteBehavior};
use aperture_orchestrator::{DiscoverOptions, DiscoveryOrchestrator};
use aperture_transport::HttpClientTransport;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn options(base_url: String) -> DiscoverOptions {
    DiscoverOptions {
        base_url,
        workspace_id: "ws-e2e".to_string(),
        scan_mode: ScanMode::Fast,
        config: ScanConfig::default(),
        site_behavior: None,
        task_id: None,
        task_job_id: None,
    }
}

/// Scenario 3: a catch-all SPA shell that returns `200 text/html` for every
/// path, including `/swagger.json`. The OpenAPI predicate rejects on the
/// HTML body; zero issues and zero Definitions should result end-to-end.
#[tokio::test]
async fn catch_all_html_site_yields_zero_issues_and_zero_definitions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>app shell</body></html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>app shell</body></html>"))
        .mount(&server)
        .await;

    let transport: Arc<dyn HttpTransport> = Arc::new(HttpClientTransport::new().unwrap());
    let issue_store = Arc::new(MockIssueStore::default());
    let definition_store = Arc::new(MockApiDefinitionStore::default());
    let orchestrator = DiscoveryOrchestrator::new(transport, issue_store, definition_store.clone());

    let outcome = orchestrator.discover_all(options(server.uri())).await.unwrap();

    assert!(outcome.all_issues().is_empty());
    assert_eq!(definition_store.definition_count(), 0);
}

/// Scenario 6, driven through the full discovery pipeline rather than
/// `ApiIngestor` directly: running `discover_all` twice against the same
/// server must persist exactly one Definition, both runs returning the same
/// endpoint count.
#[tokio::test]
async fn discovering_the_same_openapi_document_twice_is_idempotent() {
    let server = MockServer::start().await;
    let doc = serde_json::json!({
        "openapi": "3.0.0",
        "info": {"title": "Widgets", "version": "1.0"},
        "paths": {
            "/widgets": {"get": {"operationId": "listWidgets", "responses": {"200": {"description": "ok"}}}},
            "/widgets/{id}": {"get": {"operationId": "getWidget", "responses": {"200": {"description": "ok"}}}}
        }
    });
    Mock::given(method("GET"))
        .and(path("/openapi.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&doc))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport: Arc<dyn HttpTransport> = Arc::new(HttpClientTransport::new().unwrap());
    let issue_store = Arc::new(MockIssueStore::default());
    let definition_store = Arc::new(MockApiDefinitionStore::default());
    let orchestrator =
        DiscoveryOrchestrator::new(transport, issue_store, definition_store.clone());

    let first = orchestrator.discover_all(options(server.uri())).await.unwrap();
    let second = orchestrator.discover_all(options(server.uri())).await.unwrap();

    assert_eq!(definition_store.definition_count(), 1);

    let first_ingested = &first
        .results
        .iter()
        .find(|r| r.detector_name == "openapi-document")
        .unwrap()
        .ingested[0];
    let second_ingested = &second
        .results
        .iter()
        .find(|r| r.detector_name == "openapi-document")
        .unwrap()
        .ingested[0];

    assert_eq!(first_ingested.definition.id, second_ingested.definition.id);
    assert!(first_ingested.created);
    assert!(!second_ingested.created);
    assert_eq!(first_ingested.definition.endpoint_count, 2);
    assert_eq!(second_ingested.definition.endpoint_count, 2);
}

/// GraphQL discovery: the probe's minimal introspection body only confirms
/// the endpoint, so the orchestrator must re-issue a full introspection
/// query before a Definition with real operations is ingested.
#[tokio::test]
async fn graphql_discovery_refetches_full_introspection_before_ingesting() {
    let server = MockServer::start().await;
    let minimal_probe_response = serde_json::json!({"data": {"__schema": {"queryType": {"name": "Query"}}}});
    let full_introspection = serde_json::json!({
        "data": {
            "__schema": {
                "queryType": {"name": "Query"},
                "mutationType": null,
                "subscriptionType": null,
                "types": [
                    {
                        "kind": "OBJECT",
                        "name": "Query",
                        "fields": [
                            {
                                "name": "ping",
                                "args": [],
                                "type": {"kind": "SCALAR", "name": "String", "ofType": null}
                            }
                        ]
                    }
                ]
            }
        }
    });

    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&minimal_probe_response))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&full_introspection))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport: Arc<dyn HttpTransport> = Arc::new(HttpClientTransport::new().unwrap());
    let issue_store = Arc::new(MockIssueStore::default());
    let definition_store = Arc::new(MockApiDefinitionStore::default());
    let orchestrator = DiscoveryOrchestrator::new(transport, issue_store, definition_store.clone());

    let outcome = orchestrator.discover_all(options(server.uri())).await.unwrap();

    let graphql_result = outcome
        .results
        .iter()
        .find(|r| r.detector_name == "graphql-introspection")
        .unwrap();
    assert_eq!(graphql_result.ingested.len(), 1);
    let definition = &graphql_result.ingested[0].definition;
    assert_eq!(definition.status, ApiStatus::Parsed);
    assert_eq!(definition.endpoint_count, 1);
}

/// A false-404 SPA shell must not pollute the orchestrator's findings even
/// when `SiteBehavior` is wired through explicitly (as opposed to relying
/// on the predicate's own HTML sniff, covered by the scenario above).
#[tokio::test]
async fn site_behavior_false_404_filter_suppresses_every_detector() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let transport: Arc<dyn HttpTransport> = Arc::new(HttpClientTransport::new().unwrap());
    let issue_store = Arc::new(MockIssueStore::default());
    let definition_store = Arc::new(MockApiDefinitionStore::default());
    let orchestrator = DiscoveryOrchestrator::new(transport, issue_store, definition_store.clone());

    let mut opts = options(server.uri());
    opts.site_behavior = Some(Arc::new(MockSiteBehavior::always_not_found()));

    let outcome = orchestrator.discover_all(opts).await.unwrap();
    assert!(outcome.all_issues().is_empty());
    assert_eq!(definition_store.definition_count(), 0);
}
