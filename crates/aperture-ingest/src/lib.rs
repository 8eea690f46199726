// SPDX-License-Identifier: MIT OR Apache-2.0
//! APIIngestor (§4.5): idempotent-by-`(workspace, sourceURL)` persistence of
//! a parsed API description, followed by strict all-or-nothing persistence
//! of its `DefinitionTree` (endpoints, parameters, security, seed
//! `RequestVariation`s).
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use aperture_builder::{BuildContext, HttpRequest, ParamValues, RequestBuilder};
use aperture_collab::{ApiDefinitionStore, DefinitionTree};
use aperture_core::{
    ApiDefinition, ApiEndpoint, ApiKind, ApiStatus, DefinitionMeta, Operation, OperationMeta,
    RequestVariation, SecurityScheme,
};
use aperture_error::ApertureError;

/// Headers stripped from a seeded [`RequestVariation`] before storage —
/// downstream scanners supply their own auth, not the ingestor's.
const STRIPPED_HEADERS: &[&str] = &["authorization", "proxy-authorization", "cookie"];

/// Everything the ingestor needs to persist a freshly-parsed document.
pub struct IngestInput {
    /// Owning workspace.
    pub workspace_id: String,
    /// Where the document was discovered, or a caller label for manual
    /// ingestion. Idempotency is keyed on `(workspace_id, source_url)`.
    pub source_url: String,
    /// Base URL operations are relative to.
    pub base_url: String,
    /// Raw document bytes, preserved for re-parsing/auditing.
    pub raw: Vec<u8>,
    /// `true` when discovered by the orchestrator rather than ingested via
    /// a direct `PersistAPIDefinitionFromContent` call.
    pub auto_discovered: bool,
    /// Which parser produced `operations`.
    pub kind: ApiKind,
    /// Type-specific summary metadata.
    pub meta: DefinitionMeta,
    /// The parser's lowered operations.
    pub operations: Vec<Operation>,
    /// Security schemes declared on the document (OpenAPI only; empty for
    /// GraphQL/WSDL, which carry no document-level scheme catalog).
    pub security_schemes: Vec<SecurityScheme>,
}

/// Outcome of one [`ApiIngestor::ingest`] call.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The persisted (or pre-existing) Definition.
    pub definition: ApiDefinition,
    /// `true` if this call created a new Definition; `false` if it found
    /// and returned an existing one without re-persisting the tree.
    pub created: bool,
}

/// Persists parsed API descriptions per §4.5's strict all-or-nothing
/// contract, dispatching `RequestVariation` seeding to the matching
/// [`RequestBuilder`] by [`ApiKind`].
pub struct ApiIngestor {
    store: Arc<dyn ApiDefinitionStore>,
    rest_builder: aperture_builder::RestRequestBuilder,
    graphql_builder: aperture_builder::GraphQlRequestBuilder,
    soap_builder: aperture_builder::SoapRequestBuilder,
}

impl ApiIngestor {
    /// Builds an ingestor backed by `store`.
    pub fn new(store: Arc<dyn ApiDefinitionStore>) -> Self {
        ApiIngestor {
            store,
            rest_builder: aperture_builder::RestRequestBuilder,
            graphql_builder: aperture_builder::GraphQlRequestBuilder::default(),
            soap_builder: aperture_builder::SoapRequestBuilder,
        }
    }

    /// Ingests `input`, returning the existing Definition unchanged if
    /// `(workspace_id, source_url)` was already ingested (idempotent
    /// ingestion, §8).
    pub async fn ingest(&self, input: IngestInput) -> Result<IngestOutcome, ApertureError> {
        if let Some(existing) = self
            .store
            .get_by_source_url(&input.workspace_id, &input.source_url)
            .await?
        {
            info!(
                target: "aperture.ingest",
                workspace_id = %input.workspace_id,
                source_url = %input.source_url,
                definition_id = %existing.id,
                "ingest: definition already exists, skipping re-persist"
            );
            return Ok(IngestOutcome {
                definition: existing,
                created: false,
            });
        }

        let definition_id = Uuid::new_v4();
        let endpoint_count = input.operations.len() as u32;
        let definition = ApiDefinition {
            id: definition_id,
            workspace_id: input.workspace_id.clone(),
            kind: input.kind,
            status: ApiStatus::Pending,
            source_url: input.source_url.clone(),
            base_url: input.base_url.clone(),
            raw: input.raw,
            auto_discovered: input.auto_discovered,
            meta: input.meta,
            endpoint_count: 0,
        };
        let created = self.store.create(definition).await?;

        let tree = self.build_tree(definition_id, &input.operations, input.security_schemes);

        match self.store.persist_tree(definition_id, tree).await {
            Ok(()) => {
                let mut finalized = created;
                finalized.status = ApiStatus::Parsed;
                finalized.endpoint_count = endpoint_count;
                let finalized = self.store.update(finalized).await?;
                info!(
                    target: "aperture.ingest",
                    definition_id = %definition_id,
                    endpoint_count,
                    "ingest: definition tree persisted"
                );
                Ok(IngestOutcome {
                    definition: finalized,
                    created: true,
                })
            }
            Err(err) => {
                let mut failed = created;
                failed.status = ApiStatus::Failed;
                // Best-effort status update; the tree itself was already
                // rolled back by the store per its transactional contract.
                let _ = self.store.update(failed).await;
                Err(err)
            }
        }
    }

    fn build_tree(
        &self,
        definition_id: Uuid,
        operations: &[Operation],
        security_schemes: Vec<SecurityScheme>,
    ) -> DefinitionTree {
        let mut tree = DefinitionTree {
            security_schemes,
            ..DefinitionTree::default()
        };

        for operation in operations {
            let endpoint_id = Uuid::new_v4();
            let endpoint = ApiEndpoint::from_operation(definition_id, endpoint_id, operation);
            tree.endpoint_parameters.push((endpoint_id, operation.parameters.clone()));
            if !operation.security.is_empty() {
                tree.endpoint_security.push((endpoint_id, operation.security.clone()));
            }
            if let Some(variation) = self.seed_variation(endpoint_id, operation) {
                tree.request_variations.push((endpoint_id, variation));
            }
            tree.endpoints.push(endpoint);
        }

        tree
    }

    /// Builds a canonical seed [`RequestVariation`] from an Operation's
    /// default/example values, stripping auth-bearing headers before
    /// storage (§8 glossary: "RequestVariation ... used by downstream
    /// active scanners").
    fn seed_variation(&self, endpoint_id: Uuid, operation: &Operation) -> Option<RequestVariation> {
        let ctx = BuildContext::default();
        let values = ParamValues::new();
        let request = match &operation.meta {
            OperationMeta::OpenApi => self.rest_builder.build(&ctx, operation, &values),
            OperationMeta::GraphQl { .. } => self.graphql_builder.build(&ctx, operation, &values),
            OperationMeta::Wsdl { .. } => self.soap_builder.build(&ctx, operation, &values),
        };
        let request = request.ok()?;
        Some(strip_auth_headers(endpoint_id, request))
    }
}

fn strip_auth_headers(endpoint_id: Uuid, mut request: HttpRequest) -> RequestVariation {
    request
        .headers
        .retain(|(k, _)| !STRIPPED_HEADERS.iter().any(|stripped| k.eq_ignore_ascii_case(stripped)));
    RequestVariation {
        endpoint_id,
        url: request.url,
        method: request.method,
        content_type: request.content_type().map(str::to_string),
        headers: request.headers,
        body: request.body.unwrap_or_default(),
        query_text: request.graphql_query,
        operation_name: request.graphql_operation_name,
        variables_json: request.graphql_variables_json,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_mock::MockApiDefinitionStore;

    fn minimal_input(source_url: &str) -> IngestInput {
        let doc = format!(
            r#"{{
            "openapi": "3.0.0",
            "info": {{"title": "Test", "version": "1.0"}},
            "paths": {{
                "/ping": {{"get": {{"operationId": "ping", "responses": {{"200": {{"description": "ok"}}}}}}}}
            }}
        }}"#
        );
        let parsed = aperture_openapi::parse(doc.as_bytes(), "https://api.example.test").unwrap();
        IngestInput {
            workspace_id: "ws-1".to_string(),
            source_url: source_url.to_string(),
            base_url: "https://api.example.test".to_string(),
            raw: doc.into_bytes(),
            auto_discovered: false,
            kind: parsed.kind,
            meta: parsed.meta,
            operations: parsed.operations,
            security_schemes: parsed.security_schemes,
        }
    }

    #[tokio::test]
    async fn ingesting_same_source_url_twice_is_idempotent() {
        let store = Arc::new(MockApiDefinitionStore::default());
        let ingestor = ApiIngestor::new(store.clone());

        let first = ingestor.ingest(minimal_input("https://api.example.test/openapi.json")).await.unwrap();
        assert!(first.created);
        let second = ingestor.ingest(minimal_input("https://api.example.test/openapi.json")).await.unwrap();
        assert!(!second.created);
        assert_eq!(first.definition.id, second.definition.id);
        assert_eq!(store.definition_count(), 1);
    }

    #[tokio::test]
    async fn persisted_tree_seeds_one_request_variation_per_endpoint() {
        let store = Arc::new(MockApiDefinitionStore::default());
        let ingestor = ApiIngestor::new(store.clone());

        let outcome = ingestor.ingest(minimal_input("https://api.example.test/a.json")).await.unwrap();
        let tree = store.tree_for(outcome.definition.id).unwrap();
        assert_eq!(tree.endpoints.len(), 1);
        assert_eq!(tree.request_variations.len(), 1);
        assert_eq!(outcome.definition.endpoint_count, 1);
    }

    #[tokio::test]
    async fn seeded_variation_strips_auth_headers() {
        let store = Arc::new(MockApiDefinitionStore::default());
        let ingestor = ApiIngestor::new(store.clone());
        let outcome = ingestor.ingest(minimal_input("https://api.example.test/b.json")).await.unwrap();
        let tree = store.tree_for(outcome.definition.id).unwrap();
        let (_, variation) = &tree.request_variations[0];
        assert!(!variation.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("authorization")));
    }

    #[tokio::test]
    async fn graphql_operation_is_seeded_through_graphql_builder() {
        let introspection = serde_json::json!({
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
        let bytes = serde_json::to_vec(&introspection).unwrap();
        let parsed = aperture_graphql::parse(&bytes, "https://api.example.test/graphql").unwrap();
        let input = IngestInput {
            workspace_id: "ws-1".to_string(),
            source_url: "https://api.example.test/graphql".to_string(),
            base_url: "https://api.example.test/graphql".to_string(),
            raw: bytes,
            auto_discovered: true,
            kind: parsed.kind,
            meta: parsed.meta,
            operations: parsed.operations,
            security_schemes: Vec::new(),
        };

        let store = Arc::new(MockApiDefinitionStore::default());
        let ingestor = ApiIngestor::new(store.clone());
        let outcome = ingestor.ingest(input).await.unwrap();
        let tree = store.tree_for(outcome.definition.id).unwrap();
        let (_, variation) = &tree.request_variations[0];
        assert!(variation.query_text.is_some());
    }
}
