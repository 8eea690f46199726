#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Trait contracts for the collaborators §6 treats as external: the HTTP
//! transport, the HistoryStore/IssueStore sinks, the APIDefinitionStore,
//! and the optional SiteBehavior oracle. The core depends only on these
//! traits; concrete implementations (a real HTTP client, a real database)
//! are out of scope here, but `aperture-transport` supplies the default
//! transport and `aperture-mock` supplies in-memory stores for tests.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use aperture_core::{ApiDefinition, ApiEndpoint, HistoryRecord, Issue, Parameter, RequestVariation, SecurityRequirement, SecurityScheme, Severity};
use aperture_error::ApertureError;

/// A request the prober wants executed, prior to becoming a [`HistoryRecord`].
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Fully-resolved URL.
    pub url: String,
    /// HTTP method, uppercase.
    pub method: String,
    /// Request headers, caller-supplied entries win over transport
    /// defaults (see `aperture-transport`).
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Workspace the resulting HistoryRecord is attributed to.
    pub workspace_id: String,
}

/// Executes an [`OutboundRequest`] and produces a [`HistoryRecord`].
///
/// Implementations are expected to create the record via a `HistoryStore`
/// side effect as part of executing the request, per §6.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute `request`, aborting if `timeout` elapses first.
    async fn execute(
        &self,
        request: OutboundRequest,
        timeout: Duration,
    ) -> Result<HistoryRecord, ApertureError>;
}

/// Durable sink for [`HistoryRecord`]s, populated as a side effect of
/// transport execution. Must be safe for concurrent appenders.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Look up a previously-appended record by id.
    async fn get(&self, id: Uuid) -> Result<Option<HistoryRecord>, ApertureError>;
}

/// Durable sink for [`Issue`]s. Must be safe for concurrent appenders.
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Materializes an Issue from a matched detector's outcome.
    #[allow(clippy::too_many_arguments)]
    async fn create_issue_from_history_and_template(
        &self,
        history: HistoryRecord,
        code: String,
        details: String,
        confidence: u8,
        severity_override: Option<Severity>,
        workspace_id: String,
        task_id: Option<String>,
        task_job_id: Option<String>,
    ) -> Result<Issue, ApertureError>;
}

/// Optional oracle recognizing a site's soft-404/catch-all response,
/// consulted by the prober before a [`HistoryRecord`] reaches any
/// predicate.
#[async_trait]
pub trait SiteBehavior: Send + Sync {
    /// Returns `true` if `history` looks like the site's generic
    /// not-found/catch-all response rather than a genuine hit.
    async fn is_not_found(&self, history: &HistoryRecord) -> bool;
}

/// Every child row produced while ingesting one [`ApiDefinition`], in the
/// persist order mandated by §4.5. The store commits this whole tree in
/// one transaction (strict all-or-nothing, per `SPEC_FULL.md` §4.5).
#[derive(Debug, Clone, Default)]
pub struct DefinitionTree {
    /// Security schemes declared on the Definition.
    pub security_schemes: Vec<SecurityScheme>,
    /// Security requirements attached globally to the Definition.
    pub global_security: Vec<SecurityRequirement>,
    /// Endpoints belonging to the Definition.
    pub endpoints: Vec<ApiEndpoint>,
    /// Parameters, keyed by owning endpoint id.
    pub endpoint_parameters: Vec<(Uuid, Vec<Parameter>)>,
    /// Per-endpoint security requirements, keyed by endpoint id.
    pub endpoint_security: Vec<(Uuid, Vec<SecurityRequirement>)>,
    /// Canonical seed requests, keyed by endpoint id.
    pub request_variations: Vec<(Uuid, RequestVariation)>,
}

/// Idempotent, transactional storage for parsed API definitions.
#[async_trait]
pub trait ApiDefinitionStore: Send + Sync {
    /// True if a Definition already exists for `(workspace_id, source_url)`.
    async fn exists_by_source_url(
        &self,
        workspace_id: &str,
        source_url: &str,
    ) -> Result<bool, ApertureError>;

    /// Fetches the existing Definition for `(workspace_id, source_url)`,
    /// if any.
    async fn get_by_source_url(
        &self,
        workspace_id: &str,
        source_url: &str,
    ) -> Result<Option<ApiDefinition>, ApertureError>;

    /// Inserts a new Definition row. Callers must have already checked
    /// [`exists_by_source_url`](Self::exists_by_source_url).
    async fn create(&self, definition: ApiDefinition) -> Result<ApiDefinition, ApertureError>;

    /// Updates an existing Definition row (e.g. `endpoint_count`, `status`).
    async fn update(&self, definition: ApiDefinition) -> Result<ApiDefinition, ApertureError>;

    /// Persists a [`DefinitionTree`] for `definition_id` as a single
    /// transaction. Any child failure rolls back the entire tree, leaving
    /// no partially-persisted children.
    async fn persist_tree(
        &self,
        definition_id: Uuid,
        tree: DefinitionTree,
    ) -> Result<(), ApertureError>;
}
