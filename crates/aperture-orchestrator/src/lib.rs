// SPDX-License-Identifier: MIT OR Apache-2.0
//! Discovery Orchestrator (§4.3): fans the detector catalog out across a
//! bounded outer-concurrency pool, runs each detector's inner probing
//! through `aperture-prober`, gates issue creation on
//! `scan.minimum_confidence` uniformly (no detector hardcodes its own
//! threshold), and — for the three API-document detectors — dispatches the
//! matched response to the matching parser and `ApiIngestor`.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use aperture_collab::{ApiDefinitionStore, HttpTransport, IssueStore, OutboundRequest, SiteBehavior};
use aperture_concurrency::fan_out;
use aperture_config::ScanConfig;
use aperture_core::{Detector, Issue, ScanMode, ValidationContext};
use aperture_detect::build_catalog;
use aperture_error::{ApertureError, ErrorCode};
use aperture_ingest::{ApiIngestor, IngestInput, IngestOutcome};
use aperture_prober::{probe, ProbeRequest};

/// Names of the catalog's three API-document detectors, matched to decide
/// which parser a hit is handed to. Kept here rather than on `Detector`
/// itself since the dispatch is a format choice, not a detector property.
const OPENAPI_DETECTOR_NAME: &str = "openapi-document";
const GRAPHQL_DETECTOR_NAME: &str = "graphql-introspection";
const WSDL_DETECTOR_NAME: &str = "wsdl-document";

/// Everything one [`DiscoveryOrchestrator::discover_all`] call needs.
pub struct DiscoverOptions {
    /// Target base URL, passed through to every detector's prober call.
    pub base_url: String,
    /// Workspace the scan runs under.
    pub workspace_id: String,
    /// Scan-mode path-budget truncation, applied per detector before probing.
    pub scan_mode: ScanMode,
    /// Resolved scan configuration (concurrency caps, timeout, confidence
    /// threshold, user agent).
    pub config: ScanConfig,
    /// Optional false-404 filter, forwarded to every detector's prober call.
    pub site_behavior: Option<Arc<dyn SiteBehavior>>,
    /// Task attribution carried onto created issues.
    pub task_id: Option<String>,
    /// Task-job attribution carried onto created issues.
    pub task_job_id: Option<String>,
}

/// Outcome of running one detector to completion.
#[derive(Debug, Default)]
pub struct DetectorRunResult {
    /// The detector's stable name.
    pub detector_name: String,
    /// Issues created from matches whose confidence cleared
    /// `scan.minimum_confidence`.
    pub issues: Vec<Issue>,
    /// Aggregated probe, issue-creation, and ingestion errors. A detector
    /// erroring or panicking never aborts the overall run (§4.3 failure
    /// isolation) — its errors are reported here instead.
    pub errors: Vec<ApertureError>,
    /// `true` iff this detector's probing stopped early on a match.
    pub stopped: bool,
    /// Set when this was an API-document detector and a match was
    /// successfully parsed and ingested.
    pub ingested: Vec<IngestOutcome>,
}

/// Full result of one [`DiscoveryOrchestrator::discover_all`] call: one
/// [`DetectorRunResult`] per registered detector.
#[derive(Debug, Default)]
pub struct DiscoverOutcome {
    /// Per-detector results, in catalog order.
    pub results: Vec<DetectorRunResult>,
}

impl DiscoverOutcome {
    /// All issues across every detector, in catalog order.
    pub fn all_issues(&self) -> Vec<Issue> {
        self.results.iter().flat_map(|r| r.issues.clone()).collect()
    }

    /// All errors across every detector, in catalog order.
    pub fn all_errors(&self) -> Vec<&ApertureError> {
        self.results.iter().flat_map(|r| r.errors.iter()).collect()
    }
}

/// Fans the detector catalog out, gates issue emission, and dispatches
/// API-document matches to the ingestor.
pub struct DiscoveryOrchestrator {
    transport: Arc<dyn HttpTransport>,
    issue_store: Arc<dyn IssueStore>,
    ingestor: Arc<ApiIngestor>,
    catalog: Vec<Detector>,
}

impl DiscoveryOrchestrator {
    /// Builds an orchestrator over the full built-in detector catalog.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        issue_store: Arc<dyn IssueStore>,
        definition_store: Arc<dyn ApiDefinitionStore>,
    ) -> Self {
        DiscoveryOrchestrator {
            transport,
            issue_store,
            ingestor: Arc::new(ApiIngestor::new(definition_store)),
            catalog: build_catalog(),
        }
    }

    /// `DiscoverAll` (§4.3), struct-based entry point: runs every catalog
    /// detector against `options.base_url`, returning one result per
    /// detector regardless of individual detector failures.
    pub async fn discover_all(&self, options: DiscoverOptions) -> Result<DiscoverOutcome, ApertureError> {
        if options.base_url.trim().is_empty() {
            return Err(ApertureError::new(ErrorCode::InputEmptyUrl, "base url is empty"));
        }

        let outer_concurrency = (options.config.outer_concurrency as usize).max(1);
        let options = Arc::new(options);
        let catalog = self.catalog.clone();
        let transport = Arc::clone(&self.transport);
        let issue_store = Arc::clone(&self.issue_store);
        let ingestor = Arc::clone(&self.ingestor);

        let results = fan_out(catalog, outer_concurrency, move |detector| {
            let options = Arc::clone(&options);
            let transport = Arc::clone(&transport);
            let issue_store = Arc::clone(&issue_store);
            let ingestor = Arc::clone(&ingestor);
            async move { run_detector(detector, options, transport, issue_store, ingestor).await }
        })
        .await;

        Ok(DiscoverOutcome { results })
    }
}

async fn run_detector(
    detector: Detector,
    options: Arc<DiscoverOptions>,
    transport: Arc<dyn HttpTransport>,
    issue_store: Arc<dyn IssueStore>,
    ingestor: Arc<ApiIngestor>,
) -> DetectorRunResult {
    let truncated_paths = options.scan_mode.truncate(&detector.paths);
    let path_count = truncated_paths.len();
    let span = info_span!(
        target: "aperture.orchestrator",
        "detector_run",
        detector = %detector.name,
        path_count
    );

    async {
        let probe_request = ProbeRequest {
            base_url: options.base_url.clone(),
            paths: truncated_paths,
            method: detector.method.clone(),
            body: detector.body.clone(),
            headers: detector.headers.clone(),
            concurrency: (options.config.per_detector_concurrency as usize).max(1),
            per_request_timeout: Duration::from_secs(options.config.per_request_timeout_seconds),
            stop_after_valid: detector.stop_after_valid,
            predicate: detector.predicate.clone(),
            validation_context: ValidationContext {
                workspace_id: options.workspace_id.clone(),
                base_url: options.base_url.clone(),
            },
            site_behavior: options.site_behavior.clone(),
        };

        let mut result = DetectorRunResult {
            detector_name: detector.name.clone(),
            ..Default::default()
        };

        let probe_result = match probe(probe_request, Arc::clone(&transport)).await {
            Ok(probe_result) => probe_result,
            Err(err) => {
                warn!(target: "aperture.orchestrator", detector = %detector.name, error = %err, "detector probing failed");
                result.errors.push(err);
                info!(
                    target: "aperture.orchestrator",
                    detector = %detector.name,
                    path_count,
                    match_count = 0,
                    error_count = result.errors.len(),
                    "detector run complete"
                );
                return result;
            }
        };

        result.stopped = probe_result.stopped;
        result.errors.extend(probe_result.errors);

        for (record, outcome) in probe_result.matches {
            if outcome.confidence < options.config.minimum_confidence {
                continue;
            }

            match issue_store
                .create_issue_from_history_and_template(
                    record.clone(),
                    detector.issue_code.clone(),
                    outcome.details.clone(),
                    outcome.confidence,
                    detector.severity_override,
                    options.workspace_id.clone(),
                    options.task_id.clone(),
                    options.task_job_id.clone(),
                )
                .await
            {
                Ok(issue) => result.issues.push(issue),
                Err(err) => result.errors.push(err),
            }

            if detector.is_api_detector {
                match ingest_api_document(&detector.name, &record, &options, &transport, &ingestor).await {
                    Ok(Some(outcome)) => result.ingested.push(outcome),
                    Ok(None) => {}
                    Err(err) => result.errors.push(err),
                }
            }
        }

        info!(
            target: "aperture.orchestrator",
            detector = %detector.name,
            path_count,
            match_count = result.issues.len(),
            error_count = result.errors.len(),
            "detector run complete"
        );

        result
    }
    .instrument(span)
    .await
}

/// Parses a matched API-document response and persists it through
/// [`ApiIngestor`]. Returns `Ok(None)` for a detector name outside the
/// three recognized API formats (never hit in practice, since only
/// `is_api_detector` detectors reach this call).
async fn ingest_api_document(
    detector_name: &str,
    record: &aperture_core::HistoryRecord,
    options: &DiscoverOptions,
    transport: &Arc<dyn HttpTransport>,
    ingestor: &Arc<ApiIngestor>,
) -> Result<Option<IngestOutcome>, ApertureError> {
    let (kind, meta, operations, security_schemes) = match detector_name {
        OPENAPI_DETECTOR_NAME => {
            let parsed = aperture_openapi::parse(&record.body, &options.base_url)?;
            (parsed.kind, parsed.meta, parsed.operations, parsed.security_schemes)
        }
        WSDL_DETECTOR_NAME => {
            let parsed = aperture_wsdl::parse(&record.body, &options.base_url)?;
            (parsed.kind, parsed.meta, parsed.operations, Vec::new())
        }
        GRAPHQL_DETECTOR_NAME => {
            let introspection = fetch_full_introspection(record, options, transport).await?;
            let parsed = aperture_graphql::parse(&introspection, &record.url)?;
            (parsed.kind, parsed.meta, parsed.operations, Vec::new())
        }
        _ => return Ok(None),
    };

    let outcome = ingestor
        .ingest(IngestInput {
            workspace_id: options.workspace_id.clone(),
            source_url: record.url.clone(),
            base_url: options.base_url.clone(),
            raw: record.body.to_vec(),
            auto_discovered: true,
            kind,
            meta,
            operations,
            security_schemes,
        })
        .await?;

    Ok(Some(outcome))
}

/// The discovery probe's introspection body is intentionally minimal (just
/// enough to confirm a GraphQL endpoint); a full schema walk needs the
/// complete introspection query, so a match triggers one follow-up request
/// before parsing.
async fn fetch_full_introspection(
    record: &aperture_core::HistoryRecord,
    options: &DiscoverOptions,
    transport: &Arc<dyn HttpTransport>,
) -> Result<Vec<u8>, ApertureError> {
    let body = serde_json::to_vec(&serde_json::json!({
        "query": aperture_graphql::INTROSPECTION_QUERY,
    }))
    .map_err(|e| ApertureError::new(ErrorCode::Internal, "failed to encode introspection query").with_source(e))?;

    let outbound = OutboundRequest {
        url: record.url.clone(),
        method: "POST".to_string(),
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body: Some(body),
        workspace_id: options.workspace_id.clone(),
    };

    let timeout = Duration::from_secs(options.config.per_request_timeout_seconds);
    let full = transport.execute(outbound, timeout).await?;
    Ok(full.body.to_vec())
}
