use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use aperture_collab::{HttpTransport, OutboundRequest, SiteBehavior};
use aperture_concurrency::{fan_out, CancellationToken};
use aperture_core::{HistoryRecord, PredicateOutcome, ValidationContext, ValidationPredicate};
use aperture_error::ApertureError;

use crate::url::join_url;

/// Fixed default headers applied unless the caller overrides them.
const DEFAULT_USER_AGENT: &str = "Aperture-ContentDiscovery/1.0";

/// Everything [`probe`] needs to fan a candidate path list out across a
/// bounded pool of concurrent HTTP requests.
pub struct ProbeRequest {
    /// Target base URL.
    pub base_url: String,
    /// Candidate paths, relative to `base_url`.
    pub paths: Vec<String>,
    /// HTTP method for every probe.
    pub method: String,
    /// Optional request body, shared across all probes.
    pub body: Option<Vec<u8>>,
    /// Extra headers merged into each probe; caller headers win over the
    /// fixed defaults.
    pub headers: Vec<(String, String)>,
    /// Max probes in flight at once.
    pub concurrency: usize,
    /// Per-request deadline.
    pub per_request_timeout: Duration,
    /// Cancel remaining probes after the first validated match.
    pub stop_after_valid: bool,
    /// Classifies each captured response.
    pub predicate: ValidationPredicate,
    /// Context passed through to the predicate.
    pub validation_context: ValidationContext,
    /// Optional false-404 filter, consulted before the predicate runs.
    pub site_behavior: Option<Arc<dyn SiteBehavior>>,
}

/// Outcome of [`probe`].
#[derive(Debug, Default)]
pub struct ProbeResult {
    /// HistoryRecords whose predicate matched, with their outcome.
    pub matches: Vec<(HistoryRecord, PredicateOutcome)>,
    /// HistoryRecords that were captured but did not match (and were not
    /// filtered out as soft-404s).
    pub non_matches: Vec<(HistoryRecord, PredicateOutcome)>,
    /// Errors from individual probes. A probe cancelled by early-stop
    /// contributes no error here.
    pub errors: Vec<ApertureError>,
    /// `true` iff a match triggered early-stop.
    pub stopped: bool,
}

enum ProbeOutcome {
    Cancelled,
    Error(ApertureError),
    Filtered,
    Classified(HistoryRecord, PredicateOutcome),
}

/// Bounded-concurrency fan-out over `request.paths`, applying
/// `request.predicate` to each captured response and honoring cooperative
/// early-stop when `request.stop_after_valid` is set.
#[instrument(skip_all, fields(base_url = %request.base_url, paths = request.paths.len()))]
pub async fn probe(
    request: ProbeRequest,
    transport: Arc<dyn HttpTransport>,
) -> Result<ProbeResult, ApertureError> {
    let ProbeRequest {
        base_url,
        paths,
        method,
        body,
        headers,
        concurrency,
        per_request_timeout,
        stop_after_valid,
        predicate,
        validation_context,
        site_behavior,
    } = request;

    let token = CancellationToken::new();
    let workspace_id = validation_context.workspace_id.clone();

    let items: Vec<String> = paths;
    let outcomes = fan_out(items, concurrency.max(1), move |path| {
        let base_url = base_url.clone();
        let method = method.clone();
        let body = body.clone();
        let headers = headers.clone();
        let predicate = Arc::clone(&predicate);
        let validation_context = validation_context.clone();
        let site_behavior = site_behavior.clone();
        let token = token.clone();
        let transport = Arc::clone(&transport);
        let workspace_id = workspace_id.clone();

        async move {
            if stop_after_valid && token.is_cancelled() {
                return ProbeOutcome::Cancelled;
            }

            let url = match join_url(&base_url, &path) {
                Ok(url) => url,
                Err(err) => return ProbeOutcome::Error(err),
            };

            let mut resolved_headers = vec![
                ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
                ("Connection".to_string(), "keep-alive".to_string()),
            ];
            if body.is_some() {
                resolved_headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            merge_headers_caller_wins(&mut resolved_headers, &headers);

            let outbound = OutboundRequest {
                url,
                method: method.clone(),
                headers: resolved_headers,
                body: body.clone(),
                workspace_id,
            };

            if stop_after_valid && token.is_cancelled() {
                return ProbeOutcome::Cancelled;
            }

            let record = tokio::select! {
                biased;
                _ = token.cancelled(), if stop_after_valid => return ProbeOutcome::Cancelled,
                result = transport.execute(outbound, per_request_timeout) => result,
            };

            let record = match record {
                Ok(record) => record,
                Err(err) => return ProbeOutcome::Error(err),
            };

            if let Some(behavior) = &site_behavior
                && behavior.is_not_found(&record).await
            {
                debug!(target: "aperture.prober", path = %path, "dropped as soft-404");
                return ProbeOutcome::Filtered;
            }

            let outcome = predicate(&record, &validation_context);
            if outcome.matched && stop_after_valid {
                token.cancel_first();
            }
            ProbeOutcome::Classified(record, outcome)
        }
    })
    .await;

    let mut result = ProbeResult::default();
    for outcome in outcomes {
        match outcome {
            ProbeOutcome::Cancelled | ProbeOutcome::Filtered => {}
            ProbeOutcome::Error(err) => result.errors.push(err),
            ProbeOutcome::Classified(record, outcome) => {
                if outcome.matched {
                    result.stopped = result.stopped || stop_after_valid;
                    result.matches.push((record, outcome));
                } else {
                    result.non_matches.push((record, outcome));
                }
            }
        }
    }
    result.stopped = stop_after_valid && !result.matches.is_empty();
    Ok(result)
}

fn merge_headers_caller_wins(base: &mut Vec<(String, String)>, caller: &[(String, String)]) {
    for (name, value) in caller {
        if let Some(existing) = base.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            existing.1 = value.clone();
        } else {
            base.push((name.clone(), value.clone()));
        }
    }
}
