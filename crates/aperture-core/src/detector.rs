use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::history::HistoryRecord;
use crate::issue::Severity;

/// Context threaded through a [`ValidationPredicate`] alongside the
/// [`HistoryRecord`] under test. Carries nothing the predicate could use to
/// introduce side effects — only read-only scan parameters.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Workspace the scan is running under.
    pub workspace_id: String,
    /// The base URL the scan was launched against.
    pub base_url: String,
}

/// Result of running a [`ValidationPredicate`] against one [`HistoryRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateOutcome {
    /// Whether the record satisfies the detector's criteria.
    pub matched: bool,
    /// Human-readable explanation, empty when `matched` is false.
    pub details: String,
    /// Confidence in `[0, 100]`.
    pub confidence: u8,
}

impl PredicateOutcome {
    /// The canonical "nothing here" outcome predicates return on any hard
    /// rejection or internal failure.
    pub fn no_match() -> Self {
        PredicateOutcome {
            matched: false,
            details: String::new(),
            confidence: 0,
        }
    }

    /// A positive outcome, clamping `confidence` into `[0, 100]`.
    pub fn hit(details: impl Into<String>, confidence: i32) -> Self {
        PredicateOutcome {
            matched: true,
            details: details.into(),
            confidence: confidence.clamp(0, 100) as u8,
        }
    }
}

/// A pure, side-effect-free classification function: given a
/// [`HistoryRecord`] and [`ValidationContext`], decide match/no-match and a
/// confidence score. Predicates never panic and never raise — internal
/// failures are represented as [`PredicateOutcome::no_match`].
pub type ValidationPredicate =
    Arc<dyn Fn(&HistoryRecord, &ValidationContext) -> PredicateOutcome + Send + Sync>;

/// A named bundle of candidate paths, request shape, and validation
/// predicate recognizing one class of exposed asset or API.
///
/// Detectors are data, not trait objects with behavior baked in by
/// inheritance — the registry is an explicit `Vec<Detector>` built by
/// catalog constructors in `aperture-detect`.
#[derive(Clone)]
pub struct Detector {
    /// Stable detector name, used for logging and issue attribution.
    pub name: String,
    /// Candidate path list, relative to the scan's base URL.
    pub paths: Vec<String>,
    /// HTTP method for every probe this detector issues.
    pub method: String,
    /// Extra headers merged into each probe (caller-level headers still win).
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// The predicate classifying each response.
    pub predicate: ValidationPredicate,
    /// Issue code emitted for a match.
    pub issue_code: String,
    /// Stop probing the remaining candidate paths after the first match.
    pub stop_after_valid: bool,
    /// Overrides the orchestrator's default severity for this detector's
    /// issues, when set.
    pub severity_override: Option<Severity>,
    /// True when a match should additionally trigger API-definition
    /// parsing and ingestion (OpenAPI / GraphQL / WSDL detectors).
    pub is_api_detector: bool,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("name", &self.name)
            .field("paths", &self.paths)
            .field("method", &self.method)
            .field("issue_code", &self.issue_code)
            .field("stop_after_valid", &self.stop_after_valid)
            .field("is_api_detector", &self.is_api_detector)
            .finish_non_exhaustive()
    }
}

/// Coarse throttle selector bounding the candidate-path budget per detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Small, curated path budget.
    Fast,
    /// Medium path budget.
    #[default]
    Smart,
    /// Unbounded — every candidate path is probed.
    Fuzz,
}

impl ScanMode {
    /// Maximum number of paths probed per detector under this mode, or
    /// `None` for unbounded.
    pub fn path_budget(self) -> Option<usize> {
        match self {
            ScanMode::Fast => Some(8),
            ScanMode::Smart => Some(40),
            ScanMode::Fuzz => None,
        }
    }

    /// Truncates `paths` to this mode's budget, preserving order.
    pub fn truncate(self, paths: &[String]) -> Vec<String> {
        match self.path_budget() {
            Some(limit) => paths.iter().take(limit).cloned().collect(),
            None => paths.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_clamps_confidence() {
        assert_eq!(PredicateOutcome::hit("x", 150).confidence, 100);
        assert_eq!(PredicateOutcome::hit("x", -10).confidence, 0);
    }

    #[test]
    fn no_match_is_zero_confidence() {
        let outcome = PredicateOutcome::no_match();
        assert!(!outcome.matched);
        assert_eq!(outcome.confidence, 0);
        assert!(outcome.details.is_empty());
    }

    #[test]
    fn fast_mode_truncates() {
        let paths: Vec<String> = (0..100).map(|i| format!("/p{i}")).collect();
        assert_eq!(ScanMode::Fast.truncate(&paths).len(), 8);
        assert_eq!(ScanMode::Smart.truncate(&paths).len(), 40);
        assert_eq!(ScanMode::Fuzz.truncate(&paths).len(), 100);
    }
}
