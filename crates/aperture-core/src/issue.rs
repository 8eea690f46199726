use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::history::HistoryRecord;

/// Severity classification. The core never decides this on its own
/// initiative beyond detector-declared overrides (e.g. the crossdomain.xml
/// predicate) — it is otherwise an opaque pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational only.
    Info,
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
}

/// A finding produced by the orchestrator from a matched [`Detector`](crate::detector::Detector).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Issue {
    /// Detector-declared issue code.
    pub code: String,
    /// Predicate confidence, `0..=100`.
    pub confidence: u8,
    /// Human-readable detail text from the predicate.
    pub details: String,
    /// Severity assigned to this issue.
    pub severity: Severity,
    /// The [`HistoryRecord`] that triggered the match.
    #[schemars(skip)]
    pub history: HistoryRecord,
    /// Workspace the scan ran under.
    pub workspace_id: String,
    /// Task identifier, when the scan was launched as part of a task.
    pub task_id: Option<String>,
    /// Task job identifier, when applicable.
    pub task_job_id: Option<String>,
}
