use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One request/response pair produced by the prober.
///
/// Body bytes are held behind an `Arc<[u8]>` so repeated reads (the
/// invariant demands they be idempotent) never re-issue I/O or clone the
/// underlying buffer.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HistoryRecord {
    /// Identity assigned by the HistoryStore collaborator on append.
    pub id: uuid::Uuid,
    /// Fully-resolved URL that was requested.
    pub url: String,
    /// HTTP method, uppercase.
    pub method: String,
    /// HTTP status code.
    pub status_code: u16,
    /// Value of the response's `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Response headers in wire order.
    #[schemars(skip)]
    pub headers: Vec<(String, String)>,
    /// Raw response bytes.
    #[schemars(skip)]
    pub body: Arc<[u8]>,
    /// Workspace this probe ran under.
    pub workspace_id: String,
    /// When the response was captured.
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Returns the response body bytes. Idempotent: every call returns a
    /// cheap clone of the same backing allocation.
    pub fn body_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.body)
    }

    /// Body decoded as UTF-8, lossily replacing invalid sequences.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Case-insensitive header lookup, honoring the first matching entry.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if the status code falls in the given class's hundreds digit
    /// (e.g. `is_status_class(4)` matches 400..=499).
    pub fn is_status_class(&self, class: u16) -> bool {
        self.status_code / 100 == class
    }
}
