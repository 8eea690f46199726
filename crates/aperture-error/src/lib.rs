//! Unified error taxonomy with stable error codes for the content-discovery
//! and API-ingestion core.
//!
//! Every [`ApertureError`] carries an [`ErrorCode`] (a machine-readable,
//! stable string tag), a human-readable message, an optional cause chain,
//! and arbitrary key-value context. Use the builder returned by
//! [`ApertureError::new`] to construct errors fluently.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family an [`ErrorCode`] belongs to, following §7's error-kind split:
/// input validation, transport, parsing, and persistence. `Cancelled` is
/// deliberately not an [`ErrorCategory`] — cancellation is filtered out of
/// aggregated error lists rather than surfaced as a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Caller-supplied input was invalid before any probing began.
    Input,
    /// Network, TLS, DNS, or timeout failure executing a request.
    Transport,
    /// A response or document failed a format-grammar check.
    Parse,
    /// Storage rejected a row or transaction.
    Persistence,
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Transport => "transport",
            Self::Parse => "parse",
            Self::Persistence => "persistence",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serializes to a `SCREAMING_SNAKE_CASE` string guaranteed
/// not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Input --
    /// Base URL was empty.
    InputEmptyUrl,
    /// Base URL failed to parse.
    InputUnparseableUrl,
    /// `scan.mode` was not one of `fast`/`smart`/`fuzz`.
    InputInvalidScanMode,

    // -- Transport --
    /// Underlying network call failed (connect/reset/DNS).
    TransportNetworkFailure,
    /// TLS handshake or certificate validation failed.
    TransportTlsFailure,
    /// Request exceeded its per-request or overall deadline.
    TransportTimeout,

    // -- Parse --
    /// Response body failed a predicate's format-grammar check.
    ParseGrammarRejected,
    /// Document failed to parse as a known API-description format.
    ParseDocumentInvalid,
    /// Recursion depth bound was reached while walking a schema.
    ParseDepthExceeded,

    // -- Persistence --
    /// Storage rejected a row during ingestion.
    PersistenceRowRejected,
    /// A transactional ingestion was rolled back.
    PersistenceTransactionRolledBack,

    // -- Internal --
    /// Catch-all for unexpected internal errors.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputEmptyUrl | Self::InputUnparseableUrl | Self::InputInvalidScanMode => {
                ErrorCategory::Input
            }

            Self::TransportNetworkFailure | Self::TransportTlsFailure | Self::TransportTimeout => {
                ErrorCategory::Transport
            }

            Self::ParseGrammarRejected | Self::ParseDocumentInvalid | Self::ParseDepthExceeded => {
                ErrorCategory::Parse
            }

            Self::PersistenceRowRejected | Self::PersistenceTransactionRolledBack => {
                ErrorCategory::Persistence
            }

            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"INPUT_EMPTY_URL"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputEmptyUrl => "INPUT_EMPTY_URL",
            Self::InputUnparseableUrl => "INPUT_UNPARSEABLE_URL",
            Self::InputInvalidScanMode => "INPUT_INVALID_SCAN_MODE",
            Self::TransportNetworkFailure => "TRANSPORT_NETWORK_FAILURE",
            Self::TransportTlsFailure => "TRANSPORT_TLS_FAILURE",
            Self::TransportTimeout => "TRANSPORT_TIMEOUT",
            Self::ParseGrammarRejected => "PARSE_GRAMMAR_REJECTED",
            Self::ParseDocumentInvalid => "PARSE_DOCUMENT_INVALID",
            Self::ParseDepthExceeded => "PARSE_DEPTH_EXCEEDED",
            Self::PersistenceRowRejected => "PERSISTENCE_ROW_REJECTED",
            Self::PersistenceTransactionRolledBack => "PERSISTENCE_TRANSACTION_ROLLED_BACK",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApertureError
// ---------------------------------------------------------------------------

/// Unified error type for the core.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use aperture_error::{ApertureError, ErrorCode};
///
/// let err = ApertureError::new(ErrorCode::TransportTimeout, "timed out after 30 s")
///     .with_context("path", "/swagger.json")
///     .with_context("timeout_ms", 30_000);
/// ```
pub struct ApertureError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl ApertureError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if
    /// serialization fails, the entry is silently skipped.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }
}

impl fmt::Debug for ApertureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("ApertureError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for ApertureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ApertureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serializable snapshot of an [`ApertureError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApertureErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&ApertureError> for ApertureErrorDto {
    fn from(err: &ApertureError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<ApertureErrorDto> for ApertureError {
    fn from(dto: ApertureErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
