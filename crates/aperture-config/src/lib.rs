// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the `scan.*` surface
//! described in §6.
//!
//! This crate provides [`ScanConfig`] — the top-level scan settings —
//! together with helpers for loading from TOML files, applying environment
//! overrides, merging overlays, and producing advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// `scan.concurrency.per_detector` exceeds `scan.concurrency.outer`
    /// times a generous multiplier, which rarely improves throughput and
    /// mostly just adds connection pressure.
    UnusuallyHighInnerConcurrency {
        /// The configured value.
        value: u32,
    },
    /// `scan.minimum_confidence` is 0, meaning every predicate match
    /// (even near-zero-confidence ones) becomes an Issue.
    MinimumConfidenceDisabled,
    /// `scan.user_agent` was left at the built-in default.
    DefaultUserAgentInUse,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::UnusuallyHighInnerConcurrency { value } => {
                write!(f, "scan.concurrency.per_detector is unusually high ({value})")
            }
            ConfigWarning::MinimumConfidenceDisabled => {
                write!(f, "scan.minimum_confidence is 0: every match becomes an issue")
            }
            ConfigWarning::DefaultUserAgentInUse => {
                write!(f, "scan.user_agent left at built-in default")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// `scan.mode` — coarse throttle selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScanModeSetting {
    /// Small, curated path budget.
    Fast,
    /// Medium path budget.
    Smart,
    /// Unbounded.
    Fuzz,
}

/// Top-level scan configuration, recognized options per §6.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ScanConfig {
    /// `scan.concurrency.outer` — outer detector concurrency, default 5.
    #[serde(default = "default_outer_concurrency")]
    pub outer_concurrency: u32,

    /// `scan.concurrency.per_detector` — inner probing concurrency,
    /// default 10.
    #[serde(default = "default_per_detector_concurrency")]
    pub per_detector_concurrency: u32,

    /// `scan.timeout.per_request_seconds` — HTTP per-request timeout.
    #[serde(default = "default_per_request_timeout_seconds")]
    pub per_request_timeout_seconds: u64,

    /// `scan.mode` — `fast` | `smart` | `fuzz`.
    #[serde(default)]
    pub mode: ScanModeSetting,

    /// `scan.minimum_confidence` — threshold gating issue creation,
    /// default 50.
    #[serde(default = "default_minimum_confidence")]
    pub minimum_confidence: u8,

    /// `scan.user_agent` — override for the default User-Agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ScanModeSetting {
    fn default() -> Self {
        ScanModeSetting::Smart
    }
}

fn default_outer_concurrency() -> u32 {
    5
}

fn default_per_detector_concurrency() -> u32 {
    10
}

fn default_per_request_timeout_seconds() -> u64 {
    30
}

fn default_minimum_confidence() -> u8 {
    50
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            outer_concurrency: default_outer_concurrency(),
            per_detector_concurrency: default_per_detector_concurrency(),
            per_request_timeout_seconds: default_per_request_timeout_seconds(),
            mode: ScanModeSetting::default(),
            minimum_confidence: default_minimum_confidence(),
            user_agent: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAX_TIMEOUT_SECONDS: u64 = 300;
const HIGH_INNER_CONCURRENCY_THRESHOLD: u32 = 200;

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a [`ScanConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`ScanConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<ScanConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => ScanConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`ScanConfig`].
pub fn parse_toml(content: &str) -> Result<ScanConfig, ConfigError> {
    toml::from_str::<ScanConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Env overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides.
///
/// Recognized variables:
/// - `APERTURE_SCAN_OUTER_CONCURRENCY`
/// - `APERTURE_SCAN_PER_DETECTOR_CONCURRENCY`
/// - `APERTURE_SCAN_MINIMUM_CONFIDENCE`
/// - `APERTURE_SCAN_USER_AGENT`
pub fn apply_env_overrides(config: &mut ScanConfig) {
    if let Ok(val) = std::env::var("APERTURE_SCAN_OUTER_CONCURRENCY")
        && let Ok(n) = val.parse()
    {
        config.outer_concurrency = n;
    }
    if let Ok(val) = std::env::var("APERTURE_SCAN_PER_DETECTOR_CONCURRENCY")
        && let Ok(n) = val.parse()
    {
        config.per_detector_concurrency = n;
    }
    if let Ok(val) = std::env::var("APERTURE_SCAN_MINIMUM_CONFIDENCE")
        && let Ok(n) = val.parse()
    {
        config.minimum_confidence = n;
    }
    if let Ok(val) = std::env::var("APERTURE_SCAN_USER_AGENT") {
        config.user_agent = Some(val);
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (zero concurrency, out-of-range timeouts) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as warnings.
pub fn validate_config(config: &ScanConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if config.outer_concurrency == 0 {
        errors.push("scan.concurrency.outer must be at least 1".into());
    }
    if config.per_detector_concurrency == 0 {
        errors.push("scan.concurrency.per_detector must be at least 1".into());
    }
    if config.per_request_timeout_seconds == 0 || config.per_request_timeout_seconds > MAX_TIMEOUT_SECONDS {
        errors.push(format!(
            "scan.timeout.per_request_seconds out of range (1..{MAX_TIMEOUT_SECONDS})"
        ));
    }

    if config.per_detector_concurrency > HIGH_INNER_CONCURRENCY_THRESHOLD {
        warnings.push(ConfigWarning::UnusuallyHighInnerConcurrency {
            value: config.per_detector_concurrency,
        });
    }
    if config.minimum_confidence == 0 {
        warnings.push(ConfigWarning::MinimumConfidenceDisabled);
    }
    if config.user_agent.is_none() {
        warnings.push(ConfigWarning::DefaultUserAgentInUse);
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

// ---------------------------------------------------------------------------
// Merging
// ---------------------------------------------------------------------------

/// Merge two configurations. Values set in `overlay` take precedence over
/// `base`; `overlay`'s numeric/enum fields always win since [`ScanConfig`]
/// has no optional numeric fields to distinguish "unset" from "default" —
/// only `user_agent` is genuinely optional.
pub fn merge_configs(base: ScanConfig, overlay: ScanConfig) -> ScanConfig {
    ScanConfig {
        outer_concurrency: overlay.outer_concurrency,
        per_detector_concurrency: overlay.per_detector_concurrency,
        per_request_timeout_seconds: overlay.per_request_timeout_seconds,
        mode: overlay.mode,
        minimum_confidence: overlay.minimum_confidence,
        user_agent: overlay.user_agent.or(base.user_agent),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
