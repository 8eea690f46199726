// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-core
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The stable data contract shared by every crate in the content-discovery
//! and API-ingestion core: history records, detectors, the normalized API
//! model (definitions, endpoints, parameters, security), and issues.

/// Normalized API model: definitions, endpoints, parameter trees, security.
pub mod api;
/// Detector catalog and validation-predicate contract.
pub mod detector;
/// One request/response pair as observed by the prober.
pub mod history;
/// Orchestrator-produced findings.
pub mod issue;
/// Canonical seed requests derived from an endpoint's default values.
pub mod variation;

pub use api::{
    ApiDefinition, ApiEndpoint, ApiKind, ApiStatus, Constraints, DataType, DefinitionMeta,
    GraphQlMeta, OpenApiMeta, Operation, OperationMeta, Parameter, ParameterLocation,
    SecurityRequirement, SecurityScheme, SecuritySchemeKind, WsdlMeta,
};
pub use detector::{Detector, PredicateOutcome, ScanMode, ValidationContext, ValidationPredicate};
pub use history::HistoryRecord;
pub use issue::{Issue, Severity};
pub use variation::RequestVariation;

/// Current shape of the normalized API model, embedded in serialized
/// `Operation` trees so downstream consumers can detect drift.
pub const MODEL_VERSION: &str = "aperture-core/v1";
