// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-detect
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! The detector catalog and validation predicate families: hard-rejection
//! gates, the shared scoring discipline, and one module per recognized
//! asset family (cloud metadata services, Kubernetes APIs, VCS leaks,
//! backup/dotenv files, well-known files, Flash crossdomain policies,
//! Prometheus metrics, SAML metadata, Jolokia bridges) plus the three
//! API-document discovery detectors (OpenAPI/Swagger, GraphQL
//! introspection, WSDL) that feed `aperture-ingest`.

/// Hard-rejection gates applied before any predicate scores a response.
pub mod gates;
/// One predicate constructor per recognized asset family.
pub mod predicates;
/// Builds the full `Vec<Detector>` catalog.
pub mod registry;
/// Shared weighted-signal scoring accumulator.
pub mod score;

pub use registry::build_catalog;
