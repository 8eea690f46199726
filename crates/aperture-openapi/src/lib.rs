// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-openapi
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! OpenAPI 3.x / Swagger 2.0 parser. Normalizes either dialect into the
//! uniform `[Operation]` shape the rest of the core consumes.

/// Document parsing and dialect detection.
pub mod dialect;
/// `paths × methods` → `Vec<Operation>` lowering.
pub mod lowering;

use aperture_core::{ApiKind, DefinitionMeta, Operation, SecurityScheme};
use aperture_error::ApertureError;

pub use dialect::{OpenApiDialect, OpenApiDocument};
pub use lowering::{ExternalDocs, DEFAULT_MAX_DEPTH};

/// Result of parsing one OpenAPI/Swagger document: the lowered operations
/// plus the summary metadata persisted on the owning `ApiDefinition`.
#[derive(Debug, Clone)]
pub struct ParsedOpenApi {
    /// `OpenApi` kind, always [`ApiKind::OpenApi`].
    pub kind: ApiKind,
    /// Type-specific summary metadata.
    pub meta: DefinitionMeta,
    /// The lowered operations.
    pub operations: Vec<Operation>,
    /// Every named security scheme declared on the document, regardless of
    /// whether any operation references it.
    pub security_schemes: Vec<SecurityScheme>,
}

/// Parses raw OpenAPI 3.x/Swagger 2.0 bytes (JSON or YAML) against
/// `base_url`, using the default schema recursion bound.
pub fn parse(bytes: &[u8], base_url: &str) -> Result<ParsedOpenApi, ApertureError> {
    parse_with_max_depth(bytes, base_url, DEFAULT_MAX_DEPTH)
}

/// As [`parse`], with an explicit schema recursion bound.
pub fn parse_with_max_depth(
    bytes: &[u8],
    base_url: &str,
    max_depth: usize,
) -> Result<ParsedOpenApi, ApertureError> {
    parse_with_external_docs(bytes, base_url, max_depth, &ExternalDocs::new())
}

/// As [`parse_with_max_depth`], resolving any `$ref` that points outside the
/// document (`"common.json#/components/schemas/Widget"` rather than
/// `"#/components/schemas/Widget"`) against `external_docs`, a table of
/// already-fetched-and-parsed documents keyed by the URI preceding the `#`.
///
/// This crate never performs I/O itself — fetching the referenced files over
/// HTTP or disk is the caller's job, mirroring the split between
/// `aperture-collab`'s transport and this crate's pure parsing everywhere
/// else in the core.
pub fn parse_with_external_docs(
    bytes: &[u8],
    base_url: &str,
    max_depth: usize,
    external_docs: &ExternalDocs,
) -> Result<ParsedOpenApi, ApertureError> {
    let doc = dialect::parse_document(bytes)?;
    let operations = lowering::lower_with_external_docs(&doc, base_url, max_depth, external_docs);
    let meta = DefinitionMeta::OpenApi(lowering::summarize(&doc));
    let security_schemes = lowering::security_schemes(&doc.root, doc.dialect);
    Ok(ParsedOpenApi {
        kind: ApiKind::OpenApi,
        meta,
        operations,
        security_schemes,
    })
}
