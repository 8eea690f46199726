// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-graphql
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! GraphQL introspection parser. Lowers `Query`/`Mutation`/`Subscription`
//! root fields into the uniform `[Operation]` shape the rest of the core
//! consumes.

/// Introspection response parsing.
pub mod dialect;
/// Schema-field → `Vec<Operation>` lowering.
pub mod lowering;

use aperture_core::{ApiKind, DefinitionMeta, Operation};
use aperture_error::ApertureError;

pub use dialect::IntrospectionDocument;
pub use lowering::DEFAULT_MAX_DEPTH;

/// Result of parsing one introspection document.
#[derive(Debug, Clone)]
pub struct ParsedGraphQl {
    /// Always [`ApiKind::GraphQl`].
    pub kind: ApiKind,
    /// Type-specific summary metadata.
    pub meta: DefinitionMeta,
    /// The lowered operations.
    pub operations: Vec<Operation>,
}

/// Parses an introspection JSON response against `base_url`, using the
/// default nesting bound.
pub fn parse(bytes: &[u8], base_url: &str) -> Result<ParsedGraphQl, ApertureError> {
    parse_with_max_depth(bytes, base_url, DEFAULT_MAX_DEPTH)
}

/// As [`parse`], with an explicit input-object nesting bound.
pub fn parse_with_max_depth(
    bytes: &[u8],
    base_url: &str,
    max_depth: usize,
) -> Result<ParsedGraphQl, ApertureError> {
    let doc = dialect::parse_document(bytes)?;
    let operations = lowering::lower(&doc, base_url, max_depth);
    let meta = DefinitionMeta::GraphQl(lowering::summarize(&doc));
    Ok(ParsedGraphQl {
        kind: ApiKind::GraphQl,
        meta,
        operations,
    })
}

/// The canonical introspection query used to discover a server's schema.
pub const INTROSPECTION_QUERY: &str = include_str!("introspection_query.graphql");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn introspection_query_targets_schema() {
        assert!(INTROSPECTION_QUERY.contains("__schema"));
    }
}
