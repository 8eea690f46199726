// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-wsdl
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! WSDL 1.1/2.0 parser. Lowers `binding/operation` pairs into the uniform
//! `[Operation]` shape the rest of the core consumes.

/// Structural XML scan into messages/portTypes/bindings.
pub mod dialect;
/// `binding/operation` → `Vec<Operation>` lowering.
pub mod lowering;

use aperture_core::{ApiKind, DefinitionMeta, Operation};
use aperture_error::ApertureError;

pub use dialect::WsdlDocument;

/// Result of parsing one WSDL document.
#[derive(Debug, Clone)]
pub struct ParsedWsdl {
    /// Always [`ApiKind::Wsdl`].
    pub kind: ApiKind,
    /// Type-specific summary metadata.
    pub meta: DefinitionMeta,
    /// The lowered operations.
    pub operations: Vec<Operation>,
}

/// Parses raw WSDL 1.1/2.0 XML against `base_url`.
pub fn parse(bytes: &[u8], base_url: &str) -> Result<ParsedWsdl, ApertureError> {
    let doc = dialect::parse_document(bytes)?;
    let operations = lowering::lower(&doc, base_url);
    let meta = DefinitionMeta::Wsdl(lowering::summarize(&doc));
    Ok(ParsedWsdl {
        kind: ApiKind::Wsdl,
        meta,
        operations,
    })
}
