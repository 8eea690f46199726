use aperture_error::{ApertureError, ErrorCode};
use serde_json::Value;

/// A parsed GraphQL introspection response, rooted at `data.__schema`.
#[derive(Debug, Clone)]
pub struct IntrospectionDocument {
    /// The `data.__schema` object.
    pub schema: Value,
}

/// Parses `bytes` as a standard introspection response
/// (`{"data":{"__schema":{...}}}`), per §6's wire-format rule.
pub fn parse_document(bytes: &[u8]) -> Result<IntrospectionDocument, ApertureError> {
    let root: Value = serde_json::from_slice(bytes).map_err(|source| {
        ApertureError::new(ErrorCode::ParseDocumentInvalid, "introspection response is not valid JSON")
            .with_context("json_error", source.to_string())
    })?;

    let schema = root
        .pointer("/data/__schema")
        .cloned()
        .ok_or_else(|| {
            ApertureError::new(
                ErrorCode::ParseDocumentInvalid,
                "response is missing data.__schema",
            )
        })?;

    Ok(IntrospectionDocument { schema })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_schema_node() {
        let doc = parse_document(br#"{"data":{"__schema":{"queryType":{"name":"Query"},"types":[]}}}"#).unwrap();
        assert_eq!(doc.schema.get("queryType").unwrap().get("name").unwrap(), "Query");
    }

    #[test]
    fn rejects_missing_schema_node() {
        let err = parse_document(br#"{"data":{}}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseDocumentInvalid);
    }
}
