use aperture_error::{ApertureError, ErrorCode};
use serde_json::Value;

/// Which document dialect was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApiDialect {
    /// Swagger 2.0.
    Swagger2,
    /// OpenAPI 3.x.
    OpenApi3,
}

/// A parsed document plus its detected dialect and declared version string.
#[derive(Debug, Clone)]
pub struct OpenApiDocument {
    /// `Swagger2` or `OpenApi3`.
    pub dialect: OpenApiDialect,
    /// Raw `"2.0"` / `"3.0.x"` / `"3.1.x"` version string.
    pub version: String,
    /// The full parsed document.
    pub root: Value,
}

/// Parses `bytes` as JSON first, falling back to YAML, then detects the
/// Swagger 2.0 / OpenAPI 3.x dialect from the top-level `swagger`/`openapi`
/// key.
pub fn parse_document(bytes: &[u8]) -> Result<OpenApiDocument, ApertureError> {
    let root: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(json_err) => serde_yml::from_slice::<Value>(bytes).map_err(|yaml_err| {
            ApertureError::new(
                ErrorCode::ParseDocumentInvalid,
                "document is neither valid JSON nor valid YAML",
            )
            .with_context("json_error", json_err.to_string())
            .with_context("yaml_error", yaml_err.to_string())
        })?,
    };

    if let Some(version) = root.get("swagger").and_then(Value::as_str) {
        return Ok(OpenApiDocument {
            dialect: OpenApiDialect::Swagger2,
            version: version.to_string(),
            root,
        });
    }
    if let Some(version) = root.get("openapi").and_then(Value::as_str) {
        return Ok(OpenApiDocument {
            dialect: OpenApiDialect::OpenApi3,
            version: version.to_string(),
            root,
        });
    }

    Err(ApertureError::new(
        ErrorCode::ParseDocumentInvalid,
        "document has neither a `swagger` nor `openapi` version key",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_openapi_3() {
        let doc = parse_document(br#"{"openapi":"3.0.3","paths":{}}"#).unwrap();
        assert_eq!(doc.dialect, OpenApiDialect::OpenApi3);
        assert_eq!(doc.version, "3.0.3");
    }

    #[test]
    fn detects_swagger_2() {
        let doc = parse_document(br#"{"swagger":"2.0","paths":{}}"#).unwrap();
        assert_eq!(doc.dialect, OpenApiDialect::Swagger2);
    }

    #[test]
    fn parses_yaml_input() {
        let yaml = b"openapi: 3.0.0\npaths: {}\n";
        let doc = parse_document(yaml).unwrap();
        assert_eq!(doc.dialect, OpenApiDialect::OpenApi3);
    }

    #[test]
    fn rejects_missing_version_key() {
        let err = parse_document(br#"{"paths":{}}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::ParseDocumentInvalid);
    }
}
