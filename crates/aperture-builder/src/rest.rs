use std::collections::BTreeMap;

use aperture_core::{DataType, Operation, Parameter, ParameterLocation};
use aperture_error::{ApertureError, ErrorCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::defaults::{effective_value, scalar_to_string, ParamValues};
use crate::{apply_auth, BuildContext, HttpRequest, RequestBuilder, DEFAULT_BUILDER_USER_AGENT};

/// `{` and `}` must survive path-segment escaping so templating can find
/// them; every other reserved character is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Builds REST/HTTP requests from `OperationMeta::OpenApi` operations.
#[derive(Debug, Default)]
pub struct RestRequestBuilder;

impl RestRequestBuilder {
    /// Substitutes every `{name}` path placeholder exactly once, in a
    /// single left-to-right pass, so a substituted value containing `{` or
    /// `}` can never be mistaken for another placeholder.
    fn render_path(template: &str, path_params: &BTreeMap<String, String>) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            rest = &rest[open + 1..];
            let Some(close) = rest.find('}') else {
                out.push('{');
                out.push_str(rest);
                rest = "";
                break;
            };
            let name = &rest[..close];
            rest = &rest[close + 1..];
            match path_params.get(name) {
                Some(value) => out.push_str(&utf8_percent_encode(value, PATH_SEGMENT).to_string()),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn append_query(url: &mut String, name: &str, value: &str) {
        let separator = if url.contains('?') { '&' } else { '?' };
        url.push(separator);
        url.push_str(&utf8_percent_encode(name, NON_ALPHANUMERIC).to_string());
        url.push('=');
        url.push_str(&utf8_percent_encode(value, NON_ALPHANUMERIC).to_string());
    }

    fn encode_body(
        body_params: &[&Parameter],
        values: &ParamValues,
        content_type: &str,
    ) -> Result<Option<Vec<u8>>, ApertureError> {
        if body_params.is_empty() {
            return Ok(None);
        }
        if content_type == "application/x-www-form-urlencoded" {
            let mut pairs = form_urlencoded::Serializer::new(String::new());
            for param in body_params {
                if let Some(v) = effective_value(param, values) {
                    pairs.append_pair(&param.name, &scalar_to_string(&v));
                }
            }
            return Ok(Some(pairs.finish().into_bytes()));
        }
        if content_type.starts_with("multipart/form-data") {
            let boundary = "aperture-boundary";
            let mut body = String::new();
            for param in body_params {
                if let Some(v) = effective_value(param, values) {
                    body.push_str("--");
                    body.push_str(boundary);
                    body.push_str("\r\n");
                    body.push_str(&format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                        param.name
                    ));
                    body.push_str(&scalar_to_string(&v));
                    body.push_str("\r\n");
                }
            }
            body.push_str("--");
            body.push_str(boundary);
            body.push_str("--\r\n");
            return Ok(Some(body.into_bytes()));
        }
        // JSON body: a single non-object body parameter is the body itself;
        // multiple parameters (expanded object properties) form a map.
        let mut map = serde_json::Map::new();
        for param in body_params {
            if let Some(v) = effective_value(param, values) {
                map.insert(param.name.clone(), v);
            }
        }
        if body_params.len() == 1 && body_params[0].name == "body" {
            let value = effective_value(body_params[0], values).unwrap_or(Value::Null);
            return Ok(Some(
                serde_json::to_vec(&value)
                    .map_err(|e| ApertureError::new(ErrorCode::Internal, e.to_string()))?,
            ));
        }
        Ok(Some(
            serde_json::to_vec(&Value::Object(map))
                .map_err(|e| ApertureError::new(ErrorCode::Internal, e.to_string()))?,
        ))
    }
}

impl RequestBuilder for RestRequestBuilder {
    fn build(
        &self,
        ctx: &BuildContext,
        operation: &Operation,
        values: &ParamValues,
    ) -> Result<HttpRequest, ApertureError> {
        let url_path = operation.url_path.as_deref().unwrap_or("");

        let mut path_params = BTreeMap::new();
        let mut query_pairs: Vec<(String, String)> = Vec::new();
        let mut header_pairs: Vec<(String, String)> = Vec::new();
        let mut cookie_pairs: Vec<(String, String)> = Vec::new();
        let mut body_params: Vec<&Parameter> = Vec::new();

        for param in &operation.parameters {
            match param.location {
                ParameterLocation::Path => {
                    if let Some(v) = effective_value(param, values) {
                        path_params.insert(param.name.clone(), scalar_to_string(&v));
                    }
                }
                ParameterLocation::Query => {
                    if let Some(v) = effective_value(param, values) {
                        push_query_values(&mut query_pairs, &param.name, param.data_type, &v);
                    }
                }
                ParameterLocation::Header => {
                    if let Some(v) = effective_value(param, values) {
                        header_pairs.push((param.name.clone(), scalar_to_string(&v)));
                    }
                }
                ParameterLocation::Cookie => {
                    if let Some(v) = effective_value(param, values) {
                        cookie_pairs.push((param.name.clone(), scalar_to_string(&v)));
                    }
                }
                ParameterLocation::Body => body_params.push(param),
                ParameterLocation::Argument => {}
            }
        }

        let mut url = operation.base_url.trim_end_matches('/').to_string();
        url.push_str(&Self::render_path(url_path, &path_params));
        for (name, value) in &query_pairs {
            Self::append_query(&mut url, name, value);
        }

        let mut request = HttpRequest {
            url,
            method: if operation.method.is_empty() {
                "GET".to_string()
            } else {
                operation.method.to_uppercase()
            },
            headers: ctx.caller_headers.clone(),
            ..Default::default()
        };

        if !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent")) {
            request.set_header("User-Agent", DEFAULT_BUILDER_USER_AGENT);
        }
        if !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept")) {
            request.set_header("Accept", "application/json, */*");
        }

        for (name, value) in header_pairs {
            request.set_header(name, value);
        }
        if !cookie_pairs.is_empty() {
            let cookie = cookie_pairs
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; ");
            request.set_header("Cookie", cookie);
        }

        if !body_params.is_empty() {
            let content_type = operation
                .request_content_types
                .first()
                .cloned()
                .unwrap_or_else(|| "application/json".to_string());
            if let Some(body) = Self::encode_body(&body_params, values, &content_type)? {
                request.body = Some(body);
                request.set_header("Content-Type", content_type);
            }
        }

        apply_auth(&mut request, &ctx.auth.0);
        Ok(request)
    }
}

fn push_query_values(pairs: &mut Vec<(String, String)>, name: &str, data_type: DataType, value: &Value) {
    if data_type == DataType::Array {
        if let Value::Array(items) = value {
            for item in items {
                pairs.push((name.to_string(), scalar_to_string(item)));
            }
            return;
        }
    }
    pairs.push((name.to_string(), scalar_to_string(value)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::{ApiKind, OperationMeta};

    fn op(url_path: &str, method: &str, parameters: Vec<Parameter>) -> Operation {
        Operation {
            definition_id: None,
            api_kind: ApiKind::OpenApi,
            display_name: "test".into(),
            method: method.into(),
            url_path: Some(url_path.into()),
            base_url: "https://api.example.test".into(),
            operation_id: "test-op".into(),
            summary: None,
            description: None,
            deprecated: false,
            tags: vec![],
            parameters,
            security: vec![],
            request_content_types: vec![],
            response_content_types: vec![],
            return_type: None,
            meta: OperationMeta::OpenApi,
        }
    }

    fn param(name: &str, location: ParameterLocation, required: bool, data_type: DataType) -> Parameter {
        Parameter {
            name: name.into(),
            location,
            required,
            data_type,
            ..Default::default()
        }
    }

    #[test]
    fn path_param_is_substituted_and_escaped() {
        let operation = op("/users/{id}/posts", "GET", vec![param("id", ParameterLocation::Path, true, DataType::String)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("id".into(), Value::String("a b".into()));
        let request = RestRequestBuilder.build(&ctx, &operation, &values).unwrap();
        assert_eq!(request.url, "https://api.example.test/users/a%20b/posts");
    }

    #[test]
    fn missing_required_path_param_falls_back_to_placeholder() {
        let operation = op("/users/{id}", "GET", vec![param("id", ParameterLocation::Path, true, DataType::Integer)]);
        let ctx = BuildContext::default();
        let request = RestRequestBuilder.build(&ctx, &operation, &ParamValues::new()).unwrap();
        assert_eq!(request.url, "https://api.example.test/users/0");
    }

    #[test]
    fn array_query_param_repeats_key() {
        let operation = op("/items", "GET", vec![param("tag", ParameterLocation::Query, true, DataType::Array)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("tag".into(), serde_json::json!(["a", "b"]));
        let request = RestRequestBuilder.build(&ctx, &operation, &values).unwrap();
        assert_eq!(request.url, "https://api.example.test/items?tag=a&tag=b");
    }

    #[test]
    fn default_user_agent_skipped_when_caller_supplied_one() {
        let operation = op("/ping", "GET", vec![]);
        let ctx = BuildContext {
            caller_headers: vec![("User-Agent".into(), "custom-agent/1.0".into())],
            ..Default::default()
        };
        let request = RestRequestBuilder.build(&ctx, &operation, &ParamValues::new()).unwrap();
        let agents: Vec<_> = request.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("user-agent")).collect();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0].1, "custom-agent/1.0");
    }

    #[test]
    fn auth_header_applied_last_overrides_param_header() {
        let operation = op(
            "/ping",
            "GET",
            vec![param("Authorization", ParameterLocation::Header, false, DataType::String)],
        );
        let ctx = BuildContext {
            auth: crate::AuthStrategyOrNone(crate::AuthStrategy::Bearer("tok".into())),
            ..Default::default()
        };
        let mut values = ParamValues::new();
        values.insert("Authorization".into(), Value::String("stale".into()));
        let request = RestRequestBuilder.build(&ctx, &operation, &values).unwrap();
        let auth_headers: Vec<_> = request.headers.iter().filter(|(k, _)| k == "Authorization").collect();
        assert_eq!(auth_headers.len(), 1);
        assert_eq!(auth_headers[0].1, "Bearer tok");
    }

    #[test]
    fn empty_method_defaults_to_get() {
        let operation = op("/ping", "", vec![]);
        let ctx = BuildContext::default();
        let request = RestRequestBuilder.build(&ctx, &operation, &ParamValues::new()).unwrap();
        assert_eq!(request.method, "GET");
    }
}
