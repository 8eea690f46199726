use std::collections::{HashMap, HashSet};

use aperture_core::{DataType, Operation, OperationMeta, Parameter};
use aperture_error::ApertureError;
use aperture_graphql::IntrospectionDocument;
use serde_json::Value;

use crate::defaults::{effective_value, ParamValues};
use crate::{apply_auth, BuildContext, HttpRequest, RequestBuilder, DEFAULT_BUILDER_USER_AGENT};

/// Builds GraphQL requests from `OperationMeta::GraphQl` operations.
///
/// Always issues a `POST` with a JSON body of `{query, variables?,
/// operationName?}` (§4.6). The selection set is schema-derived when a
/// schema is attached via [`Self::with_schema`] — scalar/enum fields listed
/// directly, object fields recursively expanded up to
/// `ctx.graphql_max_depth` — and collapses to `{ __typename }` otherwise.
/// [`Self::with_selection_set`] overrides both with caller-supplied text.
#[derive(Debug, Default, Clone)]
pub struct GraphQlRequestBuilder {
    /// Pre-rendered selection set body (without braces), taking precedence
    /// over schema-derived expansion when set.
    selection_set: Option<String>,
    /// The `__schema` object from an introspection response, used to expand
    /// the selection set field-by-field when no override is set.
    schema: Option<Value>,
}

impl GraphQlRequestBuilder {
    /// Overrides schema-derived expansion with caller-supplied field text.
    pub fn with_selection_set(selection_set: impl Into<String>) -> Self {
        GraphQlRequestBuilder {
            selection_set: Some(selection_set.into()),
            schema: None,
        }
    }

    /// Attaches an introspection schema so every emitted query's selection
    /// set is derived from it rather than collapsing to `{ __typename }`.
    pub fn with_schema(schema: IntrospectionDocument) -> Self {
        GraphQlRequestBuilder {
            selection_set: None,
            schema: Some(schema.schema),
        }
    }

    fn graphql_type_name(param: &Parameter) -> String {
        if !param.constraints.enum_values.is_empty() {
            let base = format!("{}Enum", capitalize(&param.name));
            return if param.required { format!("{base}!") } else { base };
        }

        let base = match param.data_type {
            DataType::String => param
                .constraints
                .format
                .as_deref()
                .filter(|f| *f == "id")
                .map(|_| "ID".to_string())
                .unwrap_or_else(|| "String".to_string()),
            DataType::Integer => "Int".to_string(),
            DataType::Number => "Float".to_string(),
            DataType::Boolean => "Boolean".to_string(),
            DataType::Array => {
                let inner = param
                    .items
                    .as_deref()
                    .map(Self::graphql_type_name)
                    .unwrap_or_else(|| "String".to_string());
                return format!("[{inner}]{}", if param.required { "!" } else { "" });
            }
            // No scalar list in §4.6 covers object/file params; `JSONObject`
            // is the literal the spec names for object-typed arguments, and
            // `Upload` is the de facto convention for file arguments (the
            // multipart GraphQL upload spec's `Upload` scalar).
            DataType::Object => "JSONObject".to_string(),
            DataType::File => "Upload".to_string(),
        };
        if param.required {
            format!("{base}!")
        } else {
            base
        }
    }

    fn root_operation_type(operation: &Operation) -> &'static str {
        match &operation.meta {
            OperationMeta::GraphQl { operation_type } if operation_type == "mutation" => "mutation",
            OperationMeta::GraphQl { operation_type } if operation_type == "subscription" => "subscription",
            _ => "query",
        }
    }

    fn selection_set(&self, ctx: &BuildContext, operation: &Operation) -> String {
        if let Some(text) = &self.selection_set {
            return text.clone();
        }
        let Some(schema) = &self.schema else {
            return "__typename".to_string();
        };
        let Some(type_name) = operation.return_type.as_deref().map(root_type_name) else {
            return "__typename".to_string();
        };
        let types = type_map(schema);
        let mut visited = HashSet::new();
        selection_set_for_type(&types, type_name, 0, ctx.graphql_max_depth, &mut visited)
    }

    fn render_query(&self, ctx: &BuildContext, operation: &Operation) -> String {
        let root = Self::root_operation_type(operation);
        let field = &operation.display_name;
        let op_name = sanitize_operation_name(field);

        let var_decls: Vec<String> = operation
            .parameters
            .iter()
            .map(|p| format!("${}: {}", p.name, Self::graphql_type_name(p)))
            .collect();
        let field_args: Vec<String> = operation
            .parameters
            .iter()
            .map(|p| format!("{}: ${}", p.name, p.name))
            .collect();

        let selection = self.selection_set(ctx, operation);

        let var_clause = if var_decls.is_empty() {
            String::new()
        } else {
            format!("({})", var_decls.join(", "))
        };
        let arg_clause = if field_args.is_empty() {
            String::new()
        } else {
            format!("({})", field_args.join(", "))
        };

        format!("{root} {op_name}{var_clause} {{ {field}{arg_clause} {{ {selection} }} }}")
    }

    /// Builds one `HttpRequest` whose body is a GraphQL batch payload — a
    /// JSON array of `{query, variables?, operationName?}` objects, one per
    /// `(operation, values)` pair (§4.6 "batch... request helpers emit
    /// well-formed GraphQL batch payloads").
    pub fn build_batch(
        &self,
        ctx: &BuildContext,
        operations: &[(&Operation, &ParamValues)],
    ) -> Result<HttpRequest, ApertureError> {
        let mut batch = Vec::with_capacity(operations.len());
        for (operation, values) in operations {
            let mut variables = serde_json::Map::new();
            for param in &operation.parameters {
                if let Some(v) = effective_value(param, values) {
                    variables.insert(param.name.clone(), v);
                }
            }
            let query = self.render_query(ctx, operation);
            let operation_name = sanitize_operation_name(&operation.display_name);

            let mut entry = serde_json::Map::new();
            entry.insert("query".to_string(), Value::String(query));
            if !variables.is_empty() {
                entry.insert("variables".to_string(), Value::Object(variables));
            }
            entry.insert("operationName".to_string(), Value::String(operation_name));
            batch.push(Value::Object(entry));
        }

        let body = serde_json::to_vec(&Value::Array(batch))
            .map_err(|e| ApertureError::new(aperture_error::ErrorCode::Internal, e.to_string()))?;

        let mut request = HttpRequest {
            url: operations.first().map(|(op, _)| op.base_url.clone()).unwrap_or_default(),
            method: "POST".to_string(),
            headers: ctx.caller_headers.clone(),
            body: Some(body),
            graphql_query: None,
            graphql_operation_name: None,
            graphql_variables_json: None,
        };

        if !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent")) {
            request.set_header("User-Agent", DEFAULT_BUILDER_USER_AGENT);
        }
        request.set_header("Content-Type", "application/json");
        request.set_header("Accept", "application/json");

        apply_auth(&mut request, &ctx.auth.0);
        Ok(request)
    }
}

fn capitalize(name: &str) -> String {
    let mut out = name.to_string();
    if let Some(first) = out.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    out
}

/// Strips `!`/`[`/`]` wrapper characters from a rendered type-name string
/// (e.g. `"[Pet]!"`) down to the innermost named type (`"Pet"`).
fn root_type_name(return_type: &str) -> &str {
    return_type.trim_matches(|c| c == '!' || c == '[' || c == ']')
}

fn type_map(schema: &Value) -> HashMap<&str, &Value> {
    let mut map = HashMap::new();
    if let Some(types) = schema.get("types").and_then(Value::as_array) {
        for ty in types {
            if let Some(name) = ty.get("name").and_then(Value::as_str) {
                map.insert(name, ty);
            }
        }
    }
    map
}

/// Unwraps `NON_NULL`/`LIST` wrappers down to the innermost named type.
fn named_type_of(type_ref: &Value) -> Option<String> {
    match type_ref.get("kind").and_then(Value::as_str) {
        Some("NON_NULL") | Some("LIST") => type_ref.get("ofType").and_then(named_type_of),
        _ => type_ref.get("name").and_then(Value::as_str).map(str::to_string),
    }
}

/// Schema-derived selection-set text for `type_name`: scalar/enum fields are
/// listed directly, object/interface/union fields are recursively expanded
/// up to `max_depth`, and a type already on `visited` (cycle) or past
/// `max_depth` truncates to `__typename`, matching the visited-set pattern
/// `aperture-graphql`/`aperture-openapi`'s lowering stages use for schema
/// recursion.
fn selection_set_for_type(
    types: &HashMap<&str, &Value>,
    type_name: &str,
    depth: usize,
    max_depth: usize,
    visited: &mut HashSet<String>,
) -> String {
    if depth >= max_depth || visited.contains(type_name) {
        return "__typename".to_string();
    }
    let Some(ty) = types.get(type_name) else {
        return "__typename".to_string();
    };
    let Some(fields) = ty.get("fields").and_then(Value::as_array) else {
        return "__typename".to_string();
    };

    visited.insert(type_name.to_string());
    let mut parts = Vec::new();
    for field in fields {
        let Some(field_name) = field.get("name").and_then(Value::as_str) else {
            continue;
        };
        let field_named_type = field.get("type").and_then(named_type_of);
        let field_kind = field_named_type
            .as_deref()
            .and_then(|n| types.get(n))
            .and_then(|t| t.get("kind"))
            .and_then(Value::as_str)
            .unwrap_or("SCALAR");

        if matches!(field_kind, "OBJECT" | "INTERFACE" | "UNION") {
            let nested = field_named_type
                .as_deref()
                .map(|n| selection_set_for_type(types, n, depth + 1, max_depth, visited))
                .unwrap_or_else(|| "__typename".to_string());
            parts.push(format!("{field_name} {{ {nested} }}"));
        } else {
            parts.push(field_name.to_string());
        }
    }
    visited.remove(type_name);

    if parts.is_empty() {
        "__typename".to_string()
    } else {
        parts.join(" ")
    }
}

fn sanitize_operation_name(field: &str) -> String {
    let mut out: String = field
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        out.insert(0, '_');
    }
    out
}

impl RequestBuilder for GraphQlRequestBuilder {
    fn build(
        &self,
        ctx: &BuildContext,
        operation: &Operation,
        values: &ParamValues,
    ) -> Result<HttpRequest, ApertureError> {
        let mut variables = serde_json::Map::new();
        for param in &operation.parameters {
            if let Some(v) = effective_value(param, values) {
                variables.insert(param.name.clone(), v);
            }
        }

        let query = self.render_query(ctx, operation);
        let operation_name = sanitize_operation_name(&operation.display_name);

        let mut payload = serde_json::Map::new();
        payload.insert("query".to_string(), Value::String(query.clone()));
        if !variables.is_empty() {
            payload.insert("variables".to_string(), Value::Object(variables.clone()));
        }
        payload.insert("operationName".to_string(), Value::String(operation_name.clone()));

        let body = serde_json::to_vec(&Value::Object(payload))
            .map_err(|e| ApertureError::new(aperture_error::ErrorCode::Internal, e.to_string()))?;

        let mut request = HttpRequest {
            url: operation.base_url.clone(),
            method: "POST".to_string(),
            headers: ctx.caller_headers.clone(),
            body: Some(body),
            graphql_query: Some(query),
            graphql_operation_name: Some(operation_name),
            graphql_variables_json: if variables.is_empty() {
                None
            } else {
                Some(Value::Object(variables).to_string())
            },
        };

        if !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("user-agent")) {
            request.set_header("User-Agent", DEFAULT_BUILDER_USER_AGENT);
        }
        request.set_header("Content-Type", "application/json");
        request.set_header("Accept", "application/json");

        apply_auth(&mut request, &ctx.auth.0);
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aperture_core::{ApiKind, ParameterLocation};

    fn op(display_name: &str, operation_type: &str, parameters: Vec<Parameter>) -> Operation {
        Operation {
            definition_id: None,
            api_kind: ApiKind::GraphQl,
            display_name: display_name.into(),
            method: "POST".into(),
            url_path: None,
            base_url: "https://api.example.test/graphql".into(),
            operation_id: format!("graphql-{display_name}"),
            summary: None,
            description: None,
            deprecated: false,
            tags: vec![],
            parameters,
            security: vec![],
            request_content_types: vec![],
            response_content_types: vec![],
            return_type: None,
            meta: OperationMeta::GraphQl {
                operation_type: operation_type.into(),
            },
        }
    }

    fn arg(name: &str, required: bool, data_type: DataType) -> Parameter {
        Parameter {
            name: name.into(),
            location: ParameterLocation::Argument,
            required,
            data_type,
            ..Default::default()
        }
    }

    #[test]
    fn query_operation_renders_query_keyword() {
        let operation = op("pet", "query", vec![arg("id", true, DataType::Integer)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("id".into(), serde_json::json!(7));
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &values).unwrap();
        assert_eq!(request.method, "POST");
        let query = request.graphql_query.unwrap();
        assert!(query.starts_with("query "));
        assert!(query.contains("$id: Int!"));
        assert!(query.contains("pet(id: $id)"));
    }

    #[test]
    fn mutation_operation_renders_mutation_keyword() {
        let operation = op("createPet", "mutation", vec![arg("name", true, DataType::String)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("name".into(), serde_json::json!("Rex"));
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &values).unwrap();
        assert!(request.graphql_query.unwrap().starts_with("mutation "));
    }

    #[test]
    fn variables_json_reflects_resolved_values() {
        let operation = op("pet", "query", vec![arg("id", true, DataType::Integer)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("id".into(), serde_json::json!(42));
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &values).unwrap();
        assert_eq!(request.graphql_variables_json.unwrap(), r#"{"id":42}"#);
    }

    #[test]
    fn no_arguments_omits_variables_clause() {
        let operation = op("ping", "query", vec![]);
        let ctx = BuildContext::default();
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &ParamValues::new()).unwrap();
        let query = request.graphql_query.unwrap();
        assert!(!query.contains('('));
    }

    #[test]
    fn object_param_renders_literal_json_object_type() {
        let operation = op("createUser", "mutation", vec![arg("input", true, DataType::Object)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("input".into(), serde_json::json!({}));
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &values).unwrap();
        let query = request.graphql_query.unwrap();
        assert!(query.contains("$input: JSONObject!"));
    }

    #[test]
    fn file_param_renders_upload_type() {
        let operation = op("uploadAvatar", "mutation", vec![arg("file", true, DataType::File)]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("file".into(), serde_json::json!(null));
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &values).unwrap();
        assert!(request.graphql_query.unwrap().contains("$file: Upload!"));
    }

    #[test]
    fn enum_constrained_param_renders_param_name_enum_type() {
        let mut status_arg = arg("status", true, DataType::String);
        status_arg.constraints = aperture_core::Constraints {
            enum_values: vec![serde_json::json!("ACTIVE"), serde_json::json!("INACTIVE")],
            ..Default::default()
        };
        let operation = op("setStatus", "mutation", vec![status_arg]);
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("status".into(), serde_json::json!("ACTIVE"));
        let request = GraphQlRequestBuilder::default().build(&ctx, &operation, &values).unwrap();
        assert!(request.graphql_query.unwrap().contains("$status: StatusEnum!"));
    }

    const PET_SCHEMA: &str = r#"{
        "types": [
            {
                "kind": "OBJECT",
                "name": "Pet",
                "fields": [
                    {"name": "id", "type": {"kind": "SCALAR", "name": "ID"}},
                    {"name": "name", "type": {"kind": "SCALAR", "name": "String"}},
                    {"name": "owner", "type": {"kind": "OBJECT", "name": "Owner"}}
                ]
            },
            {
                "kind": "OBJECT",
                "name": "Owner",
                "fields": [
                    {"name": "id", "type": {"kind": "SCALAR", "name": "ID"}},
                    {"name": "pet", "type": {"kind": "OBJECT", "name": "Pet"}}
                ]
            }
        ]
    }"#;

    fn pet_query() -> Operation {
        let mut operation = op("pet", "query", vec![arg("id", true, DataType::Integer)]);
        operation.return_type = Some("Pet".to_string());
        operation
    }

    #[test]
    fn schema_derived_selection_set_expands_object_fields() {
        let schema: Value = serde_json::from_str(PET_SCHEMA).unwrap();
        let builder = GraphQlRequestBuilder::with_schema(IntrospectionDocument { schema });
        let ctx = BuildContext::default();
        let mut values = ParamValues::new();
        values.insert("id".into(), serde_json::json!(7));
        let request = builder.build(&ctx, &pet_query(), &values).unwrap();
        let query = request.graphql_query.unwrap();
        assert!(query.contains("id name owner { "));
    }

    #[test]
    fn schema_derived_selection_set_truncates_cycles_at_max_depth() {
        let schema: Value = serde_json::from_str(PET_SCHEMA).unwrap();
        let builder = GraphQlRequestBuilder::with_schema(IntrospectionDocument { schema });
        let ctx = BuildContext {
            graphql_max_depth: 2,
            ..Default::default()
        };
        let mut values = ParamValues::new();
        values.insert("id".into(), serde_json::json!(7));
        let request = builder.build(&ctx, &pet_query(), &values).unwrap();
        let query = request.graphql_query.unwrap();
        // Pet -> Owner at depth 1, Owner.pet would recurse back into Pet at
        // depth 2 which hits max_depth and truncates to `__typename`.
        assert!(query.contains("__typename"));
    }

    #[test]
    fn no_schema_or_override_collapses_to_typename() {
        let builder = GraphQlRequestBuilder::default();
        let ctx = BuildContext::default();
        let request = builder.build(&ctx, &pet_query(), &ParamValues::new()).unwrap();
        assert!(request.graphql_query.unwrap().contains("{ __typename }"));
    }

    #[test]
    fn build_batch_emits_array_of_operation_payloads() {
        let pet = pet_query();
        let mut pet_values = ParamValues::new();
        pet_values.insert("id".into(), serde_json::json!(7));

        let create_pet = op("createPet", "mutation", vec![arg("name", true, DataType::String)]);
        let mut create_values = ParamValues::new();
        create_values.insert("name".into(), serde_json::json!("Rex"));

        let ctx = BuildContext::default();
        let builder = GraphQlRequestBuilder::default();
        let request = builder
            .build_batch(&ctx, &[(&pet, &pet_values), (&create_pet, &create_values)])
            .unwrap();

        let body: Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        let batch = body.as_array().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(batch[0].get("query").unwrap().as_str().unwrap().starts_with("query "));
        assert!(batch[1].get("query").unwrap().as_str().unwrap().starts_with("mutation "));
        assert_eq!(batch[1]["variables"]["name"], "Rex");
    }
}
