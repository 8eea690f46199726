use std::collections::{HashMap, HashSet};

use aperture_core::{
    ApiKind, Constraints, DataType, OpenApiMeta, Operation, OperationMeta, Parameter,
    ParameterLocation, SecurityRequirement, SecurityScheme, SecuritySchemeKind,
};
use serde_json::Value;

use crate::dialect::{OpenApiDialect, OpenApiDocument};

/// Default bound on schema recursion depth (§4.4: "bounded-depth, default
/// limit = 10").
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Parsed documents a `$ref` may point into besides the document being
/// lowered, keyed by the URI that appears before the `#` in the reference
/// (e.g. `"common.json"` for `"common.json#/components/schemas/Widget"`).
///
/// §6 requires "external `$ref` resolution enabled"; since this crate only
/// ever sees bytes its caller already fetched, resolution here is pointer
/// walking against documents the caller supplies, not fetching itself —
/// fetching the referenced files is the orchestrator's concern, the same
/// split already drawn between `aperture-collab`'s transport and this
/// crate's pure parsing.
pub type ExternalDocs = HashMap<String, Value>;

fn pointer_path(fragment: &str) -> Option<&str> {
    fragment.strip_prefix("#/").or(if fragment == "#" { Some("") } else { None })
}

fn walk_pointer<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut node = root;
    for segment in path.split('/') {
        node = node.get(segment)?;
    }
    Some(node)
}

/// Resolves a `$ref` against either the local document or, when the
/// reference carries a URI before its `#` fragment, an entry in
/// `external_docs`. Returns `None` for a URI resolution can't find rather
/// than erroring, matching the existing "missing ref ⇒ empty object" degrade
/// already used throughout this module.
fn resolve_ref<'a>(root: &'a Value, external_docs: &'a ExternalDocs, reference: &str) -> Option<&'a Value> {
    match reference.split_once('#') {
        Some(("", fragment)) => walk_pointer(root, pointer_path(&format!("#{fragment}"))?),
        Some((uri, fragment)) => {
            let doc = external_docs.get(uri)?;
            walk_pointer(doc, pointer_path(&format!("#{fragment}"))?)
        }
        None if reference.starts_with('#') => walk_pointer(root, pointer_path(reference)?),
        None => {
            // A bare document URI with no fragment refers to the whole document.
            external_docs.get(reference)
        }
    }
}

/// Qualifies a `$ref` with the document it resolves against, so the same
/// pointer string in two different external documents (or the root document
/// vs. an external one) is not mistaken for a repeat visit by the
/// cycle-detection `visited` set.
fn visited_key(reference: &str) -> String {
    if reference.starts_with('#') {
        format!("local|{reference}")
    } else {
        format!("external|{reference}")
    }
}

fn data_type_from_schema_type(ty: &str) -> DataType {
    match ty {
        "integer" => DataType::Integer,
        "number" => DataType::Number,
        "boolean" => DataType::Boolean,
        "array" => DataType::Array,
        "object" => DataType::Object,
        _ => DataType::String,
    }
}

fn constraints_from_schema(schema: &Value) -> Constraints {
    Constraints {
        format: schema.get("format").and_then(Value::as_str).map(str::to_string),
        minimum: schema.get("minimum").and_then(Value::as_f64),
        maximum: schema.get("maximum").and_then(Value::as_f64),
        exclusive_minimum: schema.get("exclusiveMinimum").and_then(Value::as_bool).unwrap_or(false),
        exclusive_maximum: schema.get("exclusiveMaximum").and_then(Value::as_bool).unwrap_or(false),
        min_length: schema.get("minLength").and_then(Value::as_u64),
        max_length: schema.get("maxLength").and_then(Value::as_u64),
        pattern: schema.get("pattern").and_then(Value::as_str).map(str::to_string),
        enum_values: schema
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        min_items: schema.get("minItems").and_then(Value::as_u64),
        max_items: schema.get("maxItems").and_then(Value::as_u64),
    }
}

/// Extracts a [`Parameter`] tree from a JSON-Schema fragment, honoring the
/// `$ref`-cycle-safe bounded-depth rule (§4.4).
fn parameter_from_schema(
    root: &Value,
    external_docs: &ExternalDocs,
    name: &str,
    schema: &Value,
    location: ParameterLocation,
    required: bool,
    visited: &mut HashSet<String>,
    depth: usize,
    max_depth: usize,
) -> Parameter {
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        let key = visited_key(reference);
        if visited.contains(&key) || depth >= max_depth {
            return Parameter {
                name: name.to_string(),
                location,
                required,
                data_type: DataType::Object,
                ..Default::default()
            };
        }
        visited.insert(key.clone());
        let resolved = resolve_ref(root, external_docs, reference).cloned().unwrap_or(Value::Null);
        let param = parameter_from_schema(
            root,
            external_docs,
            name,
            &resolved,
            location,
            required,
            visited,
            depth,
            max_depth,
        );
        visited.remove(&key);
        return param;
    }

    let ty = schema.get("type").and_then(Value::as_str).unwrap_or("string");
    let data_type = data_type_from_schema_type(ty);
    let nullable = schema.get("nullable").and_then(Value::as_bool).unwrap_or(false);
    let default_value = schema.get("default").cloned();
    let example_value = schema.get("example").cloned();
    let constraints = constraints_from_schema(schema);

    let mut param = Parameter {
        name: name.to_string(),
        location,
        required,
        data_type,
        constraints,
        default_value,
        example_value,
        nullable,
        content_type: None,
        children: Vec::new(),
        items: None,
    };

    if depth + 1 >= max_depth {
        return param;
    }

    match data_type {
        DataType::Object => {
            let required_fields: HashSet<&str> = schema
                .get("required")
                .and_then(Value::as_array)
                .map(|v| v.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if let Some(props) = schema.get("properties").and_then(Value::as_object) {
                for (field_name, field_schema) in props {
                    param.children.push(parameter_from_schema(
                        root,
                        external_docs,
                        field_name,
                        field_schema,
                        ParameterLocation::Body,
                        required_fields.contains(field_name.as_str()),
                        visited,
                        depth + 1,
                        max_depth,
                    ));
                }
            }
        }
        DataType::Array => {
            if let Some(items_schema) = schema.get("items") {
                param.items = Some(Box::new(parameter_from_schema(
                    root,
                    external_docs,
                    name,
                    items_schema,
                    ParameterLocation::Body,
                    false,
                    visited,
                    depth + 1,
                    max_depth,
                )));
            }
        }
        _ => {}
    }

    param
}

fn parameter_location(raw: &str) -> ParameterLocation {
    match raw {
        "path" => ParameterLocation::Path,
        "header" => ParameterLocation::Header,
        "cookie" => ParameterLocation::Cookie,
        "query" => ParameterLocation::Query,
        _ => ParameterLocation::Query,
    }
}

fn schema_node_for_op_param<'a>(dialect: OpenApiDialect, op_param: &'a Value) -> &'a Value {
    match dialect {
        OpenApiDialect::OpenApi3 => op_param.get("schema").unwrap_or(op_param),
        OpenApiDialect::Swagger2 => op_param,
    }
}

fn parameters_from_operation(
    root: &Value,
    external_docs: &ExternalDocs,
    dialect: OpenApiDialect,
    op: &Value,
    max_depth: usize,
) -> Vec<Parameter> {
    let mut out = Vec::new();
    let Some(params) = op.get("parameters").and_then(Value::as_array) else {
        return out;
    };
    for raw in params {
        let resolved;
        let raw = if let Some(reference) = raw.get("$ref").and_then(Value::as_str) {
            resolved = resolve_ref(root, external_docs, reference).cloned().unwrap_or(Value::Null);
            &resolved
        } else {
            raw
        };
        let Some(name) = raw.get("name").and_then(Value::as_str) else {
            continue;
        };
        let location = parameter_location(raw.get("in").and_then(Value::as_str).unwrap_or("query"));
        let required = raw.get("required").and_then(Value::as_bool).unwrap_or(false);
        let schema = schema_node_for_op_param(dialect, raw);
        let mut visited = HashSet::new();
        out.push(parameter_from_schema(
            root, external_docs, name, schema, location, required, &mut visited, 0, max_depth,
        ));
    }
    out
}

/// Maps an OpenAPI 3 `requestBody`/Swagger 2 `body`/`formData` parameter
/// block to body [`Parameter`]s, per §4.4's request-body mapping rule.
fn body_parameters(
    root: &Value,
    external_docs: &ExternalDocs,
    dialect: OpenApiDialect,
    op: &Value,
    max_depth: usize,
) -> (Vec<Parameter>, Vec<String>) {
    match dialect {
        OpenApiDialect::OpenApi3 => {
            let Some(request_body) = op.get("requestBody") else {
                return (Vec::new(), Vec::new());
            };
            let Some(content) = request_body.get("content").and_then(Value::as_object) else {
                return (Vec::new(), Vec::new());
            };
            let content_types: Vec<String> = content.keys().cloned().collect();
            let Some((_, media)) = content.iter().next() else {
                return (Vec::new(), content_types);
            };
            let Some(schema) = media.get("schema") else {
                return (Vec::new(), content_types);
            };
            (
                body_parameters_from_schema(root, external_docs, schema, max_depth),
                content_types,
            )
        }
        OpenApiDialect::Swagger2 => {
            let Some(params) = op.get("parameters").and_then(Value::as_array) else {
                return (Vec::new(), Vec::new());
            };
            let body_param = params.iter().find(|p| p.get("in").and_then(Value::as_str) == Some("body"));
            let Some(body_param) = body_param else {
                return (Vec::new(), Vec::new());
            };
            let schema = body_param.get("schema").unwrap_or(&Value::Null);
            let consumes = op
                .get("consumes")
                .and_then(Value::as_array)
                .map(|v| v.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            (
                body_parameters_from_schema(root, external_docs, schema, max_depth),
                consumes,
            )
        }
    }
}

fn body_parameters_from_schema(
    root: &Value,
    external_docs: &ExternalDocs,
    schema: &Value,
    max_depth: usize,
) -> Vec<Parameter> {
    let resolved;
    let schema = if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        resolved = resolve_ref(root, external_docs, reference).cloned().unwrap_or(Value::Null);
        &resolved
    } else {
        schema
    };

    let is_object = schema.get("type").and_then(Value::as_str) == Some("object")
        || schema.get("properties").is_some();

    if is_object {
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|v| v.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let mut out = Vec::new();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop_schema) in props {
                let mut visited = HashSet::new();
                out.push(parameter_from_schema(
                    root,
                    external_docs,
                    name,
                    prop_schema,
                    ParameterLocation::Body,
                    required.contains(name.as_str()),
                    &mut visited,
                    0,
                    max_depth,
                ));
            }
        }
        out
    } else {
        let mut visited = HashSet::new();
        vec![parameter_from_schema(
            root,
            external_docs,
            "body",
            schema,
            ParameterLocation::Body,
            true,
            &mut visited,
            0,
            max_depth,
        )]
    }
}

fn security_scheme_kind(scheme_def: &Value) -> SecuritySchemeKind {
    match scheme_def.get("type").and_then(Value::as_str) {
        Some("apiKey") => SecuritySchemeKind::ApiKey,
        Some("oauth2") => SecuritySchemeKind::OAuth2,
        Some("openIdConnect") => SecuritySchemeKind::OpenIdConnect,
        // Swagger 2 `basic` auth and OpenAPI 3 `http` both land here.
        _ => SecuritySchemeKind::Http,
    }
}

fn security_schemes_node(root: &Value, dialect: OpenApiDialect) -> Option<&Value> {
    match dialect {
        OpenApiDialect::OpenApi3 => root.pointer("/components/securitySchemes"),
        OpenApiDialect::Swagger2 => root.get("securityDefinitions"),
    }
}

/// Extracts the full `securitySchemes`/`securityDefinitions` table.
pub fn security_schemes(root: &Value, dialect: OpenApiDialect) -> Vec<SecurityScheme> {
    let Some(schemes) = security_schemes_node(root, dialect).and_then(Value::as_object) else {
        return Vec::new();
    };
    schemes
        .iter()
        .map(|(name, def)| SecurityScheme {
            name: name.clone(),
            kind: security_scheme_kind(def),
            scheme: def.get("scheme").and_then(Value::as_str).map(str::to_string),
            location: def
                .get("in")
                .and_then(Value::as_str)
                .map(parameter_location),
            parameter_name: def.get("name").and_then(Value::as_str).map(str::to_string),
            bearer_format: def.get("bearerFormat").and_then(Value::as_str).map(str::to_string),
            open_id_connect_url: def
                .get("openIdConnectUrl")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
        .collect()
}

fn security_requirements_from_node(node: &Value, schemes: &[SecurityScheme]) -> Vec<SecurityRequirement> {
    let Some(entries) = node.as_array() else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for entry in entries {
        let Some(obj) = entry.as_object() else { continue };
        for (scheme_name, scopes) in obj {
            let Some(scheme) = schemes.iter().find(|s| &s.name == scheme_name) else {
                continue;
            };
            out.push(SecurityRequirement {
                scheme_name: scheme_name.clone(),
                scheme_kind: scheme.kind,
                scopes: scopes
                    .as_array()
                    .map(|v| v.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default(),
            });
        }
    }
    out
}

/// Merges per-operation security requirements over the document's global
/// ones: an operation-level `security` array, even empty, fully overrides
/// the global one (§4.4: "per-operation requirements override global").
fn resolve_security(root: &Value, op: &Value, schemes: &[SecurityScheme]) -> Vec<SecurityRequirement> {
    if let Some(op_security) = op.get("security") {
        return security_requirements_from_node(op_security, schemes);
    }
    match root.get("security") {
        Some(global) => security_requirements_from_node(global, schemes),
        None => Vec::new(),
    }
}

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Walks `paths × methods`, lowering every operation into a uniform
/// [`Operation`] (§4.4 "OpenAPI parser").
pub fn lower(doc: &OpenApiDocument, base_url: &str, max_depth: usize) -> Vec<Operation> {
    lower_with_external_docs(doc, base_url, max_depth, &ExternalDocs::new())
}

/// As [`lower`], resolving external `$ref`s against `external_docs` (§6:
/// "external `$ref` resolution enabled").
pub fn lower_with_external_docs(
    doc: &OpenApiDocument,
    base_url: &str,
    max_depth: usize,
    external_docs: &ExternalDocs,
) -> Vec<Operation> {
    let schemes = security_schemes(&doc.root, doc.dialect);
    let Some(paths) = doc.root.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut operations = Vec::new();
    for (path, path_item) in paths {
        let Some(path_item_obj) = path_item.as_object() else { continue };
        for method in HTTP_METHODS {
            let Some(op) = path_item_obj.get(*method) else { continue };
            let parameters = parameters_from_operation(&doc.root, external_docs, doc.dialect, op, max_depth);
            let (mut body_params, request_content_types) =
                body_parameters(&doc.root, external_docs, doc.dialect, op, max_depth);
            let mut parameters = parameters;
            parameters.append(&mut body_params);

            let response_content_types = op
                .get("responses")
                .and_then(Value::as_object)
                .and_then(|responses| responses.values().next())
                .and_then(|resp| resp.get("content"))
                .and_then(Value::as_object)
                .map(|c| c.keys().cloned().collect())
                .unwrap_or_default();

            let operation_id = op
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}:{method}:{path}", doc.version));

            operations.push(Operation {
                definition_id: None,
                api_kind: ApiKind::OpenApi,
                display_name: op
                    .get("summary")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| operation_id.clone()),
                method: method.to_uppercase(),
                url_path: Some(path.clone()),
                base_url: base_url.to_string(),
                operation_id,
                summary: op.get("summary").and_then(Value::as_str).map(str::to_string),
                description: op.get("description").and_then(Value::as_str).map(str::to_string),
                deprecated: op.get("deprecated").and_then(Value::as_bool).unwrap_or(false),
                tags: op
                    .get("tags")
                    .and_then(Value::as_array)
                    .map(|v| v.iter().filter_map(Value::as_str).map(str::to_string).collect())
                    .unwrap_or_default(),
                parameters,
                security: resolve_security(&doc.root, op, &schemes),
                request_content_types,
                response_content_types,
                return_type: None,
                meta: OperationMeta::OpenApi,
            });
        }
    }
    operations
}

/// Builds the summary [`OpenApiMeta`] attached to the owning `ApiDefinition`.
pub fn summarize(doc: &OpenApiDocument) -> OpenApiMeta {
    let title = doc
        .root
        .pointer("/info/title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let server_count = match doc.dialect {
        OpenApiDialect::OpenApi3 => doc
            .root
            .get("servers")
            .and_then(Value::as_array)
            .map(|v| v.len() as u32)
            .unwrap_or(0),
        OpenApiDialect::Swagger2 => 1,
    };
    OpenApiMeta {
        version: doc.version.clone(),
        title,
        server_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::parse_document;

    const PETSTORE: &str = r#"{
        "openapi": "3.0.3",
        "info": {"title": "Petstore", "version": "1.0"},
        "servers": [{"url": "https://api.example.test"}],
        "components": {
            "securitySchemes": {
                "ApiKeyAuth": {"type": "apiKey", "in": "header", "name": "X-API-Key"}
            }
        },
        "security": [{"ApiKeyAuth": []}],
        "paths": {
            "/pets/{petId}": {
                "get": {
                    "operationId": "getPetById",
                    "summary": "Get a pet",
                    "parameters": [
                        {"name": "petId", "in": "path", "required": true, "schema": {"type": "integer"}}
                    ],
                    "responses": {"200": {"description": "ok"}}
                }
            },
            "/pets": {
                "post": {
                    "operationId": "createPet",
                    "requestBody": {
                        "content": {
                            "application/json": {
                                "schema": {
                                    "type": "object",
                                    "required": ["name"],
                                    "properties": {
                                        "name": {"type": "string"},
                                        "tag": {"type": "string"}
                                    }
                                }
                            }
                        }
                    },
                    "responses": {"201": {"description": "created"}}
                }
            }
        }
    }"#;

    #[test]
    fn lowers_path_parameter_and_operation_id() {
        let doc = parse_document(PETSTORE.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test", DEFAULT_MAX_DEPTH);
        let get_pet = ops.iter().find(|op| op.operation_id == "getPetById").unwrap();
        assert_eq!(get_pet.method, "GET");
        assert_eq!(get_pet.url_path.as_deref(), Some("/pets/{petId}"));
        assert_eq!(get_pet.parameters.len(), 1);
        assert_eq!(get_pet.parameters[0].location, ParameterLocation::Path);
        assert!(get_pet.parameters[0].required);
    }

    #[test]
    fn lowers_object_request_body_into_per_property_parameters() {
        let doc = parse_document(PETSTORE.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test", DEFAULT_MAX_DEPTH);
        let create_pet = ops.iter().find(|op| op.operation_id == "createPet").unwrap();
        let names: Vec<_> = create_pet.parameters.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"name"));
        assert!(names.contains(&"tag"));
        let name_param = create_pet.parameters.iter().find(|p| p.name == "name").unwrap();
        assert!(name_param.required);
        let tag_param = create_pet.parameters.iter().find(|p| p.name == "tag").unwrap();
        assert!(!tag_param.required);
    }

    #[test]
    fn global_security_applies_when_operation_silent() {
        let doc = parse_document(PETSTORE.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test", DEFAULT_MAX_DEPTH);
        let get_pet = ops.iter().find(|op| op.operation_id == "getPetById").unwrap();
        assert_eq!(get_pet.security.len(), 1);
        assert_eq!(get_pet.security[0].scheme_name, "ApiKeyAuth");
    }

    #[test]
    fn cyclic_ref_schema_does_not_overflow_stack() {
        let cyclic = r#"{
            "openapi": "3.0.3",
            "info": {"title": "Cyclic", "version": "1.0"},
            "components": {
                "schemas": {
                    "Node": {
                        "type": "object",
                        "properties": {"child": {"$ref": "#/components/schemas/Node"}}
                    }
                }
            },
            "paths": {
                "/nodes": {
                    "post": {
                        "operationId": "createNode",
                        "requestBody": {
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Node"}}}
                        },
                        "responses": {"200": {"description": "ok"}}
                    }
                }
            }
        }"#;
        let doc = parse_document(cyclic.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test", DEFAULT_MAX_DEPTH);
        assert_eq!(ops.len(), 1);
    }

    #[test]
    fn external_ref_resolves_against_supplied_document() {
        let main = r#"{
            "openapi": "3.0.3",
            "info": {"title": "Main", "version": "1.0"},
            "paths": {
                "/widgets": {
                    "post": {
                        "operationId": "createWidget",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "common.json#/Widget"}
                                }
                            }
                        },
                        "responses": {"201": {"description": "created"}}
                    }
                }
            }
        }"#;
        let common: Value = serde_json::from_str(
            r#"{
                "Widget": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": {"type": "string"},
                        "weight": {"type": "number"}
                    }
                }
            }"#,
        )
        .unwrap();
        let mut external_docs = ExternalDocs::new();
        external_docs.insert("common.json".to_string(), common);

        let doc = parse_document(main.as_bytes()).unwrap();
        let ops = lower_with_external_docs(&doc, "https://api.example.test", DEFAULT_MAX_DEPTH, &external_docs);
        let create_widget = ops.iter().find(|op| op.operation_id == "createWidget").unwrap();
        let names: Vec<_> = create_widget.parameters.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"name"));
        assert!(names.contains(&"weight"));
    }

    #[test]
    fn unresolvable_external_ref_degrades_to_empty_object_instead_of_panicking() {
        let main = r#"{
            "openapi": "3.0.3",
            "info": {"title": "Main", "version": "1.0"},
            "paths": {
                "/widgets": {
                    "post": {
                        "operationId": "createWidget",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": {"$ref": "missing.json#/Widget"}
                                }
                            }
                        },
                        "responses": {"201": {"description": "created"}}
                    }
                }
            }
        }"#;
        let doc = parse_document(main.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test", DEFAULT_MAX_DEPTH);
        assert_eq!(ops.len(), 1);
    }
}
