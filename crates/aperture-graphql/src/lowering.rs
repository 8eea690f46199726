use std::collections::{HashMap, HashSet};

use aperture_core::{
    ApiKind, Constraints, DataType, GraphQlMeta, Operation, OperationMeta, Parameter,
    ParameterLocation,
};
use serde_json::Value;

use crate::dialect::IntrospectionDocument;

/// Default bound on input-object nesting depth (§4.4: "default 10").
pub const DEFAULT_MAX_DEPTH: usize = 10;

struct TypeMap<'a>(HashMap<&'a str, &'a Value>);

impl<'a> TypeMap<'a> {
    fn build(types: &'a [Value]) -> Self {
        let mut map = HashMap::new();
        for ty in types {
            if let Some(name) = ty.get("name").and_then(Value::as_str) {
                map.insert(name, ty);
            }
        }
        TypeMap(map)
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.0.get(name).copied()
    }
}

/// Strips exactly one `NON_NULL` wrapper, returning `(required, inner)`.
fn unwrap_non_null(type_ref: &Value) -> (bool, &Value) {
    if type_ref.get("kind").and_then(Value::as_str) == Some("NON_NULL") {
        match type_ref.get("ofType") {
            Some(inner) => (true, inner),
            None => (true, type_ref),
        }
    } else {
        (false, type_ref)
    }
}

fn scalar_parameter(name: &str, scalar_name: &str, required: bool, location: ParameterLocation) -> Parameter {
    let (data_type, format) = match scalar_name {
        "ID" => (DataType::String, Some("id".to_string())),
        "Int" => (DataType::Integer, None),
        "Float" => (DataType::Number, None),
        "Boolean" => (DataType::Boolean, None),
        _ => (DataType::String, None),
    };
    Parameter {
        name: name.to_string(),
        location,
        required,
        data_type,
        constraints: Constraints {
            format,
            ..Constraints::default()
        },
        ..Default::default()
    }
}

fn enum_parameter(name: &str, enum_type: &Value, required: bool, location: ParameterLocation) -> Parameter {
    let enum_values = enum_type
        .get("enumValues")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(|v| v.get("name").and_then(Value::as_str))
                .map(|s| Value::String(s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    Parameter {
        name: name.to_string(),
        location,
        required,
        data_type: DataType::String,
        constraints: Constraints {
            enum_values,
            ..Constraints::default()
        },
        ..Default::default()
    }
}

/// Builds a [`Parameter`] from a GraphQL type reference, recursively
/// expanding `INPUT_OBJECT` fields and `LIST` element types. Cycle
/// detection uses a visited-set keyed by input-type name, bounded by
/// `max_depth` (§4.4 "GraphQL parser").
fn build_parameter(
    name: &str,
    type_ref: &Value,
    location: ParameterLocation,
    types: &TypeMap<'_>,
    visited: &mut HashSet<String>,
    depth: usize,
    max_depth: usize,
) -> Parameter {
    let (required, inner) = unwrap_non_null(type_ref);
    let kind = inner.get("kind").and_then(Value::as_str).unwrap_or("SCALAR");

    match kind {
        "LIST" => {
            let element_ref = inner.get("ofType").cloned().unwrap_or(Value::Null);
            let element = build_parameter(name, &element_ref, ParameterLocation::Body, types, visited, depth, max_depth);
            Parameter {
                name: name.to_string(),
                location,
                required,
                data_type: DataType::Array,
                items: Some(Box::new(element)),
                ..Default::default()
            }
        }
        "ENUM" => {
            let enum_type = inner.get("name").and_then(Value::as_str).and_then(|n| types.get(n)).unwrap_or(inner);
            enum_parameter(name, enum_type, required, location)
        }
        "INPUT_OBJECT" => {
            let type_name = inner.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            if visited.contains(&type_name) || depth >= max_depth {
                return Parameter {
                    name: name.to_string(),
                    location,
                    required,
                    data_type: DataType::Object,
                    ..Default::default()
                };
            }
            visited.insert(type_name.clone());
            let input_fields = types
                .get(&type_name)
                .or(Some(inner))
                .and_then(|t| t.get("inputFields"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let children = input_fields
                .iter()
                .filter_map(|field| {
                    let field_name = field.get("name").and_then(Value::as_str)?;
                    let field_type = field.get("type")?;
                    Some(build_parameter(
                        field_name,
                        field_type,
                        ParameterLocation::Body,
                        types,
                        visited,
                        depth + 1,
                        max_depth,
                    ))
                })
                .collect();
            visited.remove(&type_name);
            Parameter {
                name: name.to_string(),
                location,
                required,
                data_type: DataType::Object,
                children,
                ..Default::default()
            }
        }
        _ => {
            let scalar_name = inner.get("name").and_then(Value::as_str).unwrap_or("String");
            scalar_parameter(name, scalar_name, required, location)
        }
    }
}

fn field_type_description(type_ref: &Value) -> String {
    let (required, inner) = unwrap_non_null(type_ref);
    let base = match inner.get("kind").and_then(Value::as_str) {
        Some("LIST") => {
            let element = inner.get("ofType").cloned().unwrap_or(Value::Null);
            format!("[{}]", field_type_description(&element))
        }
        _ => inner.get("name").and_then(Value::as_str).unwrap_or("Unknown").to_string(),
    };
    if required {
        format!("{base}!")
    } else {
        base
    }
}

fn operations_for_root(
    root_type_name: &str,
    operation_type: &str,
    types: &TypeMap<'_>,
    base_url: &str,
    max_depth: usize,
) -> Vec<Operation> {
    let Some(root_type) = types.get(root_type_name) else {
        return Vec::new();
    };
    let Some(fields) = root_type.get("fields").and_then(Value::as_array) else {
        return Vec::new();
    };

    fields
        .iter()
        .filter_map(|field| {
            let name = field.get("name").and_then(Value::as_str)?;
            let args = field.get("args").and_then(Value::as_array).cloned().unwrap_or_default();
            let parameters = args
                .iter()
                .filter_map(|arg| {
                    let arg_name = arg.get("name").and_then(Value::as_str)?;
                    let arg_type = arg.get("type")?;
                    let mut visited = HashSet::new();
                    Some(build_parameter(
                        arg_name,
                        arg_type,
                        ParameterLocation::Argument,
                        types,
                        &mut visited,
                        0,
                        max_depth,
                    ))
                })
                .collect();

            Some(Operation {
                definition_id: None,
                api_kind: ApiKind::GraphQl,
                display_name: name.to_string(),
                method: "POST".to_string(),
                url_path: None,
                base_url: base_url.to_string(),
                operation_id: format!("{operation_type}:{name}"),
                summary: field.get("description").and_then(Value::as_str).map(str::to_string),
                description: None,
                deprecated: field.get("isDeprecated").and_then(Value::as_bool).unwrap_or(false),
                tags: Vec::new(),
                parameters,
                security: Vec::new(),
                request_content_types: vec!["application/json".to_string()],
                response_content_types: vec!["application/json".to_string()],
                return_type: field.get("type").map(field_type_description),
                meta: OperationMeta::GraphQl {
                    operation_type: operation_type.to_string(),
                },
            })
        })
        .collect()
}

/// Lowers one introspection document into `[Operation]`, one per Query,
/// Mutation, and Subscription field.
pub fn lower(doc: &IntrospectionDocument, base_url: &str, max_depth: usize) -> Vec<Operation> {
    let types: Vec<Value> = doc
        .schema
        .get("types")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let type_map = TypeMap::build(&types);

    let mut operations = Vec::new();
    for (root_key, operation_type) in [
        ("queryType", "query"),
        ("mutationType", "mutation"),
        ("subscriptionType", "subscription"),
    ] {
        if let Some(root_name) = doc.schema.pointer(&format!("/{root_key}/name")).and_then(Value::as_str) {
            operations.extend(operations_for_root(root_name, operation_type, &type_map, base_url, max_depth));
        }
    }
    operations
}

/// Builds the summary [`GraphQlMeta`] attached to the owning `ApiDefinition`.
pub fn summarize(doc: &IntrospectionDocument) -> GraphQlMeta {
    let types: Vec<Value> = doc
        .schema
        .get("types")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let type_map = TypeMap::build(&types);

    let count_fields = |root_key: &str| -> u32 {
        doc.schema
            .pointer(&format!("/{root_key}/name"))
            .and_then(Value::as_str)
            .and_then(|name| type_map.get(name))
            .and_then(|ty| ty.get("fields"))
            .and_then(Value::as_array)
            .map(|f| f.len() as u32)
            .unwrap_or(0)
    };

    GraphQlMeta {
        query_count: count_fields("queryType"),
        mutation_count: count_fields("mutationType"),
        subscription_count: count_fields("subscriptionType"),
        type_count: types.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::parse_document;

    const SCHEMA: &str = r#"{
        "data": {
            "__schema": {
                "queryType": {"name": "Query"},
                "mutationType": {"name": "Mutation"},
                "types": [
                    {
                        "kind": "OBJECT",
                        "name": "Query",
                        "fields": [
                            {
                                "name": "pet",
                                "args": [
                                    {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
                                ],
                                "type": {"kind": "OBJECT", "name": "Pet"}
                            }
                        ]
                    },
                    {
                        "kind": "OBJECT",
                        "name": "Mutation",
                        "fields": [
                            {
                                "name": "createPet",
                                "args": [
                                    {"name": "input", "type": {"kind": "NON_NULL", "ofType": {"kind": "INPUT_OBJECT", "name": "PetInput"}}}
                                ],
                                "type": {"kind": "OBJECT", "name": "Pet"}
                            }
                        ]
                    },
                    {
                        "kind": "INPUT_OBJECT",
                        "name": "PetInput",
                        "inputFields": [
                            {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
                            {"name": "tags", "type": {"kind": "LIST", "ofType": {"kind": "SCALAR", "name": "String"}}},
                            {"name": "self", "type": {"kind": "INPUT_OBJECT", "name": "PetInput"}}
                        ]
                    }
                ]
            }
        }
    }"#;

    #[test]
    fn lowers_query_and_mutation_fields() {
        let doc = parse_document(SCHEMA.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test/graphql", DEFAULT_MAX_DEPTH);
        assert!(ops.iter().any(|op| op.operation_id == "query:pet"));
        assert!(ops.iter().any(|op| op.operation_id == "mutation:createPet"));
    }

    #[test]
    fn id_scalar_gets_id_format_and_non_null_is_required() {
        let doc = parse_document(SCHEMA.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test/graphql", DEFAULT_MAX_DEPTH);
        let pet = ops.iter().find(|op| op.operation_id == "query:pet").unwrap();
        let id_param = &pet.parameters[0];
        assert!(id_param.required);
        assert_eq!(id_param.constraints.format.as_deref(), Some("id"));
    }

    #[test]
    fn input_object_expands_into_nested_children() {
        let doc = parse_document(SCHEMA.as_bytes()).unwrap();
        let ops = lower(&doc, "https://api.example.test/graphql", DEFAULT_MAX_DEPTH);
        let create_pet = ops.iter().find(|op| op.operation_id == "mutation:createPet").unwrap();
        let input_param = &create_pet.parameters[0];
        assert_eq!(input_param.data_type, DataType::Object);
        let names: Vec<_> = input_param.children.iter().map(|c| c.name.as_str()).collect();
        assert!(names.contains(&"name"));
        assert!(names.contains(&"tags"));
    }

    #[test]
    fn self_referential_input_object_terminates_recursion() {
        let doc = parse_document(SCHEMA.as_bytes()).unwrap();
        // Must not stack-overflow or hang despite `PetInput.self: PetInput`.
        let ops = lower(&doc, "https://api.example.test/graphql", DEFAULT_MAX_DEPTH);
        assert_eq!(ops.len(), 2);
    }
}
