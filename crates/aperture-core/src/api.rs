use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which wire format an [`ApiDefinition`] was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiKind {
    /// OpenAPI 3.x or Swagger 2.x.
    OpenApi,
    /// GraphQL introspection JSON.
    GraphQl,
    /// WSDL 1.1 or 2.0.
    Wsdl,
}

/// Lifecycle state of an [`ApiDefinition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApiStatus {
    /// Discovered but not yet parsed.
    Pending,
    /// Parsed successfully; endpoints persisted.
    Parsed,
    /// Parsing failed; no endpoints persisted.
    Failed,
}

/// OpenAPI-specific summary metadata attached to a Definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct OpenApiMeta {
    /// `"2.0"`, `"3.0.x"`, `"3.1.x"`, ...
    pub version: String,
    /// `info.title`.
    pub title: String,
    /// Number of `servers` entries (OpenAPI 3) or 1 if only `host`/`basePath`
    /// (Swagger 2) were present.
    pub server_count: u32,
}

/// GraphQL-specific summary metadata attached to a Definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GraphQlMeta {
    /// Number of fields on the root Query type.
    pub query_count: u32,
    /// Number of fields on the root Mutation type, 0 if absent.
    pub mutation_count: u32,
    /// Number of fields on the root Subscription type, 0 if absent.
    pub subscription_count: u32,
    /// Total named types in the schema.
    pub type_count: u32,
}

/// WSDL-specific summary metadata attached to a Definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WsdlMeta {
    /// `targetNamespace` of the root `definitions`/`description` element.
    pub target_namespace: String,
    /// Number of `wsdl:service` elements.
    pub service_count: u32,
    /// `"1.1"` or `"1.2"`, resolved from the binding's SOAP namespace.
    pub soap_version: String,
}

/// Type-specific Definition metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionMeta {
    /// See [`OpenApiMeta`].
    OpenApi(OpenApiMeta),
    /// See [`GraphQlMeta`].
    GraphQl(GraphQlMeta),
    /// See [`WsdlMeta`].
    Wsdl(WsdlMeta),
}

/// A parsed API description, persisted with its endpoints and parameters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiDefinition {
    /// Unique identity, assigned on first persist.
    pub id: uuid::Uuid,
    /// Owning workspace.
    pub workspace_id: String,
    /// Which parser produced this Definition.
    pub kind: ApiKind,
    /// Lifecycle state.
    pub status: ApiStatus,
    /// Where the raw document was discovered, or a caller-supplied label
    /// for manually-ingested content.
    pub source_url: String,
    /// Base URL operations are relative to.
    pub base_url: String,
    /// The raw document bytes, preserved for re-parsing/auditing.
    #[schemars(skip)]
    pub raw: Vec<u8>,
    /// True when discovered by the orchestrator rather than ingested via
    /// `PersistAPIDefinitionFromContent`.
    pub auto_discovered: bool,
    /// Type-specific summary metadata.
    pub meta: DefinitionMeta,
    /// Number of endpoints persisted under this Definition.
    pub endpoint_count: u32,
}

/// Where a [`Parameter`] is carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterLocation {
    /// A `{placeholder}` segment in the URL path.
    Path,
    /// A URL query-string key.
    #[default]
    Query,
    /// An HTTP header.
    Header,
    /// An HTTP cookie.
    Cookie,
    /// A field inside the request body.
    Body,
    /// A GraphQL field argument.
    Argument,
}

/// The primitive or composite type of a [`Parameter`]'s value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// UTF-8 text.
    #[default]
    String,
    /// Signed integer.
    Integer,
    /// Floating point.
    Number,
    /// `true`/`false`.
    Boolean,
    /// Ordered list; see `items` on [`Parameter`] for the element shape.
    Array,
    /// Structured object; see `children` on [`Parameter`] for its fields.
    Object,
    /// File upload (multipart).
    File,
}

/// Schema-derived constraints attached to a [`Parameter`]. All fields are
/// optional — absence means "unconstrained", not "zero".
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Constraints {
    /// Schema `format` (e.g. `"date-time"`, `"id"`, `"byte"`).
    pub format: Option<String>,
    /// Inclusive unless `exclusive_minimum` is set.
    pub minimum: Option<f64>,
    /// Inclusive unless `exclusive_maximum` is set.
    pub maximum: Option<f64>,
    /// Whether `minimum` excludes the bound itself.
    pub exclusive_minimum: bool,
    /// Whether `maximum` excludes the bound itself.
    pub exclusive_maximum: bool,
    /// Minimum string length.
    pub min_length: Option<u64>,
    /// Maximum string length.
    pub max_length: Option<u64>,
    /// Regex the value must match.
    pub pattern: Option<String>,
    /// Fixed set of admissible values.
    pub enum_values: Vec<serde_json::Value>,
    /// Minimum array length.
    pub min_items: Option<u64>,
    /// Maximum array length.
    pub max_items: Option<u64>,
}

/// One parameter of an [`Operation`]/[`ApiEndpoint`], possibly the root of
/// a nested tree for arrays and objects.
///
/// Nesting depth is bounded by each parser's `max_depth` (default 10); a
/// child whose type was already visited on the current path truncates to
/// an empty `children`/`items` list rather than recursing further.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    /// Parameter name (field name for nested/body parameters).
    pub name: String,
    /// Where this parameter is carried.
    pub location: ParameterLocation,
    /// Whether the caller must supply a value.
    pub required: bool,
    /// The parameter's value type.
    pub data_type: DataType,
    /// Schema-derived constraints.
    pub constraints: Constraints,
    /// Schema `default`, if declared.
    pub default_value: Option<serde_json::Value>,
    /// Schema `example`, if declared.
    pub example_value: Option<serde_json::Value>,
    /// Whether `null` is an admissible value.
    pub nullable: bool,
    /// Content-type for body parameters, when distinct from the operation's
    /// declared request-body content-type.
    pub content_type: Option<String>,
    /// Nested fields, for `data_type == Object`.
    pub children: Vec<Parameter>,
    /// Element shape, for `data_type == Array` (boxed to keep `Parameter`
    /// representable without infinite size).
    pub items: Option<Box<Parameter>>,
}

impl Parameter {
    /// Depth of the deepest nested descendant, 0 for a leaf parameter.
    pub fn depth(&self) -> usize {
        let child_depth = self.children.iter().map(Parameter::depth).max();
        let item_depth = self.items.as_ref().map(|p| p.depth() + 1);
        1 + child_depth.into_iter().chain(item_depth).max().unwrap_or(0)
    }
}

/// Scheme type, per OpenAPI's `securitySchemes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SecuritySchemeKind {
    /// Static API key.
    ApiKey,
    /// HTTP auth (basic/bearer/digest — subtype carried in `scheme`).
    Http,
    /// OAuth2 flows.
    OAuth2,
    /// OpenID Connect discovery.
    OpenIdConnect,
}

/// A named security scheme, globally attached to a Definition and/or
/// referenced per-endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecurityScheme {
    /// Scheme name, as referenced by [`SecurityRequirement::scheme_name`].
    pub name: String,
    /// Scheme kind.
    pub kind: SecuritySchemeKind,
    /// HTTP auth subtype (`"basic"`, `"bearer"`, ...), when `kind == Http`.
    pub scheme: Option<String>,
    /// Where an API-key scheme carries its value.
    pub location: Option<ParameterLocation>,
    /// Parameter name for an API-key scheme (e.g. `"X-API-Key"`).
    pub parameter_name: Option<String>,
    /// Bearer token format hint (e.g. `"JWT"`).
    pub bearer_format: Option<String>,
    /// OpenID Connect discovery document URL.
    pub open_id_connect_url: Option<String>,
}

/// A reference to a [`SecurityScheme`] by name plus its required scopes.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecurityRequirement {
    /// Name of the referenced [`SecurityScheme`].
    pub scheme_name: String,
    /// Resolved scheme kind, looked up at parse time.
    pub scheme_kind: SecuritySchemeKind,
    /// OAuth2/OIDC scopes required.
    pub scopes: Vec<String>,
}

/// Type-specific per-operation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationMeta {
    /// No extra metadata beyond the common `Operation` fields.
    OpenApi,
    /// GraphQL root operation kind (`query`/`mutation`/`subscription`).
    GraphQl {
        /// Root operation type this field belongs to.
        operation_type: String,
    },
    /// WSDL binding details.
    Wsdl {
        /// `soapAction` extracted from the binding operation.
        soap_action: String,
        /// `"1.1"` or `"1.2"`.
        soap_version: String,
        /// Name of the `wsdl:binding` this operation belongs to.
        binding: String,
    },
}

/// One callable operation, normalized from whichever format it was parsed
/// from. This is the parser's output shape; the ingestor persists it as an
/// [`ApiEndpoint`] plus child rows.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Operation {
    /// Link back to the owning Definition (set once persisted; parsers
    /// leave this as `None`).
    pub definition_id: Option<uuid::Uuid>,
    /// Which format this operation was parsed from.
    pub api_kind: ApiKind,
    /// Human-facing name (OpenAPI `operationId` or summary, GraphQL field
    /// name, WSDL operation name).
    pub display_name: String,
    /// HTTP method, uppercase. Always `POST` for GraphQL and SOAP.
    pub method: String,
    /// URL path template, REST only (`None` for GraphQL/WSDL).
    pub url_path: Option<String>,
    /// Base URL operations are relative to.
    pub base_url: String,
    /// Stable per-document operation identifier.
    pub operation_id: String,
    /// Short summary, if declared.
    pub summary: Option<String>,
    /// Long-form description, if declared.
    pub description: Option<String>,
    /// Whether the source document marked this operation deprecated.
    pub deprecated: bool,
    /// Free-form tags/categories.
    pub tags: Vec<String>,
    /// Parameter tree, root-level entries only (nesting lives in
    /// `Parameter::children`/`items`).
    pub parameters: Vec<Parameter>,
    /// Security requirements specific to this operation (already merged
    /// with/overriding global requirements per §4.4).
    pub security: Vec<SecurityRequirement>,
    /// Accepted request content-types, in declaration order.
    pub request_content_types: Vec<String>,
    /// Declared response content-types, in declaration order.
    pub response_content_types: Vec<String>,
    /// Declared return-type name/description, when available.
    pub return_type: Option<String>,
    /// Type-specific metadata.
    pub meta: OperationMeta,
}

/// A persisted, Definition-owned operation row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiEndpoint {
    /// Unique identity, assigned on persist.
    pub id: uuid::Uuid,
    /// Owning Definition.
    pub definition_id: uuid::Uuid,
    /// Stable per-document operation identifier.
    pub operation_id: String,
    /// Human-facing display name.
    pub display_name: String,
    /// Short summary, if declared.
    pub summary: Option<String>,
    /// Long-form description, if declared.
    pub description: Option<String>,
    /// Whether the endpoint is active for downstream scanning.
    pub enabled: bool,
    /// HTTP method, uppercase.
    pub method: String,
    /// URL path template, REST only.
    pub url_path: Option<String>,
    /// `"query"` / `"mutation"` / `"subscription"` / `"soap"` / `"rest"`.
    pub operation_type: String,
    /// Declared return-type name/description.
    pub return_type: Option<String>,
    /// SOAP action, WSDL only.
    pub soap_action: Option<String>,
}

impl ApiEndpoint {
    /// Builds a persisted endpoint row from a parsed [`Operation`],
    /// dropping fields that stay attached to the Operation's parameters or
    /// security requirements (those are persisted as separate child rows).
    pub fn from_operation(definition_id: uuid::Uuid, id: uuid::Uuid, op: &Operation) -> Self {
        let operation_type = match &op.meta {
            OperationMeta::OpenApi => "rest".to_string(),
            OperationMeta::GraphQl { operation_type } => operation_type.clone(),
            OperationMeta::Wsdl { .. } => "soap".to_string(),
        };
        let soap_action = match &op.meta {
            OperationMeta::Wsdl { soap_action, .. } => Some(soap_action.clone()),
            _ => None,
        };
        ApiEndpoint {
            id,
            definition_id,
            operation_id: op.operation_id.clone(),
            display_name: op.display_name.clone(),
            summary: op.summary.clone(),
            description: op.description.clone(),
            enabled: true,
            method: op.method.clone(),
            url_path: op.url_path.clone(),
            operation_type,
            return_type: op.return_type.clone(),
            soap_action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_parameter_has_depth_one() {
        let p = Parameter {
            name: "x".into(),
            data_type: DataType::String,
            ..Default::default()
        };
        assert_eq!(p.depth(), 1);
    }

    #[test]
    fn nested_children_increase_depth() {
        let leaf = Parameter {
            name: "inner".into(),
            data_type: DataType::String,
            ..Default::default()
        };
        let root = Parameter {
            name: "outer".into(),
            data_type: DataType::Object,
            children: vec![leaf],
            ..Default::default()
        };
        assert_eq!(root.depth(), 2);
    }

    #[test]
    fn array_items_increase_depth() {
        let inner = Parameter {
            name: "item".into(),
            data_type: DataType::Integer,
            ..Default::default()
        };
        let root = Parameter {
            name: "list".into(),
            data_type: DataType::Array,
            items: Some(Box::new(inner)),
            ..Default::default()
        };
        assert_eq!(root.depth(), 2);
    }
}
