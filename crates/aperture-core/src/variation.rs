use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A canonical seed HTTP request serialized from an [`ApiEndpoint`](crate::api::ApiEndpoint)'s
/// default parameter values, consumed by downstream active scanners.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RequestVariation {
    /// Owning endpoint.
    pub endpoint_id: uuid::Uuid,
    /// Fully-resolved request URL.
    pub url: String,
    /// HTTP method, uppercase.
    pub method: String,
    /// Request content-type, when a body is present.
    pub content_type: Option<String>,
    /// Request headers. Authorization, Proxy-Authorization, and Cookie are
    /// stripped before storage per the ingestor's seeding contract.
    pub headers: Vec<(String, String)>,
    /// Serialized request body bytes.
    #[schemars(skip)]
    pub body: Vec<u8>,
    /// GraphQL query text, GraphQL endpoints only.
    pub query_text: Option<String>,
    /// GraphQL operation name, GraphQL endpoints only.
    pub operation_name: Option<String>,
    /// GraphQL variables, serialized as JSON text.
    pub variables_json: Option<String>,
}
