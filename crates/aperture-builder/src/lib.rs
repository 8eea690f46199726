// SPDX-License-Identifier: MIT OR Apache-2.0
//! aperture-builder
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Three `RequestBuilder` implementations — REST, GraphQL, SOAP — sharing
//! one contract: `build(ctx, operation, values) -> HTTPRequest` (§4.6).

/// Shared default-value resolution.
pub mod defaults;
/// GraphQL request builder.
pub mod graphql;
/// REST request builder.
pub mod rest;
/// SOAP envelope builder.
pub mod soap;

use aperture_core::{Operation, ParameterLocation};
use aperture_error::ApertureError;

pub use defaults::{effective_value, placeholder_for, scalar_to_string, ParamValues};
pub use graphql::GraphQlRequestBuilder;
pub use rest::RestRequestBuilder;
pub use soap::SoapRequestBuilder;

/// Fixed User-Agent applied by builders unless the caller already set one.
pub const DEFAULT_BUILDER_USER_AGENT: &str = "aperture-scanner/1.0";

/// Default GraphQL selection-set expansion depth (§4.6: "default 3").
pub const DEFAULT_GRAPHQL_MAX_DEPTH: usize = 3;

/// An auth strategy applied last, after all parameter-derived headers
/// (§4.6 "Auth: ... applied last").
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// No authentication applied.
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic <base64>`.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// A static API key carried in a header, query parameter, or cookie.
    ApiKey {
        /// Where the key is carried.
        location: ParameterLocation,
        /// Header/query/cookie name.
        name: String,
        /// Key value.
        value: String,
    },
    /// An arbitrary bag of headers applied verbatim.
    CustomHeaders(Vec<(String, String)>),
}

/// Shared build-time inputs every `RequestBuilder` variant consumes.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Headers the caller already set; builder defaults only fill gaps.
    pub caller_headers: Vec<(String, String)>,
    /// Auth strategy, applied last over every other header.
    pub auth: AuthStrategyOrNone,
    /// Max GraphQL selection-set expansion depth (default 3).
    pub graphql_max_depth: usize,
}

impl Default for BuildContext {
    fn default() -> Self {
        BuildContext {
            caller_headers: Vec::new(),
            auth: AuthStrategyOrNone::default(),
            graphql_max_depth: DEFAULT_GRAPHQL_MAX_DEPTH,
        }
    }
}

/// Newtype so [`BuildContext`] can derive `Default` even though
/// [`AuthStrategy`] has no natural zero value.
#[derive(Debug, Clone)]
pub struct AuthStrategyOrNone(pub AuthStrategy);

impl Default for AuthStrategyOrNone {
    fn default() -> Self {
        AuthStrategyOrNone(AuthStrategy::None)
    }
}

/// The HTTP request a builder produces, ready for `HttpTransport::execute`.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    /// Fully-resolved URL, including query string.
    pub url: String,
    /// HTTP method, uppercase.
    pub method: String,
    /// Request headers in application order (later entries win on
    /// case-insensitive name collision when serialized to wire headers).
    pub headers: Vec<(String, String)>,
    /// Raw request body bytes, if any.
    pub body: Option<Vec<u8>>,
    /// GraphQL query text, GraphQL requests only.
    pub graphql_query: Option<String>,
    /// GraphQL operation name, GraphQL requests only.
    pub graphql_operation_name: Option<String>,
    /// GraphQL variables, serialized as JSON text, GraphQL requests only.
    pub graphql_variables_json: Option<String>,
}

impl HttpRequest {
    /// Replaces (not appends) the header named `name`, case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    /// Content-type of the request body, if a `Content-Type` header is set.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
    }
}

/// Shared contract for REST/GraphQL/SOAP request construction.
pub trait RequestBuilder {
    /// Builds an [`HttpRequest`] for `operation` from `values`.
    fn build(
        &self,
        ctx: &BuildContext,
        operation: &Operation,
        values: &ParamValues,
    ) -> Result<HttpRequest, ApertureError>;

    /// Copies `base_values`, overrides the `name` entry with `new_value`,
    /// and delegates to [`build`](Self::build) — `base_values` itself is
    /// never mutated (§4.6).
    fn build_with_modified_param(
        &self,
        ctx: &BuildContext,
        operation: &Operation,
        name: &str,
        new_value: serde_json::Value,
        base_values: &ParamValues,
    ) -> Result<HttpRequest, ApertureError> {
        let mut values = base_values.clone();
        values.insert(name.to_string(), new_value);
        self.build(ctx, operation, &values)
    }
}

/// Applies an [`AuthStrategy`] to `request`, last and unconditionally
/// overriding any colliding header/query entry (§4.6).
pub fn apply_auth(request: &mut HttpRequest, auth: &AuthStrategy) {
    match auth {
        AuthStrategy::None => {}
        AuthStrategy::Bearer(token) => {
            request.set_header("Authorization", format!("Bearer {token}"));
        }
        AuthStrategy::Basic { username, password } => {
            use base64::Engine;
            let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            request.set_header("Authorization", format!("Basic {encoded}"));
        }
        AuthStrategy::ApiKey { location, name, value } => match location {
            ParameterLocation::Header => request.set_header(name.clone(), value.clone()),
            ParameterLocation::Cookie => {
                let cookie = format!("{name}={value}");
                request.set_header("Cookie", cookie);
            }
            ParameterLocation::Query => {
                let separator = if request.url.contains('?') { '&' } else { '?' };
                request.url.push(separator);
                request.url.push_str(name);
                request.url.push('=');
                request.url.push_str(
                    &percent_encoding::utf8_percent_encode(value, percent_encoding::NON_ALPHANUMERIC).to_string(),
                );
            }
            _ => {}
        },
        AuthStrategy::CustomHeaders(headers) => {
            for (name, value) in headers {
                request.set_header(name.clone(), value.clone());
            }
        }
    }
}
