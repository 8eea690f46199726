// SPDX-License-Identifier: MIT OR Apache-2.0
//! Default [`HttpTransport`] implementation, backed by a single shared
//! [`reqwest::Client`] with HTTP/2 and keep-alive enabled, per §5's "shared
//! resources" requirement.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;
use uuid::Uuid;

use aperture_collab::{HttpTransport, OutboundRequest};
use aperture_core::HistoryRecord;
use aperture_error::{ApertureError, ErrorCode};

/// Default User-Agent sent when neither the caller nor
/// `scan.user_agent` override it.
pub const DEFAULT_USER_AGENT: &str = "Aperture-ContentDiscovery/1.0";

/// A [`HttpTransport`] backed by one shared [`reqwest::Client`].
///
/// Construct once per scan (or reuse across scans) and hand `Arc` clones
/// to the prober and orchestrator — never build a client per request.
#[derive(Clone)]
pub struct HttpClientTransport {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpClientTransport {
    /// Builds a transport with the default User-Agent.
    pub fn new() -> Result<Self, ApertureError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    /// Builds a transport with a caller-chosen default User-Agent
    /// (`scan.user_agent`), used for every request that does not set its
    /// own `User-Agent` header.
    pub fn with_user_agent(user_agent: impl Into<String>) -> Result<Self, ApertureError> {
        let client = reqwest::Client::builder()
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| {
                ApertureError::new(ErrorCode::Internal, "failed to build HTTP client")
                    .with_source(e)
            })?;
        Ok(Self {
            client,
            user_agent: user_agent.into(),
        })
    }

    /// Returns an `Arc`-wrapped transport, ready to be cloned into
    /// concurrent probe tasks.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl Default for HttpClientTransport {
    fn default() -> Self {
        Self::new().expect("default reqwest client configuration is always valid")
    }
}

#[async_trait]
impl HttpTransport for HttpClientTransport {
    async fn execute(
        &self,
        request: OutboundRequest,
        timeout: Duration,
    ) -> Result<HistoryRecord, ApertureError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            ApertureError::new(ErrorCode::InputUnparseableUrl, "invalid HTTP method")
                .with_context("method", request.method.clone())
                .with_source(e)
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_str(&self.user_agent).unwrap_or_else(|_| HeaderValue::from_static("")),
        );
        headers.insert(reqwest::header::CONNECTION, HeaderValue::from_static("keep-alive"));
        if request.body.is_some() {
            headers.insert(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
        // Caller-supplied headers win: insert (not append) so they replace
        // any default set above.
        for (name, value) in &request.headers {
            match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(target: "aperture.transport", header = %name, "dropping unrepresentable header"),
            }
        }

        let mut builder = self.client.request(method, &request.url).timeout(timeout).headers(headers);
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(HistoryRecord {
            id: Uuid::new_v4(),
            url: request.url,
            method: request.method.to_uppercase(),
            status_code: status,
            content_type,
            headers,
            body: Arc::from(body.as_ref()),
            workspace_id: request.workspace_id,
            created_at: Utc::now(),
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ApertureError {
    let code = if err.is_timeout() {
        ErrorCode::TransportTimeout
    } else if err.is_connect() {
        ErrorCode::TransportNetworkFailure
    } else {
        ErrorCode::TransportNetworkFailure
    };
    ApertureError::new(code, err.to_string()).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn execute_captures_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let transport = HttpClientTransport::new().unwrap();
        let request = OutboundRequest {
            url: format!("{}/ok", server.uri()),
            method: "GET".into(),
            headers: vec![],
            body: None,
            workspace_id: "ws-1".into(),
        };
        let record = transport
            .execute(request, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(record.status_code, 200);
        assert_eq!(&*record.body_bytes(), b"hello");
    }

    #[tokio::test]
    async fn caller_headers_override_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ua"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let transport = HttpClientTransport::new().unwrap();
        let request = OutboundRequest {
            url: format!("{}/ua", server.uri()),
            method: "GET".into(),
            headers: vec![("User-Agent".into(), "custom-agent".into())],
            body: None,
            workspace_id: "ws-1".into(),
        };
        let record = transport
            .execute(request, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(record.status_code, 200);
    }

    #[tokio::test]
    async fn invalid_method_is_an_input_error() {
        let transport = HttpClientTransport::new().unwrap();
        let request = OutboundRequest {
            url: "http://example.test/".into(),
            method: "NOT A METHOD".into(),
            headers: vec![],
            body: None,
            workspace_id: "ws-1".into(),
        };
        let err = transport
            .execute(request, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InputUnparseableUrl);
    }
}
