//! Failure-containing request wrapper.
//!
//! Scenarios talk to the backend exclusively through [`ApiSession`]. A transport
//! failure on one request (timeout, refused connection, broken body) is turned
//! into an [`Exchange::Unreachable`] value and logged, so a single unreachable
//! call can never abort a run. HTTP error statuses are ordinary responses that
//! callers assert on.

use crate::config::ClientConfig;
use crate::http::HttpTransport;
use crate::transport::{ClientResult, Transport};
use crate::types::{ApiRequest, ApiResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::error;

/// Transport-level failure captured in place of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportFailure {
    pub request: String,
    pub message: String,
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.request, self.message)
    }
}

/// Result of one call through an [`ApiSession`].
#[derive(Debug, Clone, PartialEq)]
pub enum Exchange {
    Responded(ApiResponse),
    Unreachable(TransportFailure),
}

impl Exchange {
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Exchange::Responded(response) => Some(response),
            Exchange::Unreachable(_) => None,
        }
    }

    pub fn into_response(self) -> Option<ApiResponse> {
        match self {
            Exchange::Responded(response) => Some(response),
            Exchange::Unreachable(_) => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.response().map(|r| r.status)
    }

    pub fn is_success(&self) -> bool {
        self.response().is_some_and(ApiResponse::is_success)
    }

    /// JSON body of a 2xx response.
    pub fn success_json(&self) -> Option<&Value> {
        self.response()
            .filter(|r| r.is_success())
            .and_then(ApiResponse::json)
    }

    /// One-line description for result details: `HTTP 422: ...` or the transport error.
    pub fn summary(&self) -> String {
        match self {
            Exchange::Responded(response) => {
                let mut text = response.text();
                if text.chars().count() > 200 {
                    text = text.chars().take(200).collect::<String>() + "…";
                }
                format!("HTTP {}: {}", response.status, text)
            }
            Exchange::Unreachable(failure) => format!("Exception: {}", failure),
        }
    }
}

#[derive(Clone)]
pub struct ApiSession {
    transport: Arc<dyn Transport>,
}

impl ApiSession {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn http(config: ClientConfig) -> ClientResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub async fn call(&self, request: ApiRequest) -> Exchange {
        let described = request.describe();
        match self.transport.send(request).await {
            Ok(response) => Exchange::Responded(response),
            Err(e) => {
                error!("{} failed: {}", described, e);
                Exchange::Unreachable(TransportFailure {
                    request: described,
                    message: e.to_string(),
                })
            }
        }
    }

    pub async fn get(&self, path: impl Into<String>) -> Exchange {
        self.call(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: impl Into<String>, body: Value) -> Exchange {
        self.call(ApiRequest::post(path).with_json(body)).await
    }

    pub async fn put(&self, path: impl Into<String>, body: Value) -> Exchange {
        self.call(ApiRequest::put(path).with_json(body)).await
    }

    pub async fn delete(&self, path: impl Into<String>) -> Exchange {
        self.call(ApiRequest::delete(path)).await
    }
}

impl fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSession")
            .field("transport", &self.transport.transport_name())
            .field("base_url", &self.transport.base_url())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ClientError;
    use crate::types::ResponseBody;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct DownTransport;

    #[async_trait]
    impl Transport for DownTransport {
        async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
            Err(ClientError::Timeout {
                request: request.describe(),
                timeout_ms: 2000,
            })
        }

        fn base_url(&self) -> &str {
            "http://down.invalid/api"
        }

        fn transport_name(&self) -> &'static str {
            "down"
        }
    }

    #[tokio::test]
    async fn test_transport_error_becomes_unreachable() {
        let session = ApiSession::new(Arc::new(DownTransport));
        let exchange = session.get("/customers").await;

        match &exchange {
            Exchange::Unreachable(failure) => {
                assert_eq!(failure.request, "GET /customers");
                assert!(failure.message.contains("timed out"));
            }
            other => panic!("expected unreachable, got {:?}", other),
        }
        assert!(!exchange.is_success());
        assert!(exchange.status().is_none());
        assert!(exchange.summary().starts_with("Exception: GET /customers failed"));
    }

    #[tokio::test]
    async fn test_unreachable_host_never_errors() {
        let config = ClientConfig::default()
            .with_base_url("http://127.0.0.1:1/api")
            .with_timeout(Duration::from_secs(2));
        let session = ApiSession::http(config).unwrap();

        for _ in 0..3 {
            let exchange = session.post("/customers", json!({"name": "X"})).await;
            assert!(matches!(exchange, Exchange::Unreachable(_)));
        }
    }

    #[test]
    fn test_exchange_accessors() {
        let exchange = Exchange::Responded(ApiResponse::new(
            200,
            ResponseBody::Json(json!({"id": "i-1"})),
        ));
        assert!(exchange.is_success());
        assert_eq!(exchange.status(), Some(200));
        assert_eq!(exchange.success_json().unwrap()["id"], "i-1");
        assert_eq!(exchange.summary(), "HTTP 200: {\"id\":\"i-1\"}");

        let rejected = Exchange::Responded(ApiResponse::new(
            422,
            ResponseBody::Json(json!({"detail": []})),
        ));
        assert!(rejected.success_json().is_none());
        assert_eq!(rejected.into_response().unwrap().status, 422);
    }
}
