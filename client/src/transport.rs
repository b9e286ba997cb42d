use crate::types::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request timed out after {timeout_ms}ms: {request}")]
    Timeout { request: String, timeout_ms: u128 },

    #[error("Cannot connect to {url}")]
    Connect { url: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Sends requests to the API under test.
///
/// HTTP error statuses are successful sends; only transport-level problems are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse>;

    fn base_url(&self) -> &str;

    fn transport_name(&self) -> &'static str;
}
