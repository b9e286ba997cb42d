use crate::config::ClientConfig;
use crate::transport::{ClientError, ClientResult, Transport};
use crate::types::{ApiRequest, ApiResponse, Method, ResponseBody};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info};

pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config
            .validate()
            .map_err(|msg| ClientError::InvalidConfig { message: msg })?;

        let base_url = config.normalized_base_url();

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ClientError::Unknown {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url,
            config,
        })
    }

    pub fn with_default_config() -> ClientResult<Self> {
        Self::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url_for(&self, path: &str) -> String {
        if path.is_empty() {
            self.base_url.clone()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn convert_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn classify_error(&self, err: reqwest::Error, request: &ApiRequest) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                request: request.describe(),
                timeout_ms: self.config.timeout.as_millis(),
            }
        } else if err.is_connect() {
            ClientError::Connect {
                url: self.url_for(&request.path),
            }
        } else {
            ClientError::Network(err)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let url = self.url_for(&request.path);
        debug!("{} {}", request.method, url);

        let mut builder = self
            .http_client
            .request(Self::convert_method(request.method), &url);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let http_response = builder
            .send()
            .await
            .map_err(|e| self.classify_error(e, &request))?;

        let status = http_response.status().as_u16();
        let raw = http_response
            .text()
            .await
            .map_err(|e| self.classify_error(e, &request))?;
        let elapsed = started.elapsed();

        info!(
            "{} {} -> {} in {}ms",
            request.method,
            request.path,
            status,
            elapsed.as_millis()
        );

        Ok(ApiResponse::new(status, ResponseBody::from_text(raw)).with_elapsed(elapsed))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}
