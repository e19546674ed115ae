//! HTTP transport for the flight-pricing API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::domain::IataCode;

use super::credential::CredentialSource;
use super::error::ProviderError;
use super::transport::FlightTransport;
use super::types::RouteResponse;

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 16;

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 500;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the pricing API
    pub base_url: String,
    /// Name used for the endpoint's circuit breaker
    pub endpoint: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Hard client-side timeout; the adapter's per-attempt timeout is tighter
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            endpoint: "flight-search".to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Reqwest-backed [`FlightTransport`].
///
/// Uses a semaphore to cap concurrent requests and fetches the bearer
/// token from its [`CredentialSource`] on every call.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    endpoint: String,
    credentials: Arc<dyn CredentialSource>,
    semaphore: Arc<Semaphore>,
}

impl HttpTransport {
    pub fn new(
        config: ProviderConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoint: config.endpoint,
            credentials,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }
}

impl FlightTransport for HttpTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, from: IataCode, to: IataCode) -> Result<RouteResponse, ProviderError> {
        let token = self.credentials.current_credential()?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ProviderError::Network("semaphore closed".to_string()))?;

        let url = format!("{}/v1/routes/{}/{}", self.base_url, from, to);
        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, body));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// Classify a non-success status.
fn map_status(status: StatusCode, body: String) -> ProviderError {
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        s if s.is_server_error() => ProviderError::Server {
            status: s.as_u16(),
            message,
        },
        s => ProviderError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticCredential;

    #[test]
    fn status_mapping() {
        assert_eq!(
            map_status(StatusCode::UNAUTHORIZED, String::new()),
            ProviderError::Unauthorized
        );
        assert_eq!(
            map_status(StatusCode::FORBIDDEN, String::new()),
            ProviderError::Unauthorized
        );
        assert_eq!(
            map_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            ProviderError::RateLimited
        );
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, "oops".into()),
            ProviderError::Server { status: 502, .. }
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_REQUEST, String::new()),
            ProviderError::Rejected { status: 400, .. }
        ));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let err = map_status(StatusCode::INTERNAL_SERVER_ERROR, "x".repeat(2000));
        let ProviderError::Server { message, .. } = err else {
            panic!("expected server error");
        };
        assert_eq!(message.len(), MAX_ERROR_BODY);
    }

    #[test]
    fn config_builders() {
        let config = ProviderConfig::new("https://pricing.example.com/")
            .with_endpoint("pricing")
            .with_max_concurrent(2);
        let transport =
            HttpTransport::new(config, Arc::new(StaticCredential::new("token"))).unwrap();
        assert_eq!(transport.endpoint(), "pricing");
        assert_eq!(transport.base_url, "https://pricing.example.com");
    }
}
