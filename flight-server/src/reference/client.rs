//! Reference data HTTP client.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use super::error::ReferenceError;

/// Minimal DTO for airport data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AirportDto {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Minimal DTO for airline data.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AirlineDto {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct AirportsResponse {
    airports: Vec<AirportDto>,
}

#[derive(Debug, Deserialize)]
struct AirlinesResponse {
    airlines: Vec<AirlineDto>,
}

/// Configuration for the reference data client.
#[derive(Debug, Clone)]
pub struct ReferenceClientConfig {
    /// API key for x-apikey header authentication (optional)
    pub api_key: Option<String>,
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ReferenceClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Client for the reference data service.
#[derive(Debug, Clone)]
pub struct ReferenceClient {
    http: reqwest::Client,
    base_url: String,
}

impl ReferenceClient {
    pub fn new(config: ReferenceClientConfig) -> Result<Self, ReferenceError> {
        let mut headers = HeaderMap::new();

        if let Some(key) = &config.api_key {
            let value = HeaderValue::from_str(key).map_err(|_| ReferenceError::Api {
                status: 0,
                message: "Invalid API key format".to_string(),
            })?;
            headers.insert(HeaderName::from_static("x-apikey"), value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch all airports.
    pub async fn fetch_airports(&self) -> Result<Vec<AirportDto>, ReferenceError> {
        let body = self.get_body("airports").await?;
        let response: AirportsResponse =
            serde_json::from_str(&body).map_err(|e| ReferenceError::Json {
                message: e.to_string(),
            })?;
        Ok(response.airports)
    }

    /// Fetch all airlines.
    pub async fn fetch_airlines(&self) -> Result<Vec<AirlineDto>, ReferenceError> {
        let body = self.get_body("airlines").await?;
        let response: AirlinesResponse =
            serde_json::from_str(&body).map_err(|e| ReferenceError::Json {
                message: e.to_string(),
            })?;
        Ok(response.airlines)
    }

    async fn get_body(&self, path: &str) -> Result<String, ReferenceError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ReferenceError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReferenceError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response.text().await?)
    }
}
