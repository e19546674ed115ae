//! Fixture transport for development without upstream credentials.
//!
//! Loads canned route responses from JSON files and serves them as if they
//! were live API responses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::domain::IataCode;

use super::error::ProviderError;
use super::transport::FlightTransport;
use super::types::RouteResponse;

/// Serves route responses from `{FROM}-{TO}.json` files.
///
/// A route with no file answers with zero journeys.
#[derive(Debug, Clone)]
pub struct FixtureTransport {
    routes: Arc<HashMap<(IataCode, IataCode), RouteResponse>>,
}

impl FixtureTransport {
    /// Load every `{FROM}-{TO}.json` file in a directory.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let data_dir = data_dir.as_ref();
        let mut routes = HashMap::new();

        let entries = std::fs::read_dir(data_dir).map_err(|e| {
            ProviderError::Decode(format!("failed to read fixture directory {data_dir:?}: {e}"))
        })?;

        for entry in entries {
            let path = entry
                .map_err(|e| ProviderError::Decode(format!("failed to read directory entry: {e}")))?
                .path();
            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let Some((from, to)) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(parse_route_stem)
            else {
                continue;
            };

            let json = std::fs::read_to_string(&path)
                .map_err(|e| ProviderError::Decode(format!("failed to read {path:?}: {e}")))?;
            let response: RouteResponse = serde_json::from_str(&json)
                .map_err(|e| ProviderError::Decode(format!("failed to parse {path:?}: {e}")))?;

            routes.insert((from, to), response);
        }

        if routes.is_empty() {
            return Err(ProviderError::Decode(format!(
                "no fixture files found in {data_dir:?}"
            )));
        }

        Ok(Self {
            routes: Arc::new(routes),
        })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

/// Parse `JFK-LAX` into a route pair.
fn parse_route_stem(stem: &str) -> Option<(IataCode, IataCode)> {
    let (from, to) = stem.split_once('-')?;
    Some((
        IataCode::parse_normalized(from).ok()?,
        IataCode::parse_normalized(to).ok()?,
    ))
}

impl FlightTransport for FixtureTransport {
    fn endpoint(&self) -> &str {
        "fixtures"
    }

    async fn call(&self, from: IataCode, to: IataCode) -> Result<RouteResponse, ProviderError> {
        Ok(self.routes.get(&(from, to)).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BODY: &str = r#"{"journeys":[{"segments":[
        {"id":"B6-23","airline":"B6","from":"JFK","to":"LAX","price":"299.50"}
    ]}]}"#;

    fn code(s: &str) -> IataCode {
        IataCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn serves_loaded_routes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("JFK-LAX.json"), BODY).unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let transport = FixtureTransport::new(dir.path()).unwrap();
        assert_eq!(transport.route_count(), 1);

        let response = transport.call(code("JFK"), code("LAX")).await.unwrap();
        assert_eq!(response.journeys.len(), 1);

        let empty = transport.call(code("LAX"), code("JFK")).await.unwrap();
        assert!(empty.journeys.is_empty());
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(FixtureTransport::new(dir.path()).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("JFK-LAX.json"), "{not json").unwrap();
        assert!(matches!(
            FixtureTransport::new(dir.path()),
            Err(ProviderError::Decode(_))
        ));
    }

    #[test]
    fn route_stem_parsing() {
        assert_eq!(parse_route_stem("jfk-lax"), Some((code("JFK"), code("LAX"))));
        assert_eq!(parse_route_stem("JFKLAX"), None);
        assert_eq!(parse_route_stem("JF-LAX"), None);
    }
}
