//! Application configuration from the environment.
//!
//! Every variable is optional; anything unset keeps the component's own
//! default. Values that are set but malformed are errors rather than being
//! silently ignored.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheConfig, RouteTtlPolicy};
use crate::orchestrator::{OrchestratorConfig, WarmerConfig};
use crate::provider::{BreakerConfig, ProviderConfig, RetryPolicy};
use crate::reference::{ReferenceClientConfig, SnapshotConfig};
use crate::web::QuotaConfig;

/// Variable holding the upstream bearer token, read on every call.
pub const PROVIDER_TOKEN_VAR: &str = "PROVIDER_TOKEN";

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_PROVIDER_URL: &str = "https://api.flightpricing.example";

/// How often reference data is refreshed.
pub const REFERENCE_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Where upstream results come from.
#[derive(Debug, Clone)]
pub enum UpstreamConfig {
    /// The real pricing API, authenticated from [`PROVIDER_TOKEN_VAR`].
    Http(ProviderConfig),
    /// Canned `{FROM}-{TO}.json` files, for running without credentials.
    Fixtures(PathBuf),
}

/// Everything the binary needs to wire the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub upstream: UpstreamConfig,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub orchestrator: OrchestratorConfig,
    pub warmer: WarmerConfig,
    pub quota: QuotaConfig,
    /// Reference API; without it reference data comes only from the snapshot.
    pub reference: Option<ReferenceClientConfig>,
    pub snapshot: SnapshotConfig,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        let listen_addr = vars
            .parsed::<SocketAddr>("LISTEN_ADDR")?
            .map_or_else(|| parse_value("LISTEN_ADDR", DEFAULT_LISTEN_ADDR), Ok)?;

        let upstream = match vars.text("FIXTURE_DIR") {
            Some(dir) => UpstreamConfig::Fixtures(PathBuf::from(dir)),
            None => UpstreamConfig::Http(ProviderConfig::new(
                vars.text("PROVIDER_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string()),
            )),
        };

        let mut cache = CacheConfig::default();
        if let Some(version) = vars.text("CACHE_SCHEMA_VERSION") {
            cache = cache.with_schema_version(version);
        }
        if let Some(ttl) = vars.secs("ROUTE_TTL_SECS")? {
            cache = cache.with_route_ttl(RouteTtlPolicy::new(ttl));
        }
        if let Some(grace) = vars.secs("SWR_GRACE_SECS")? {
            cache = cache.with_swr_grace(grace);
        }
        if let Some(ttl) = vars.secs("NEGATIVE_TTL_SECS")? {
            cache = cache.with_negative_ttl(ttl);
        }
        if let Some(ttl) = vars.secs("WARM_TTL_SECS")? {
            cache = cache.with_warm_ttl(ttl);
        }

        let mut orchestrator = OrchestratorConfig::default();
        if let Some(ms) = vars.parsed::<u64>("REQUEST_DEADLINE_MS")? {
            orchestrator = orchestrator.with_request_deadline(Duration::from_millis(ms));
        }

        let mut quota = QuotaConfig::default();
        if let Some(limit) = vars.parsed::<u32>("QUOTA_PER_MINUTE")? {
            quota = quota.with_limit(limit);
        }

        let reference = vars.text("REFERENCE_BASE_URL").map(|url| {
            let config = ReferenceClientConfig::new(url);
            match vars.text("REFERENCE_API_KEY") {
                Some(key) => config.with_api_key(key),
                None => config,
            }
        });

        let snapshot = vars
            .text("REFERENCE_SNAPSHOT")
            .map(SnapshotConfig::new)
            .unwrap_or_default();

        Ok(Self {
            listen_addr,
            upstream,
            retry: RetryPolicy::default(),
            breaker: BreakerConfig::default(),
            cache,
            orchestrator,
            warmer: WarmerConfig::default(),
            quota,
            reference,
            snapshot,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// A set, non-blank variable.
    fn text(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr>(&self, name: &'static str) -> Result<Option<T>, ConfigError> {
        self.text(name)
            .map(|value| parse_value(name, &value))
            .transpose()
    }

    fn secs(&self, name: &'static str) -> Result<Option<Duration>, ConfigError> {
        Ok(self.parsed::<u64>(name)?.map(Duration::from_secs))
    }
}

fn parse_value<T: FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:3000".parse().unwrap());
        assert!(matches!(
            &config.upstream,
            UpstreamConfig::Http(p) if p.base_url == DEFAULT_PROVIDER_URL
        ));
        assert_eq!(config.cache.schema_version, "v1");
        assert_eq!(config.orchestrator.request_deadline, Duration::from_millis(2000));
        assert_eq!(config.quota.limit, QuotaConfig::default().limit);
        assert!(config.reference.is_none());
        assert_eq!(config.snapshot.path, PathBuf::from("reference_snapshot.json"));
    }

    #[test]
    fn variables_override_defaults() {
        let config = config(&[
            ("LISTEN_ADDR", "0.0.0.0:8080"),
            ("FIXTURE_DIR", "data/fixtures"),
            ("CACHE_SCHEMA_VERSION", "v7"),
            ("ROUTE_TTL_SECS", "1200"),
            ("SWR_GRACE_SECS", "60"),
            ("NEGATIVE_TTL_SECS", "120"),
            ("WARM_TTL_SECS", "1800"),
            ("REQUEST_DEADLINE_MS", "1500"),
            ("QUOTA_PER_MINUTE", "10"),
            ("REFERENCE_BASE_URL", "https://ref.example"),
            ("REFERENCE_API_KEY", "secret"),
            ("REFERENCE_SNAPSHOT", "/tmp/ref.json"),
        ])
        .unwrap();

        assert_eq!(config.listen_addr.port(), 8080);
        assert!(matches!(
            &config.upstream,
            UpstreamConfig::Fixtures(dir) if dir == &PathBuf::from("data/fixtures")
        ));
        assert_eq!(config.cache.schema_version, "v7");
        assert_eq!(config.cache.swr_grace, Duration::from_secs(60));
        assert_eq!(config.cache.negative_ttl, Duration::from_secs(120));
        assert_eq!(config.cache.warm_ttl, Duration::from_secs(1800));
        assert_eq!(config.orchestrator.request_deadline, Duration::from_millis(1500));
        assert_eq!(config.quota.limit, 10);
        let reference = config.reference.unwrap();
        assert_eq!(reference.base_url, "https://ref.example");
        assert_eq!(reference.api_key.as_deref(), Some("secret"));
        assert_eq!(config.snapshot.path, PathBuf::from("/tmp/ref.json"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config(&[("FIXTURE_DIR", "  "), ("ROUTE_TTL_SECS", "")]).unwrap();
        assert!(matches!(config.upstream, UpstreamConfig::Http(_)));
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_eq!(
            config(&[("ROUTE_TTL_SECS", "fifteen")]).unwrap_err(),
            ConfigError::Invalid {
                name: "ROUTE_TTL_SECS",
                value: "fifteen".to_string(),
            }
        );
        assert!(config(&[("LISTEN_ADDR", "localhost")]).is_err());
        assert!(config(&[("QUOTA_PER_MINUTE", "-1")]).is_err());
    }
}
