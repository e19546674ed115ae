//! Cache tier configuration.

use std::collections::HashMap;
use std::time::Duration;

use crate::domain::IataCode;

/// Shortest route-result TTL a policy may hand out.
pub const MIN_ROUTE_TTL: Duration = Duration::from_secs(10 * 60);

/// Longest route-result TTL a policy may hand out.
pub const MAX_ROUTE_TTL: Duration = Duration::from_secs(30 * 60);

/// Maximum snapshots retained per route in the LKG ring.
pub const MAX_LKG_CAPACITY: usize = 3;

/// Route-result TTL, tunable per route volatility.
#[derive(Debug, Clone)]
pub struct RouteTtlPolicy {
    default: Duration,
    overrides: HashMap<(IataCode, IataCode), Duration>,
}

impl RouteTtlPolicy {
    pub fn new(default: Duration) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Use a different TTL for one direction of one route.
    pub fn with_override(mut self, from: IataCode, to: IataCode, ttl: Duration) -> Self {
        self.overrides.insert((from, to), ttl);
        self
    }

    /// TTL for a route, clamped to 10–30 minutes.
    pub fn ttl_for(&self, from: IataCode, to: IataCode) -> Duration {
        self.overrides
            .get(&(from, to))
            .copied()
            .unwrap_or(self.default)
            .clamp(MIN_ROUTE_TTL, MAX_ROUTE_TTL)
    }
}

impl Default for RouteTtlPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60))
    }
}

/// Configuration for the cache store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Version token embedded in every route key.
    pub schema_version: String,

    /// Nominal lifetime of route results.
    pub route_ttl: RouteTtlPolicy,

    /// How long an expired route entry stays serveable while it refreshes.
    pub swr_grace: Duration,

    /// Lifetime of confirmed-empty markers.
    pub negative_ttl: Duration,

    /// Lifetime of entries written by the prefetch warmer.
    pub warm_ttl: Duration,

    /// Lifetime of reference (airport/airline) entries.
    pub reference_ttl: Duration,

    /// Snapshots retained per route (1–3).
    pub lkg_capacity: usize,

    /// Age beyond which an LKG snapshot is unusable.
    pub lkg_max_staleness: Duration,

    /// Maximum entries in the in-process store.
    pub max_capacity: u64,

    /// Number of write-lock stripes.
    pub write_stripes: usize,
}

impl CacheConfig {
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = version.into();
        self
    }

    pub fn with_route_ttl(mut self, policy: RouteTtlPolicy) -> Self {
        self.route_ttl = policy;
        self
    }

    pub fn with_swr_grace(mut self, grace: Duration) -> Self {
        self.swr_grace = grace;
        self
    }

    pub fn with_negative_ttl(mut self, ttl: Duration) -> Self {
        self.negative_ttl = ttl;
        self
    }

    pub fn with_warm_ttl(mut self, ttl: Duration) -> Self {
        self.warm_ttl = ttl;
        self
    }

    pub fn with_lkg_capacity(mut self, capacity: usize) -> Self {
        self.lkg_capacity = capacity;
        self
    }

    pub fn with_lkg_max_staleness(mut self, staleness: Duration) -> Self {
        self.lkg_max_staleness = staleness;
        self
    }

    pub fn with_reference_ttl(mut self, ttl: Duration) -> Self {
        self.reference_ttl = ttl;
        self
    }

    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// LKG capacity clamped to 1–3.
    pub fn effective_lkg_capacity(&self) -> usize {
        self.lkg_capacity.clamp(1, MAX_LKG_CAPACITY)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            schema_version: "v1".to_string(),
            route_ttl: RouteTtlPolicy::default(),
            swr_grace: Duration::from_secs(5 * 60),
            negative_ttl: Duration::from_secs(5 * 60),
            warm_ttl: Duration::from_secs(30 * 60),
            reference_ttl: Duration::from_secs(24 * 60 * 60),
            lkg_capacity: MAX_LKG_CAPACITY,
            lkg_max_staleness: Duration::from_secs(30 * 60),
            max_capacity: 10_000,
            write_stripes: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iata(s: &str) -> IataCode {
        IataCode::parse(s).unwrap()
    }

    #[test]
    fn default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.schema_version, "v1");
        assert_eq!(config.swr_grace, Duration::from_secs(300));
        assert_eq!(config.negative_ttl, Duration::from_secs(300));
        assert_eq!(config.reference_ttl, Duration::from_secs(86_400));
        assert_eq!(config.lkg_max_staleness, Duration::from_secs(1_800));
        assert_eq!(config.effective_lkg_capacity(), 3);
    }

    #[test]
    fn lkg_capacity_is_clamped() {
        assert_eq!(
            CacheConfig::default()
                .with_lkg_capacity(0)
                .effective_lkg_capacity(),
            1
        );
        assert_eq!(
            CacheConfig::default()
                .with_lkg_capacity(10)
                .effective_lkg_capacity(),
            3
        );
    }

    #[test]
    fn route_ttl_overrides_and_clamps() {
        let policy = RouteTtlPolicy::default()
            .with_override(iata("JFK"), iata("LAX"), Duration::from_secs(25 * 60))
            .with_override(iata("SFO"), iata("SEA"), Duration::from_secs(60))
            .with_override(iata("ORD"), iata("DEN"), Duration::from_secs(3 * 60 * 60));

        assert_eq!(
            policy.ttl_for(iata("JFK"), iata("LAX")),
            Duration::from_secs(25 * 60)
        );
        assert_eq!(policy.ttl_for(iata("LAX"), iata("JFK")), Duration::from_secs(15 * 60));
        assert_eq!(policy.ttl_for(iata("SFO"), iata("SEA")), MIN_ROUTE_TTL);
        assert_eq!(policy.ttl_for(iata("ORD"), iata("DEN")), MAX_ROUTE_TTL);
    }
}
