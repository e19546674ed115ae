//! Cache key scheme.
//!
//! Route keys embed a schema-version token, so bumping the version
//! invalidates every older entry without a sweep: old keys simply stop
//! being looked up.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::domain::{FilterCriteria, IataCode, Mode};

/// Versioned key for one (route, mode, filters) combination.
///
/// Format: `route:{from}:{to}:{schema_version}:{hash(mode, filters)}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    from: IataCode,
    to: IataCode,
    filter_hash: String,
    key: String,
}

impl RouteKey {
    pub fn new(
        from: IataCode,
        to: IataCode,
        schema_version: &str,
        mode: Mode,
        filters: &FilterCriteria,
    ) -> Self {
        let filter_hash = criteria_hash(mode, filters);
        let key = format!("route:{from}:{to}:{schema_version}:{filter_hash}");
        Self {
            from,
            to,
            filter_hash,
            key,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn from(&self) -> IataCode {
        self.from
    }

    pub fn to(&self) -> IataCode {
        self.to
    }

    pub fn filter_hash(&self) -> &str {
        &self.filter_hash
    }

    /// Key of the negative-cache marker for this route key.
    pub fn negative_key(&self) -> String {
        format!("neg:{}", self.key)
    }

    /// Key of the last-known-good ring for this route key.
    pub fn lkg_key(&self) -> String {
        format!("lkg:{}", self.key)
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Stable hash of the ranking criteria (16 hex chars).
pub fn criteria_hash(mode: Mode, filters: &FilterCriteria) -> String {
    let mut hasher = Sha256::new();
    hasher.update(mode.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(filters.canonical().as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AirlineCode;

    fn iata(s: &str) -> IataCode {
        IataCode::parse(s).unwrap()
    }

    #[test]
    fn key_layout() {
        let key = RouteKey::new(
            iata("JFK"),
            iata("LAX"),
            "v1",
            Mode::Cheapest,
            &FilterCriteria::default(),
        );
        let parts: Vec<&str> = key.as_str().split(':').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(&parts[..4], &["route", "JFK", "LAX", "v1"]);
        assert_eq!(parts[4], key.filter_hash());
        assert_eq!(parts[4].len(), 16);
        assert_eq!(key.negative_key(), format!("neg:{}", key.as_str()));
        assert_eq!(key.lkg_key(), format!("lkg:{}", key.as_str()));
    }

    #[test]
    fn schema_version_changes_key() {
        let filters = FilterCriteria::default();
        let v1 = RouteKey::new(iata("JFK"), iata("LAX"), "v1", Mode::Cheapest, &filters);
        let v2 = RouteKey::new(iata("JFK"), iata("LAX"), "v2", Mode::Cheapest, &filters);
        assert_ne!(v1, v2);
        assert_eq!(v1.filter_hash(), v2.filter_hash());
    }

    #[test]
    fn mode_and_filters_change_hash() {
        let base = FilterCriteria::default();
        let stops = FilterCriteria::default().with_max_stops(0);
        let airline = FilterCriteria::default().deny(AirlineCode::parse("AA").unwrap());

        let hashes = [
            criteria_hash(Mode::Cheapest, &base),
            criteria_hash(Mode::FewestStops, &base),
            criteria_hash(Mode::Cheapest, &stops),
            criteria_hash(Mode::Cheapest, &airline),
        ];
        for i in 0..hashes.len() {
            for j in (i + 1)..hashes.len() {
                assert_ne!(hashes[i], hashes[j]);
            }
        }
    }

    #[test]
    fn direction_matters() {
        let filters = FilterCriteria::default();
        let out = RouteKey::new(iata("JFK"), iata("LAX"), "v1", Mode::Cheapest, &filters);
        let back = RouteKey::new(iata("LAX"), iata("JFK"), "v1", Mode::Cheapest, &filters);
        assert_ne!(out, back);
    }
}
