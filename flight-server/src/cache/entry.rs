//! Cached value schemas.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{IataCode, Mode};
use crate::scoring::ScoredSolution;

/// Ranked result for one route key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteCacheEntry {
    pub from: IataCode,
    pub to: IataCode,
    pub mode: Mode,
    pub filter_hash: String,
    pub schema_version: String,
    /// Ranked best-first; never empty.
    pub journeys: Vec<ScoredSolution>,
    pub fetched_at: DateTime<Utc>,
    pub ttl_expiry: DateTime<Utc>,
    /// Written by the prefetch warmer rather than a caller's miss.
    #[serde(default)]
    pub warmed: bool,
}

/// How usable a route entry is at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    /// Past expiry but inside the stale-while-revalidate grace.
    Stale,
    Expired,
}

impl RouteCacheEntry {
    pub fn freshness(&self, now: DateTime<Utc>, swr_grace: Duration) -> Freshness {
        if now < self.ttl_expiry {
            Freshness::Fresh
        } else if now < self.ttl_expiry + swr_grace {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).max(Duration::zero())
    }

    /// The same result re-stamped as warmer output with `ttl` from `fetched_at`.
    pub fn into_warmed(self, ttl: Duration) -> Self {
        Self {
            ttl_expiry: self.fetched_at + ttl,
            warmed: true,
            ..self
        }
    }
}

/// Marker for a (route, criteria) pair that yielded nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeCacheEntry {
    pub from: IataCode,
    pub to: IataCode,
    pub filter_hash: String,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NegativeCacheEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// A retained successful result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LkgSnapshot {
    pub entry: RouteCacheEntry,
    pub captured_at: DateTime<Utc>,
}

impl LkgSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.entry.fetched_at).max(Duration::zero())
    }
}

/// Bounded ring of snapshots, oldest first by `fetched_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LkgRing {
    snapshots: VecDeque<LkgSnapshot>,
}

impl LkgRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a snapshot, evicting the oldest beyond `capacity`.
    ///
    /// A snapshot older than everything retained in a full ring is the one
    /// evicted, so out-of-order writers never displace newer data.
    pub fn push(&mut self, snapshot: LkgSnapshot, capacity: usize) {
        let at = self
            .snapshots
            .iter()
            .position(|s| s.entry.fetched_at > snapshot.entry.fetched_at)
            .unwrap_or(self.snapshots.len());
        self.snapshots.insert(at, snapshot);
        while self.snapshots.len() > capacity.max(1) {
            self.snapshots.pop_front();
        }
    }

    /// The most recent snapshot.
    pub fn latest(&self) -> Option<&LkgSnapshot> {
        self.snapshots.back()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LkgSnapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fetched_at: DateTime<Utc>, ttl_mins: i64) -> RouteCacheEntry {
        RouteCacheEntry {
            from: IataCode::parse("JFK").unwrap(),
            to: IataCode::parse("LAX").unwrap(),
            mode: Mode::Cheapest,
            filter_hash: "h".into(),
            schema_version: "v1".into(),
            journeys: Vec::new(),
            fetched_at,
            ttl_expiry: fetched_at + Duration::minutes(ttl_mins),
            warmed: false,
        }
    }

    fn snapshot(fetched_at: DateTime<Utc>) -> LkgSnapshot {
        LkgSnapshot {
            entry: entry(fetched_at, 15),
            captured_at: fetched_at,
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
    }

    #[test]
    fn into_warmed_keeps_fetch_time() {
        let warmed = entry(t0(), 15).into_warmed(Duration::minutes(30));
        assert!(warmed.warmed);
        assert_eq!(warmed.fetched_at, t0());
        assert_eq!(warmed.ttl_expiry, t0() + Duration::minutes(30));
    }

    #[test]
    fn freshness_boundaries() {
        let e = entry(t0(), 15);
        let grace = Duration::minutes(5);
        assert_eq!(e.freshness(t0(), grace), Freshness::Fresh);
        assert_eq!(
            e.freshness(t0() + Duration::minutes(15), grace),
            Freshness::Stale
        );
        assert_eq!(
            e.freshness(t0() + Duration::minutes(19), grace),
            Freshness::Stale
        );
        assert_eq!(
            e.freshness(t0() + Duration::minutes(20), grace),
            Freshness::Expired
        );
    }

    #[test]
    fn negative_entry_expiry() {
        let neg = NegativeCacheEntry {
            from: IataCode::parse("AAA").unwrap(),
            to: IataCode::parse("BBB").unwrap(),
            filter_hash: "h".into(),
            recorded_at: t0(),
            expires_at: t0() + Duration::minutes(5),
        };
        assert!(neg.is_live(t0() + Duration::minutes(4)));
        assert!(!neg.is_live(t0() + Duration::minutes(5)));
    }

    #[test]
    fn ring_evicts_oldest() {
        let mut ring = LkgRing::new();
        for m in 0..4 {
            ring.push(snapshot(t0() + Duration::minutes(m)), 3);
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(
            ring.iter().next().unwrap().entry.fetched_at,
            t0() + Duration::minutes(1)
        );
        assert_eq!(
            ring.latest().unwrap().entry.fetched_at,
            t0() + Duration::minutes(3)
        );
    }

    #[test]
    fn out_of_order_push_keeps_latest() {
        let mut ring = LkgRing::new();
        ring.push(snapshot(t0() + Duration::minutes(10)), 2);
        ring.push(snapshot(t0() + Duration::minutes(20)), 2);
        ring.push(snapshot(t0() + Duration::minutes(5)), 2);

        assert_eq!(ring.len(), 2);
        assert_eq!(
            ring.latest().unwrap().entry.fetched_at,
            t0() + Duration::minutes(20)
        );
        assert!(ring.iter().all(|s| s.entry.fetched_at >= t0() + Duration::minutes(10)));
    }

    #[test]
    fn capacity_one_keeps_single_snapshot() {
        let mut ring = LkgRing::new();
        ring.push(snapshot(t0()), 1);
        ring.push(snapshot(t0() + Duration::minutes(1)), 1);
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn ring_serializes_as_array() {
        let mut ring = LkgRing::new();
        ring.push(snapshot(t0()), 3);
        let json = serde_json::to_string(&ring).unwrap();
        assert!(json.starts_with('['));
        let back: LkgRing = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ring);
    }
}
