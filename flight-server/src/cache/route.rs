//! Route, negative, LKG and reference tiers over a [`KvStore`].

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::domain::Mode;
use crate::reference::{ReferenceError, ReferenceKey, ReferenceLookup, ReferenceRecord};
use crate::scoring::ScoredSolution;
use crate::telemetry::{Event, EventSink};

use super::config::CacheConfig;
use super::entry::{Freshness, LkgRing, LkgSnapshot, NegativeCacheEntry, RouteCacheEntry};
use super::key::RouteKey;
use super::store::{KvStore, StoreError};

/// Result of a route lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteLookup {
    Fresh(RouteCacheEntry),
    /// Expired but inside the stale-while-revalidate grace.
    Stale(RouteCacheEntry),
    Miss,
}

/// The cache store.
///
/// Owns the key scheme and value schema; the [`KvStore`] only moves bytes.
/// Reads take no locks. Writes for one route key are serialised through a
/// striped lock so the route entry and its LKG ring move together.
pub struct CacheStore<S> {
    kv: S,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    write_locks: Vec<Mutex<()>>,
}

impl<S: KvStore> CacheStore<S> {
    pub fn new(
        kv: S,
        config: CacheConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let write_locks = (0..config.write_stripes.max(1))
            .map(|_| Mutex::new(()))
            .collect();
        Self {
            kv,
            config,
            clock,
            events,
            write_locks,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    /// Build an entry for `key` stamped with the current time.
    pub fn new_entry(
        &self,
        key: &RouteKey,
        mode: Mode,
        journeys: Vec<ScoredSolution>,
        ttl: Duration,
        warmed: bool,
    ) -> RouteCacheEntry {
        let fetched_at = self.clock.now();
        RouteCacheEntry {
            from: key.from(),
            to: key.to(),
            mode,
            filter_hash: key.filter_hash().to_string(),
            schema_version: self.config.schema_version.clone(),
            journeys,
            fetched_at,
            ttl_expiry: fetched_at + to_chrono(ttl),
            warmed,
        }
    }

    /// Look up a route entry and classify its freshness.
    ///
    /// Backend and decode failures are logged and reported as a miss.
    pub async fn get(&self, key: &RouteKey) -> RouteLookup {
        let lookup = match self.read::<RouteCacheEntry>(key.as_str()).await {
            Some(entry) if entry.schema_version == self.config.schema_version => {
                match entry.freshness(self.clock.now(), to_chrono(self.config.swr_grace)) {
                    Freshness::Fresh => RouteLookup::Fresh(entry),
                    Freshness::Stale => RouteLookup::Stale(entry),
                    Freshness::Expired => RouteLookup::Miss,
                }
            }
            _ => RouteLookup::Miss,
        };

        let event = match &lookup {
            RouteLookup::Fresh(entry) | RouteLookup::Stale(entry) => Event::CacheHit {
                key: key.to_string(),
                stale: matches!(lookup, RouteLookup::Stale(_)),
                warmed: entry.warmed,
            },
            RouteLookup::Miss => Event::CacheMiss {
                key: key.to_string(),
            },
        };
        self.events.emit(&event);

        lookup
    }

    /// Write a route entry.
    ///
    /// Returns `false` when a newer entry (by `fetched_at`) is already
    /// stored, in which case nothing is written.
    pub async fn set(&self, key: &RouteKey, entry: &RouteCacheEntry) -> Result<bool, StoreError> {
        let _guard = self.stripe(key.as_str()).lock().await;
        self.write_route(key, entry).await
    }

    /// Write a route entry and push it onto the LKG ring as one step.
    ///
    /// The ring always receives the snapshot, even when a newer route
    /// entry wins the write.
    pub async fn commit(
        &self,
        key: &RouteKey,
        entry: &RouteCacheEntry,
    ) -> Result<bool, StoreError> {
        let _guard = self.stripe(key.as_str()).lock().await;
        let written = self.write_route(key, entry).await?;
        let snapshot = LkgSnapshot {
            entry: entry.clone(),
            captured_at: self.clock.now(),
        };
        self.write_lkg(key, snapshot).await?;
        Ok(written)
    }

    /// A live confirmed-empty marker for `key`, if any.
    pub async fn get_negative(&self, key: &RouteKey) -> Option<NegativeCacheEntry> {
        let entry = self
            .read::<NegativeCacheEntry>(&key.negative_key())
            .await
            .filter(|e| e.is_live(self.clock.now()))?;
        self.events.emit(&Event::NegativeHit {
            key: key.to_string(),
        });
        Some(entry)
    }

    /// Record that `key` yields no journeys.
    pub async fn set_negative(&self, key: &RouteKey) -> Result<(), StoreError> {
        let now = self.clock.now();
        let entry = NegativeCacheEntry {
            from: key.from(),
            to: key.to(),
            filter_hash: key.filter_hash().to_string(),
            recorded_at: now,
            expires_at: now + to_chrono(self.config.negative_ttl),
        };
        self.write(&key.negative_key(), &entry, self.config.negative_ttl)
            .await
    }

    /// Drop the confirmed-empty marker for `key`.
    pub async fn clear_negative(&self, key: &RouteKey) -> Result<(), StoreError> {
        self.kv.delete(&key.negative_key()).await
    }

    /// The most recent LKG snapshot for `key` and its age.
    pub async fn get_lkg(&self, key: &RouteKey) -> Option<(LkgSnapshot, chrono::Duration)> {
        let ring = self.read::<LkgRing>(&key.lkg_key()).await?;
        let latest = ring.latest()?.clone();
        let age = latest.age(self.clock.now());
        Some((latest, age))
    }

    /// Push a snapshot onto the LKG ring for `key`.
    pub async fn push_lkg(&self, key: &RouteKey, snapshot: LkgSnapshot) -> Result<(), StoreError> {
        let _guard = self.stripe(key.as_str()).lock().await;
        self.write_lkg(key, snapshot).await
    }

    /// Read-through lookup of reference data.
    ///
    /// Found records are cached for the reference TTL; "not found" is
    /// never cached.
    pub async fn get_reference<L: ReferenceLookup>(
        &self,
        lookup: &L,
        key: ReferenceKey,
    ) -> Result<Option<ReferenceRecord>, ReferenceError> {
        let cache_key = format!("ref:{key}");
        if let Some(record) = self.read::<ReferenceRecord>(&cache_key).await {
            return Ok(Some(record));
        }

        let record = lookup.lookup(key).await?;
        if let Some(record) = &record
            && let Err(e) = self
                .write(&cache_key, record, self.config.reference_ttl)
                .await
        {
            warn!(key = %cache_key, error = %e, "failed to cache reference record");
        }
        Ok(record)
    }

    async fn write_route(&self, key: &RouteKey, entry: &RouteCacheEntry) -> Result<bool, StoreError> {
        if let Some(existing) = self.read::<RouteCacheEntry>(key.as_str()).await
            && existing.fetched_at > entry.fetched_at
        {
            debug!(%key, "discarding route write older than stored entry");
            return Ok(false);
        }

        let remaining = (entry.ttl_expiry - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.write(key.as_str(), entry, remaining + self.config.swr_grace)
            .await?;
        Ok(true)
    }

    async fn write_lkg(&self, key: &RouteKey, snapshot: LkgSnapshot) -> Result<(), StoreError> {
        let lkg_key = key.lkg_key();
        let mut ring = self.read::<LkgRing>(&lkg_key).await.unwrap_or_default();
        ring.push(snapshot, self.config.effective_lkg_capacity());

        // Physical expiry outlives the staleness window measured from the newest snapshot.
        let ttl = self.config.lkg_max_staleness + self.config.route_ttl.ttl_for(key.from(), key.to());
        self.write(&lkg_key, &ring, ttl).await
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.kv.get(key).await {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!(%key, error = %e, "cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(%key, error = %e, "undecodable cache value; treating as miss");
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.kv.set(key, bytes, ttl).await
    }

    fn stripe(&self, key: &str) -> &Mutex<()> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.write_locks.len() as u64) as usize;
        &self.write_locks[index]
    }
}

impl RouteLookup {
    /// Timestamp of the entry a lookup returned, if any.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RouteLookup::Fresh(e) | RouteLookup::Stale(e) => Some(e.fetched_at),
            RouteLookup::Miss => None,
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal::Decimal;

    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::{
        Airline, AirlineCode, Airport, FilterCriteria, FlightSegment, IataCode, Journey, SegmentId,
    };
    use crate::scoring::{NormalizationContext, ReferencePercentiles, score};
    use crate::telemetry::MemorySink;

    use super::super::store::MokaStore;

    fn code(s: &str) -> IataCode {
        IataCode::parse(s).unwrap()
    }

    fn key(version: &str) -> RouteKey {
        RouteKey::new(
            code("JFK"),
            code("LAX"),
            version,
            Mode::Cheapest,
            &FilterCriteria::default(),
        )
    }

    fn solutions() -> Vec<ScoredSolution> {
        let segment = FlightSegment::new(
            SegmentId::new("AA1").unwrap(),
            AirlineCode::parse("AA").unwrap(),
            code("JFK"),
            code("LAX"),
            Decimal::new(29950, 2),
        )
        .unwrap();
        let journey = Journey::new(vec![segment]).unwrap();
        score(
            &[journey],
            Mode::Cheapest,
            &FilterCriteria::default(),
            &NormalizationContext::cold(ReferencePercentiles::default()),
        )
    }

    struct Fixture {
        kv: MokaStore,
        clock: ManualClock,
        events: Arc<MemorySink>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                kv: MokaStore::new(100),
                clock: ManualClock::default(),
                events: Arc::new(MemorySink::default()),
            }
        }

        fn store(&self, config: CacheConfig) -> CacheStore<MokaStore> {
            CacheStore::new(
                self.kv.clone(),
                config,
                Arc::new(self.clock.clone()),
                self.events.clone(),
            )
        }
    }

    const TTL: Duration = Duration::from_secs(15 * 60);

    #[tokio::test]
    async fn fresh_then_stale_then_miss() {
        let fx = Fixture::new();
        let cache = fx.store(CacheConfig::default());
        let k = key("v1");

        assert_eq!(cache.get(&k).await, RouteLookup::Miss);

        let entry = cache.new_entry(&k, Mode::Cheapest, solutions(), TTL, false);
        assert!(cache.set(&k, &entry).await.unwrap());
        assert!(matches!(cache.get(&k).await, RouteLookup::Fresh(_)));

        fx.clock.advance(chrono::Duration::minutes(16));
        assert!(matches!(cache.get(&k).await, RouteLookup::Stale(_)));

        fx.clock.advance(chrono::Duration::minutes(5));
        assert_eq!(cache.get(&k).await, RouteLookup::Miss);

        assert_eq!(
            fx.events.count(|e| matches!(e, Event::CacheHit { stale: true, .. })),
            1
        );
        assert_eq!(fx.events.count(|e| matches!(e, Event::CacheMiss { .. })), 2);
    }

    #[tokio::test]
    async fn older_write_loses() {
        let fx = Fixture::new();
        let cache = fx.store(CacheConfig::default());
        let k = key("v1");

        let older = cache.new_entry(&k, Mode::Cheapest, solutions(), TTL, false);
        fx.clock.advance(chrono::Duration::seconds(10));
        let newer = cache.new_entry(&k, Mode::Cheapest, solutions(), TTL, true);

        assert!(cache.set(&k, &newer).await.unwrap());
        assert!(!cache.set(&k, &older).await.unwrap());

        let RouteLookup::Fresh(stored) = cache.get(&k).await else {
            panic!("expected fresh entry");
        };
        assert_eq!(stored.fetched_at, newer.fetched_at);
        assert!(stored.warmed);
    }

    #[tokio::test]
    async fn schema_bump_hides_old_entries() {
        let fx = Fixture::new();
        let v1 = fx.store(CacheConfig::default());
        let entry = v1.new_entry(&key("v1"), Mode::Cheapest, solutions(), TTL, false);
        v1.set(&key("v1"), &entry).await.unwrap();

        let v2 = fx.store(CacheConfig::default().with_schema_version("v2"));
        assert_eq!(v2.get(&key("v2")).await, RouteLookup::Miss);
        assert!(fx.kv.get(key("v1").as_str()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn negative_entries_expire_logically() {
        let fx = Fixture::new();
        let cache = fx.store(CacheConfig::default());
        let k = key("v1");

        assert!(cache.get_negative(&k).await.is_none());
        cache.set_negative(&k).await.unwrap();
        assert!(cache.get_negative(&k).await.is_some());

        fx.clock.advance(chrono::Duration::minutes(5));
        assert!(cache.get_negative(&k).await.is_none());
        assert_eq!(fx.events.count(|e| matches!(e, Event::NegativeHit { .. })), 1);
    }

    #[tokio::test]
    async fn commit_updates_lkg_ring() {
        let fx = Fixture::new();
        let cache = fx.store(CacheConfig::default().with_lkg_capacity(2));
        let k = key("v1");

        for _ in 0..3 {
            let entry = cache.new_entry(&k, Mode::Cheapest, solutions(), TTL, false);
            cache.commit(&k, &entry).await.unwrap();
            fx.clock.advance(chrono::Duration::minutes(1));
        }

        let (latest, age) = cache.get_lkg(&k).await.unwrap();
        assert_eq!(age, chrono::Duration::minutes(1));
        assert_eq!(latest.entry.fetched_at, fx.clock.now() - chrono::Duration::minutes(1));

        let bytes = fx.kv.get(&k.lkg_key()).await.unwrap().unwrap();
        let ring: LkgRing = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(ring.len(), 2);
    }

    #[tokio::test]
    async fn undecodable_value_is_a_miss() {
        let fx = Fixture::new();
        let cache = fx.store(CacheConfig::default());
        let k = key("v1");
        fx.kv
            .set(k.as_str(), b"not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get(&k).await, RouteLookup::Miss);
    }

    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl ReferenceLookup for CountingLookup {
        async fn airport(&self, code: IataCode) -> Result<Option<Airport>, ReferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((code.as_str() == "JFK").then(|| Airport {
                code,
                name: "John F. Kennedy International".into(),
                city: None,
                country: None,
            }))
        }

        async fn airline(&self, _code: AirlineCode) -> Result<Option<Airline>, ReferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn reference_reads_through_and_skips_not_found() {
        let fx = Fixture::new();
        let cache = fx.store(CacheConfig::default());
        let lookup = CountingLookup {
            calls: AtomicUsize::new(0),
        };

        for _ in 0..3 {
            let found = cache
                .get_reference(&lookup, ReferenceKey::Airport(code("JFK")))
                .await
                .unwrap();
            assert!(matches!(found, Some(ReferenceRecord::Airport(_))));
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);

        for _ in 0..2 {
            let missing = cache
                .get_reference(&lookup, ReferenceKey::Airport(code("ZZZ")))
                .await
                .unwrap();
            assert!(missing.is_none());
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }
}
