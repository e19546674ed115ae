//! The end-to-end best-flight lookup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::cache::{CacheStore, KvStore, RouteCacheEntry, RouteKey, RouteLookup};
use crate::clock::Clock;
use crate::coalesce::Coalescer;
use crate::domain::{FilterCriteria, IataCode, Mode};
use crate::provider::{FlightTransport, ProviderAdapter, RouteResponse, convert_route_response};
use crate::reference::{ReferenceKey, ReferenceLookup};
use crate::scoring::{Calibration, ScoredSolution, score, split_best};
use crate::telemetry::{Event, EventSink};

use super::config::OrchestratorConfig;
use super::error::QueryError;

/// A validated best-flight query.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightQuery {
    pub from: IataCode,
    pub to: IataCode,
    pub mode: Mode,
    pub filters: FilterCriteria,
}

impl FlightQuery {
    pub fn new(from: IataCode, to: IataCode) -> Self {
        Self {
            from,
            to,
            mode: Mode::default(),
            filters: FilterCriteria::default(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_filters(mut self, filters: FilterCriteria) -> Self {
        self.filters = filters;
        self
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.from == self.to {
            return Err(QueryError::Validation(
                "origin and destination must differ".to_string(),
            ));
        }
        self.filters.validate()?;
        Ok(())
    }
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    Live,
    Cache,
    CacheFallback,
}

/// How an answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Provenance {
    pub source: Source,
    pub fetched_at: DateTime<Utc>,
    pub cache_age_secs: i64,
    /// Served from a last-known-good snapshot during an upstream failure.
    pub degraded: bool,
    /// Entry was written by the prefetch warmer.
    pub warmed: bool,
}

/// The best journey, its ranked alternatives and their provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightAnswer {
    pub best: ScoredSolution,
    pub alternatives: Vec<ScoredSolution>,
    pub provenance: Provenance,
}

/// Result of one shared fetch.
#[derive(Debug, Clone)]
pub(crate) enum Fetched {
    Entry(Arc<RouteCacheEntry>),
    Empty,
}

pub(crate) type FetchResult = Result<Fetched, QueryError>;

/// How a shared fetch writes its result.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WriteMode {
    pub ttl: Duration,
    pub warmed: bool,
}

struct Inner<T, S, R> {
    adapter: ProviderAdapter<T>,
    cache: CacheStore<S>,
    reference: R,
    coalescer: Coalescer<FetchResult>,
    calibration: Calibration,
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

/// The query orchestrator.
///
/// Composes the cache store, coalescer, provider adapter and scoring
/// engine. Cloning is cheap; clones share all state.
pub struct Orchestrator<T, S, R> {
    inner: Arc<Inner<T, S, R>>,
}

impl<T, S, R> Clone for Orchestrator<T, S, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, S, R> Orchestrator<T, S, R>
where
    T: FlightTransport,
    S: KvStore,
    R: ReferenceLookup,
{
    pub fn new(
        adapter: ProviderAdapter<T>,
        cache: CacheStore<S>,
        reference: R,
        config: OrchestratorConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                adapter,
                cache,
                reference,
                coalescer: Coalescer::new(),
                calibration: Calibration::new(),
                config,
                clock,
                events,
            }),
        }
    }

    pub fn adapter(&self) -> &ProviderAdapter<T> {
        &self.inner.adapter
    }

    pub fn cache(&self) -> &CacheStore<S> {
        &self.inner.cache
    }

    pub fn reference(&self) -> &R {
        &self.inner.reference
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Number of routes with an upstream fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.coalescer.in_flight_count()
    }

    /// Scored queries seen so far, for normalization warm-up.
    pub fn calibration_samples(&self) -> u64 {
        self.inner.calibration.samples()
    }

    pub(crate) fn emit(&self, event: &Event) {
        self.inner.events.emit(event);
    }

    /// Route key for a query under the configured schema version.
    pub fn route_key(&self, query: &FlightQuery) -> RouteKey {
        RouteKey::new(
            query.from,
            query.to,
            &self.inner.cache.config().schema_version,
            query.mode,
            &query.filters,
        )
    }

    /// Answer a best-flight query.
    pub async fn best_flight(&self, query: FlightQuery) -> Result<FlightAnswer, QueryError> {
        let deadline = Instant::now() + self.inner.config.request_deadline;

        query.validate()?;
        self.ensure_airport(query.from).await?;
        self.ensure_airport(query.to).await?;

        let key = self.route_key(&query);

        if self.inner.cache.get_negative(&key).await.is_some() {
            return Err(QueryError::NoFlightsFound {
                from: query.from,
                to: query.to,
            });
        }

        match self.inner.cache.get(&key).await {
            RouteLookup::Fresh(entry) => self.answer(&entry, Source::Cache),
            RouteLookup::Stale(entry) => {
                self.refresh_in_background(&key, &query);
                self.answer(&entry, Source::Cache)
            }
            RouteLookup::Miss => self.fetch_for_caller(&key, &query, deadline).await,
        }
    }

    /// Refetch a route outside any caller's deadline, writing with `write`.
    ///
    /// Joins a fetch already in flight for the same key.
    pub(crate) async fn fetch_shared(
        &self,
        key: &RouteKey,
        query: &FlightQuery,
        write: WriteMode,
    ) -> FetchResult {
        let work = self.fetch_work(key.clone(), query.clone(), write);
        match self.inner.coalescer.fetch(key.as_str(), work).await {
            Ok(result) => result,
            Err(e) => {
                error!(%key, error = %e, "shared fetch aborted");
                Err(QueryError::Internal(e.to_string()))
            }
        }
    }

    /// Fails with `AirportNotFound` unless reference data knows `code`.
    pub(crate) async fn ensure_airport(&self, code: IataCode) -> Result<(), QueryError> {
        let found = self
            .inner
            .cache
            .get_reference(&self.inner.reference, ReferenceKey::Airport(code))
            .await
            .map_err(|e| {
                error!(%code, error = %e, "reference lookup failed");
                QueryError::Internal(format!("reference lookup failed: {e}"))
            })?;
        match found {
            Some(_) => Ok(()),
            None => Err(QueryError::AirportNotFound(code)),
        }
    }

    async fn fetch_for_caller(
        &self,
        key: &RouteKey,
        query: &FlightQuery,
        deadline: Instant,
    ) -> Result<FlightAnswer, QueryError> {
        let write = WriteMode {
            ttl: self.route_ttl(query),
            warmed: false,
        };
        let work = self.fetch_work(key.clone(), query.clone(), write);
        let shared = self.inner.coalescer.fetch(key.as_str(), work);

        let failure = match tokio::time::timeout_at(deadline, shared).await {
            Ok(Ok(Ok(Fetched::Entry(entry)))) => return self.answer(&entry, Source::Live),
            Ok(Ok(Ok(Fetched::Empty))) => {
                return Err(QueryError::NoFlightsFound {
                    from: query.from,
                    to: query.to,
                });
            }
            Ok(Ok(Err(e))) => e,
            Ok(Err(e)) => {
                error!(%key, error = %e, "shared fetch aborted");
                QueryError::Internal(e.to_string())
            }
            Err(_) => {
                debug!(%key, "deadline passed while waiting on shared fetch");
                QueryError::UpstreamTimeout
            }
        };

        if failure.allows_fallback() {
            self.fall_back(key, failure).await
        } else {
            Err(failure)
        }
    }

    fn refresh_in_background(&self, key: &RouteKey, query: &FlightQuery) {
        let write = WriteMode {
            ttl: self.route_ttl(query),
            warmed: false,
        };
        let work = self.fetch_work(key.clone(), query.clone(), write);
        if self.inner.coalescer.trigger(key.as_str(), work) {
            debug!(%key, "started background refresh of stale entry");
        }
    }

    /// Serve the newest LKG snapshot if it is young enough, else `failure`.
    async fn fall_back(&self, key: &RouteKey, failure: QueryError) -> Result<FlightAnswer, QueryError> {
        let max_staleness = self.inner.cache.config().lkg_max_staleness;
        let Some((snapshot, age)) = self.inner.cache.get_lkg(key).await else {
            return Err(failure);
        };

        let usable = age
            .to_std()
            .map(|age| age <= max_staleness)
            .unwrap_or(true);
        if !usable {
            warn!(%key, age_secs = age.num_seconds(), error = %failure, "LKG snapshot too old to serve");
            return Err(failure);
        }

        self.inner.events.emit(&Event::LkgFallback {
            key: key.to_string(),
            age_secs: age.num_seconds(),
        });
        self.answer(&snapshot.entry, Source::CacheFallback)
    }

    fn answer(&self, entry: &RouteCacheEntry, source: Source) -> Result<FlightAnswer, QueryError> {
        let (best, alternatives) = split_best(entry.journeys.clone()).ok_or_else(|| {
            error!(from = %entry.from, to = %entry.to, "route entry without journeys");
            QueryError::Internal("cached route entry has no journeys".to_string())
        })?;

        let age = if source == Source::Live {
            0
        } else {
            entry.age(self.inner.clock.now()).num_seconds()
        };

        Ok(FlightAnswer {
            best,
            alternatives,
            provenance: Provenance {
                source,
                fetched_at: entry.fetched_at,
                cache_age_secs: age,
                degraded: source == Source::CacheFallback,
                warmed: entry.warmed,
            },
        })
    }

    fn route_ttl(&self, query: &FlightQuery) -> Duration {
        self.inner
            .cache
            .config()
            .route_ttl
            .ttl_for(query.from, query.to)
    }

    /// The coalesced unit of work: fetch, validate, score, write.
    fn fetch_work(
        &self,
        key: RouteKey,
        query: FlightQuery,
        write: WriteMode,
    ) -> impl FnOnce() -> BoxFuture<'static, FetchResult> + use<T, S, R> {
        let this = self.clone();
        move || async move { this.fetch_and_store(key, query, write).await }.boxed()
    }

    async fn fetch_and_store(&self, key: RouteKey, query: FlightQuery, write: WriteMode) -> FetchResult {
        let inner = &self.inner;
        let raw = inner
            .adapter
            .call(query.from, query.to, inner.config.fetch_budget)
            .await?;

        let converted = convert_route_response(&RouteResponse { journeys: raw }, query.from, query.to);

        let ctx = inner
            .calibration
            .context(inner.config.warmup_threshold, inner.config.reference);
        let started = Instant::now();
        let ranked = score(&converted.journeys, query.mode, &query.filters, &ctx);
        inner.calibration.record();
        inner.events.emit(&Event::Scored {
            key: key.to_string(),
            candidates: converted.journeys.len(),
            survivors: ranked.len(),
            elapsed: started.elapsed(),
        });

        if ranked.is_empty() {
            if let Err(e) = inner.cache.set_negative(&key).await {
                warn!(%key, error = %e, "failed to write negative cache entry");
            }
            return Ok(Fetched::Empty);
        }

        let entry = inner
            .cache
            .new_entry(&key, query.mode, ranked, write.ttl, write.warmed);
        match inner.cache.commit(&key, &entry).await {
            Ok(true) => {}
            Ok(false) => debug!(%key, "newer entry already cached"),
            Err(e) => warn!(%key, error = %e, "failed to write route entry"),
        }
        if let Err(e) = inner.cache.clear_negative(&key).await {
            warn!(%key, error = %e, "failed to clear negative cache entry");
        }

        Ok(Fetched::Entry(Arc::new(entry)))
    }
}
