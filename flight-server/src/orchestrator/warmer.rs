//! Prefetch warmer.
//!
//! Refreshes a list of routes through the orchestrator's fetch path on
//! request of an external scheduler. The scheduler owns the timing; this
//! module only exposes "refresh these routes now".

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{KvStore, RouteCacheEntry, RouteKey};
use crate::domain::{IataCode, Mode};
use crate::provider::FlightTransport;
use crate::reference::ReferenceLookup;
use crate::telemetry::Event;

use super::error::QueryError;
use super::lookup::{Fetched, FlightQuery, Orchestrator, WriteMode};

/// Default number of routes warmed concurrently.
const DEFAULT_BATCH_SIZE: usize = 8;

/// One route to keep warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WarmRoute {
    pub from: IataCode,
    pub to: IataCode,
    #[serde(default)]
    pub mode: Mode,
}

/// Configuration for the prefetch warmer.
#[derive(Debug, Clone)]
pub struct WarmerConfig {
    /// Routes refreshed concurrently per batch
    pub batch_size: usize,
}

impl WarmerConfig {
    pub fn with_batch_size(mut self, n: usize) -> Self {
        self.batch_size = n;
        self
    }
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Outcome counts of one warming run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub warmed: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Outcome of warming one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmOutcome {
    Warmed,
    Empty,
}

/// Re-runs the fetch path for ranked route lists.
pub struct PrefetchWarmer<T, S, R> {
    orchestrator: Orchestrator<T, S, R>,
    config: WarmerConfig,
}

impl<T, S, R> Clone for PrefetchWarmer<T, S, R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T, S, R> PrefetchWarmer<T, S, R>
where
    T: FlightTransport,
    S: KvStore,
    R: ReferenceLookup,
{
    pub fn new(orchestrator: Orchestrator<T, S, R>, config: WarmerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Refresh one route, ignoring any cached entry.
    ///
    /// Results are written with the warm TTL and marked as warmed, also
    /// when the warmer joins a caller's fetch already in flight.
    pub async fn warm_route(&self, route: WarmRoute) -> Result<WarmOutcome, QueryError> {
        let query = FlightQuery::new(route.from, route.to).with_mode(route.mode);
        query.validate()?;
        self.orchestrator.ensure_airport(query.from).await?;
        self.orchestrator.ensure_airport(query.to).await?;

        let key = self.orchestrator.route_key(&query);
        let write = WriteMode {
            ttl: self.orchestrator.cache().config().warm_ttl,
            warmed: true,
        };

        let result = match self.orchestrator.fetch_shared(&key, &query, write).await {
            Ok(Fetched::Entry(entry)) if !entry.warmed => {
                Ok(self.restamp(&key, &entry, write.ttl).await)
            }
            other => other,
        };
        self.orchestrator.emit(&Event::RouteWarmed {
            key: key.to_string(),
            ok: result.is_ok(),
        });

        match result? {
            Fetched::Entry(_) => Ok(WarmOutcome::Warmed),
            Fetched::Empty => Ok(WarmOutcome::Empty),
        }
    }

    /// Rewrite an entry produced by a joined caller fetch as warmer output.
    ///
    /// The fetch time is kept, so a newer write still wins.
    async fn restamp(&self, key: &RouteKey, entry: &RouteCacheEntry, ttl: Duration) -> Fetched {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        let warmed = entry.clone().into_warmed(ttl);
        match self.orchestrator.cache().set(key, &warmed).await {
            Ok(true) => debug!(%key, "joined fetch rewritten as warmed"),
            Ok(false) => debug!(%key, "newer entry already cached"),
            Err(e) => warn!(%key, error = %e, "failed to rewrite joined fetch as warmed"),
        }
        Fetched::Entry(Arc::new(warmed))
    }

    /// Refresh every route, in order, a batch at a time.
    ///
    /// A failing route is logged and counted; it never stops the others.
    pub async fn run(&self, routes: &[WarmRoute]) -> WarmReport {
        let mut report = WarmReport::default();

        for batch in routes.chunks(self.config.batch_size.max(1)) {
            let futures: Vec<_> = batch
                .iter()
                .map(|route| async move { (*route, self.warm_route(*route).await) })
                .collect();

            for (route, result) in join_all(futures).await {
                match result {
                    Ok(WarmOutcome::Warmed) => report.warmed += 1,
                    Ok(WarmOutcome::Empty) => {
                        debug!(from = %route.from, to = %route.to, "warmed route has no flights");
                        report.empty += 1;
                    }
                    Err(e) => {
                        warn!(from = %route.from, to = %route.to, error = %e, "failed to warm route");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            routes = routes.len(),
            warmed = report.warmed,
            empty = report.empty,
            failed = report.failed,
            "prefetch run finished"
        );
        report
    }
}
