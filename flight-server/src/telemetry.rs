//! Structured operational events.
//!
//! The core never decides where events go. Components emit [`Event`]s into
//! an [`EventSink`]; the binary wires a [`Fanout`] of the tracing sink and
//! the in-process [`Counters`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::provider::BreakerState;

/// An observable occurrence inside the query path.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Route entry served from cache.
    CacheHit {
        key: String,
        stale: bool,
        warmed: bool,
    },
    /// No usable route entry.
    CacheMiss { key: String },
    /// Confirmed-empty route served from the negative cache.
    NegativeHit { key: String },
    /// Circuit breaker changed state.
    BreakerTransition {
        endpoint: String,
        from: BreakerState,
        to: BreakerState,
    },
    /// One adapter call finished (after retries).
    FetchCompleted {
        route: String,
        elapsed: Duration,
        attempts: u32,
        ok: bool,
    },
    /// Scoring pass over a candidate set.
    Scored {
        key: String,
        candidates: usize,
        survivors: usize,
        elapsed: Duration,
    },
    /// Served a last-known-good snapshot instead of live data.
    LkgFallback { key: String, age_secs: i64 },
    /// Warmer refreshed a route.
    RouteWarmed { key: String, ok: bool },
}

/// Destination for events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &Event) {}
}

/// Sink that logs each event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::CacheHit { key, stale, warmed } => {
                debug!(%key, stale, warmed, "cache hit")
            }
            Event::CacheMiss { key } => debug!(%key, "cache miss"),
            Event::NegativeHit { key } => debug!(%key, "negative cache hit"),
            Event::BreakerTransition { endpoint, from, to } => {
                warn!(%endpoint, ?from, ?to, "circuit breaker transition")
            }
            Event::FetchCompleted {
                route,
                elapsed,
                attempts,
                ok,
            } => info!(
                %route,
                elapsed_ms = elapsed.as_millis() as u64,
                attempts,
                ok,
                "upstream fetch"
            ),
            Event::Scored {
                key,
                candidates,
                survivors,
                elapsed,
            } => debug!(
                %key,
                candidates,
                survivors,
                elapsed_us = elapsed.as_micros() as u64,
                "scored candidates"
            ),
            Event::LkgFallback { key, age_secs } => {
                warn!(%key, age_secs, "serving last-known-good snapshot")
            }
            Event::RouteWarmed { key, ok } => debug!(%key, ok, "route warmed"),
        }
    }
}

/// Atomic operational counters.
#[derive(Debug, Default)]
pub struct Counters {
    cache_hits: AtomicU64,
    stale_hits: AtomicU64,
    cache_misses: AtomicU64,
    negative_hits: AtomicU64,
    upstream_fetches: AtomicU64,
    fetch_failures: AtomicU64,
    lkg_fallbacks: AtomicU64,
    breaker_transitions: AtomicU64,
    routes_warmed: AtomicU64,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub cache_hits: u64,
    pub stale_hits: u64,
    pub cache_misses: u64,
    pub negative_hits: u64,
    pub upstream_fetches: u64,
    pub fetch_failures: u64,
    pub lkg_fallbacks: u64,
    pub breaker_transitions: u64,
    pub routes_warmed: u64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            negative_hits: self.negative_hits.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            lkg_fallbacks: self.lkg_fallbacks.load(Ordering::Relaxed),
            breaker_transitions: self.breaker_transitions.load(Ordering::Relaxed),
            routes_warmed: self.routes_warmed.load(Ordering::Relaxed),
        }
    }
}

impl EventSink for Counters {
    fn emit(&self, event: &Event) {
        let counter = match event {
            Event::CacheHit { stale: true, .. } => &self.stale_hits,
            Event::CacheHit { .. } => &self.cache_hits,
            Event::CacheMiss { .. } => &self.cache_misses,
            Event::NegativeHit { .. } => &self.negative_hits,
            Event::BreakerTransition { .. } => &self.breaker_transitions,
            Event::FetchCompleted { ok: true, .. } => &self.upstream_fetches,
            Event::FetchCompleted { ok: false, .. } => {
                self.upstream_fetches.fetch_add(1, Ordering::Relaxed);
                &self.fetch_failures
            }
            Event::Scored { .. } => return,
            Event::LkgFallback { .. } => &self.lkg_fallbacks,
            Event::RouteWarmed { ok: true, .. } => &self.routes_warmed,
            Event::RouteWarmed { ok: false, .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Delivers each event to every inner sink, in order.
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for Fanout {
    fn emit(&self, event: &Event) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Event>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Count events matching a predicate.
    pub fn count(&self, pred: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_tally_by_kind() {
        let counters = Counters::new();
        counters.emit(&Event::CacheHit {
            key: "k".into(),
            stale: false,
            warmed: false,
        });
        counters.emit(&Event::CacheHit {
            key: "k".into(),
            stale: true,
            warmed: false,
        });
        counters.emit(&Event::CacheMiss { key: "k".into() });
        counters.emit(&Event::FetchCompleted {
            route: "JFK-LAX".into(),
            elapsed: Duration::from_millis(5),
            attempts: 3,
            ok: false,
        });
        counters.emit(&Event::LkgFallback {
            key: "k".into(),
            age_secs: 600,
        });

        let snap = counters.snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.stale_hits, 1);
        assert_eq!(snap.cache_misses, 1);
        assert_eq!(snap.upstream_fetches, 1);
        assert_eq!(snap.fetch_failures, 1);
        assert_eq!(snap.lkg_fallbacks, 1);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(Counters::new());
        let fanout = Fanout::new().with(a.clone()).with(b.clone());

        fanout.emit(&Event::NegativeHit { key: "neg".into() });

        assert_eq!(a.events().len(), 1);
        assert_eq!(b.snapshot().negative_hits, 1);
    }
}
