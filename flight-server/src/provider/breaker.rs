//! Per-endpoint circuit breaker.
//!
//! An explicit state machine over an injected [`Clock`]:
//!
//! - `Closed`: calls pass. Failures bump a consecutive counter and a
//!   rolling error-rate window.
//! - `Open`: calls fail fast until the cool-down elapses.
//! - `HalfOpen`: one probe call passes; its outcome picks the next state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::Clock;
use crate::telemetry::{Event, EventSink};

use super::error::ProviderError;

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// Failure fraction within the window that opens the breaker
    pub error_rate_threshold: f64,
    /// Length of the rolling error-rate window
    pub window: Duration,
    /// Samples required before the error rate is trusted
    pub min_samples: usize,
    /// How long the breaker stays open before probing
    pub cool_down: Duration,
}

impl BreakerConfig {
    pub fn with_failure_threshold(mut self, n: u32) -> Self {
        self.failure_threshold = n;
        self
    }

    pub fn with_error_rate(mut self, threshold: f64, min_samples: usize) -> Self {
        self.error_rate_threshold = threshold;
        self.min_samples = min_samples;
        self
    }

    pub fn with_cool_down(mut self, cool_down: Duration) -> Self {
        self.cool_down = cool_down;
        self
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            error_rate_threshold: 0.5,
            window: Duration::from_secs(30),
            min_samples: 10,
            cool_down: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Closed,
    Open { opened_at: DateTime<Utc> },
    HalfOpen { probe_in_flight: bool },
}

impl Phase {
    fn state(&self) -> BreakerState {
        match self {
            Phase::Closed => BreakerState::Closed,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    consecutive_failures: u32,
    /// (when, failed) per recorded call, oldest first.
    window: VecDeque<(DateTime<Utc>, bool)>,
}

impl Inner {
    fn reset_counters(&mut self) {
        self.consecutive_failures = 0;
        self.window.clear();
    }

    fn prune(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        while self
            .window
            .front()
            .is_some_and(|(at, _)| now - *at > window)
        {
            self.window.pop_front();
        }
    }

    fn window_failures(&self) -> usize {
        self.window.iter().filter(|(_, failed)| *failed).count()
    }
}

/// Point-in-time view of a breaker, for the stats endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub endpoint: String,
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub window_samples: usize,
    pub window_failures: usize,
    pub opened_at: Option<DateTime<Utc>>,
}

/// A circuit breaker for one upstream endpoint.
///
/// State changes are short critical sections under a mutex; no lock is held
/// while the guarded call runs.
pub struct CircuitBreaker {
    endpoint: String,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(
        endpoint: impl Into<String>,
        config: BreakerConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            clock,
            events,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                consecutive_failures: 0,
                window: VecDeque::new(),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> BreakerState {
        self.inner.lock().phase.state()
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            endpoint: self.endpoint.clone(),
            state: inner.phase.state(),
            consecutive_failures: inner.consecutive_failures,
            window_samples: inner.window.len(),
            window_failures: inner.window_failures(),
            opened_at: match inner.phase {
                Phase::Open { opened_at } => Some(opened_at),
                _ => None,
            },
        }
    }

    /// Ask to make one call.
    ///
    /// Fails fast with [`ProviderError::CircuitOpen`] while open, or while
    /// half-open with the probe already out.
    pub fn try_acquire(&self) -> Result<Permit<'_>, ProviderError> {
        let now = self.clock.now();
        let mut transition = None;

        let probe = {
            let mut inner = self.inner.lock();
            match inner.phase {
                Phase::Closed => false,
                Phase::Open { opened_at } if now - opened_at >= chrono_duration(self.config.cool_down) => {
                    inner.phase = Phase::HalfOpen {
                        probe_in_flight: true,
                    };
                    transition = Some((BreakerState::Open, BreakerState::HalfOpen));
                    true
                }
                Phase::HalfOpen {
                    probe_in_flight: false,
                } => {
                    inner.phase = Phase::HalfOpen {
                        probe_in_flight: true,
                    };
                    true
                }
                Phase::Open { .. } | Phase::HalfOpen { .. } => {
                    return Err(ProviderError::CircuitOpen {
                        endpoint: self.endpoint.clone(),
                    });
                }
            }
        };

        self.emit(transition);
        Ok(Permit {
            breaker: self,
            probe,
            settled: false,
        })
    }

    fn on_success(&self, probe: bool) {
        let now = self.clock.now();
        let transition = {
            let mut inner = self.inner.lock();
            match inner.phase {
                Phase::HalfOpen { .. } if probe => {
                    inner.phase = Phase::Closed;
                    inner.reset_counters();
                    Some((BreakerState::HalfOpen, BreakerState::Closed))
                }
                Phase::Closed => {
                    inner.consecutive_failures = 0;
                    inner.window.push_back((now, false));
                    inner.prune(now, chrono_duration(self.config.window));
                    None
                }
                // A call admitted before the breaker opened.
                _ => None,
            }
        };
        self.emit(transition);
    }

    fn on_failure(&self, probe: bool) {
        let now = self.clock.now();
        let transition = {
            let mut inner = self.inner.lock();
            match inner.phase {
                Phase::HalfOpen { .. } if probe => {
                    inner.phase = Phase::Open { opened_at: now };
                    Some((BreakerState::HalfOpen, BreakerState::Open))
                }
                Phase::Closed => {
                    inner.consecutive_failures += 1;
                    inner.window.push_back((now, true));
                    inner.prune(now, chrono_duration(self.config.window));

                    if self.should_open(&inner) {
                        inner.phase = Phase::Open { opened_at: now };
                        inner.reset_counters();
                        Some((BreakerState::Closed, BreakerState::Open))
                    } else {
                        None
                    }
                }
                _ => None,
            }
        };
        self.emit(transition);
    }

    fn on_abandoned(&self, probe: bool) {
        if !probe {
            return;
        }
        let mut inner = self.inner.lock();
        if let Phase::HalfOpen { .. } = inner.phase {
            inner.phase = Phase::HalfOpen {
                probe_in_flight: false,
            };
        }
    }

    fn should_open(&self, inner: &Inner) -> bool {
        if inner.consecutive_failures >= self.config.failure_threshold {
            return true;
        }
        let samples = inner.window.len();
        samples >= self.config.min_samples.max(1)
            && inner.window_failures() as f64 / samples as f64 >= self.config.error_rate_threshold
    }

    fn emit(&self, transition: Option<(BreakerState, BreakerState)>) {
        if let Some((from, to)) = transition {
            self.events.emit(&Event::BreakerTransition {
                endpoint: self.endpoint.clone(),
                from,
                to,
            });
        }
    }
}

/// Admission for one call through the breaker.
///
/// Report the outcome with [`Permit::record`]. A permit dropped unreported
/// frees the half-open probe slot without changing state.
#[must_use]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    settled: bool,
}

impl Permit<'_> {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Report the call's outcome.
    ///
    /// Errors that say nothing about upstream health count as success.
    pub fn record<T>(mut self, outcome: &Result<T, ProviderError>) {
        self.settled = true;
        match outcome {
            Err(e) if e.counts_against_breaker() => self.breaker.on_failure(self.probe),
            _ => self.breaker.on_success(self.probe),
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandoned(self.probe);
        }
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}
