//! Scripted transport for tests and local experiments.
//!
//! Answers from per-route outcomes, then a queue of outcomes, then a
//! default, and counts every call it receives.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::domain::IataCode;

use super::error::ProviderError;
use super::transport::FlightTransport;
use super::types::RouteResponse;

/// What one scripted call does.
#[derive(Debug, Clone)]
pub enum Outcome {
    Respond(RouteResponse),
    Fail(ProviderError),
    /// Never answers; only a timeout ends the call.
    Hang,
}

#[derive(Debug)]
struct Script {
    routes: HashMap<(IataCode, IataCode), Outcome>,
    queue: VecDeque<Outcome>,
    fallback: Outcome,
    delay: Duration,
}

/// A [`FlightTransport`] driven by a script.
///
/// Clones share the script and the call counter.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    endpoint: String,
    script: Arc<Mutex<Script>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    /// A transport that answers every call with `fallback`.
    pub fn new(fallback: Outcome) -> Self {
        Self {
            endpoint: "scripted".to_string(),
            script: Arc::new(Mutex::new(Script {
                routes: HashMap::new(),
                queue: VecDeque::new(),
                fallback,
                delay: Duration::ZERO,
            })),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn responding(response: RouteResponse) -> Self {
        Self::new(Outcome::Respond(response))
    }

    pub fn failing(error: ProviderError) -> Self {
        Self::new(Outcome::Fail(error))
    }

    /// Queue an outcome ahead of the fallback.
    pub fn push(&self, outcome: Outcome) -> &Self {
        self.script.lock().queue.push_back(outcome);
        self
    }

    /// Always answer `from`-`to` with `outcome`.
    pub fn set_route(&self, from: IataCode, to: IataCode, outcome: Outcome) {
        self.script.lock().routes.insert((from, to), outcome);
    }

    /// Replace the fallback outcome.
    pub fn set_fallback(&self, outcome: Outcome) {
        self.script.lock().fallback = outcome;
    }

    /// Delay every call by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = delay;
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FlightTransport for ScriptedTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, from: IataCode, to: IataCode) -> Result<RouteResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (outcome, delay) = {
            let mut script = self.script.lock();
            let routed = script.routes.get(&(from, to)).cloned();
            let outcome = match routed {
                Some(outcome) => outcome,
                None => script
                    .queue
                    .pop_front()
                    .unwrap_or_else(|| script.fallback.clone()),
            };
            (outcome, script.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match outcome {
            Outcome::Respond(response) => Ok(response),
            Outcome::Fail(error) => Err(error),
            Outcome::Hang => std::future::pending().await,
        }
    }
}
