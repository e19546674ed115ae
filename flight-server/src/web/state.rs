//! Application state for the web layer.

use std::sync::Arc;

use crate::orchestrator::{Orchestrator, PrefetchWarmer};
use crate::telemetry::Counters;

use super::quota::Quota;

/// Shared application state.
///
/// Contains all the services needed to handle requests.
pub struct AppState<T, S, R> {
    pub orchestrator: Orchestrator<T, S, R>,

    /// Runs prefetch requests in the background
    pub warmer: PrefetchWarmer<T, S, R>,

    /// Operational counters fed by the event sink
    pub counters: Arc<Counters>,

    pub quota: Arc<Quota>,
}

impl<T, S, R> Clone for AppState<T, S, R> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            warmer: self.warmer.clone(),
            counters: Arc::clone(&self.counters),
            quota: Arc::clone(&self.quota),
        }
    }
}

impl<T, S, R> AppState<T, S, R> {
    pub fn new(
        orchestrator: Orchestrator<T, S, R>,
        warmer: PrefetchWarmer<T, S, R>,
        counters: Arc<Counters>,
        quota: Quota,
    ) -> Self {
        Self {
            orchestrator,
            warmer,
            counters,
            quota: Arc::new(quota),
        }
    }
}
