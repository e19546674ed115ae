//! Orchestrator configuration.

use std::time::Duration;

use crate::scoring::{DEFAULT_WARMUP_THRESHOLD, ReferencePercentiles};

/// Configuration for the query orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long a caller waits, from entry, before falling back
    pub request_deadline: Duration,

    /// Attempt budget of one shared upstream fetch.
    ///
    /// Shared fetches outlive the callers that started them, so this may
    /// exceed the request deadline.
    pub fetch_budget: Duration,

    /// Scored queries needed before per-request min-max normalization
    pub warmup_threshold: u64,

    /// Fixed percentiles used during warm-up
    pub reference: ReferencePercentiles,
}

impl OrchestratorConfig {
    pub fn with_request_deadline(mut self, deadline: Duration) -> Self {
        self.request_deadline = deadline;
        self
    }

    pub fn with_fetch_budget(mut self, budget: Duration) -> Self {
        self.fetch_budget = budget;
        self
    }

    pub fn with_warmup_threshold(mut self, threshold: u64) -> Self {
        self.warmup_threshold = threshold;
        self
    }

    pub fn with_reference(mut self, reference: ReferencePercentiles) -> Self {
        self.reference = reference;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_deadline: Duration::from_millis(2000),
            fetch_budget: Duration::from_millis(4500),
            warmup_threshold: DEFAULT_WARMUP_THRESHOLD,
            reference: ReferencePercentiles::default(),
        }
    }
}
