//! Per-caller request quota.
//!
//! A fixed window per caller: the first request opens a window, and every
//! request inside it counts against the limit. Windows live in a moka cache
//! whose time-to-live is the window length, so an expired window simply
//! disappears and the next request opens a fresh one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use moka::future::Cache as MokaCache;
use tokio::time::Instant;
use tracing::debug;

use crate::orchestrator::QueryError;

/// Caller identity used when no API key is presented.
pub const ANONYMOUS: &str = "anonymous";

/// Configuration for [`Quota`].
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Requests allowed per caller per window.
    pub limit: u32,

    pub window: Duration,

    /// Maximum number of callers tracked at once.
    pub max_callers: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            limit: 120,
            window: Duration::from_secs(60),
            max_callers: 100_000,
        }
    }
}

impl QuotaConfig {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

struct Window {
    opened_at: Instant,
    used: AtomicU32,
}

/// Fixed-window request counter keyed by caller.
pub struct Quota {
    windows: MokaCache<String, Arc<Window>>,
    config: QuotaConfig,
}

impl Quota {
    pub fn new(config: QuotaConfig) -> Self {
        let windows = MokaCache::builder()
            .time_to_live(config.window)
            .max_capacity(config.max_callers)
            .build();
        Self { windows, config }
    }

    /// Count one request for `caller`.
    ///
    /// Fails with [`QueryError::RateLimited`] once the caller has used up
    /// the current window.
    pub async fn check(&self, caller: &str) -> Result<(), QueryError> {
        let window = self
            .windows
            .get_with(caller.to_string(), async {
                Arc::new(Window {
                    opened_at: Instant::now(),
                    used: AtomicU32::new(0),
                })
            })
            .await;

        let used = window.used.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if used <= self.config.limit {
            return Ok(());
        }

        let remaining = self.config.window.saturating_sub(window.opened_at.elapsed());
        let retry_after_secs = remaining.as_secs_f64().ceil().max(1.0) as u64;
        debug!(caller, used, retry_after_secs, "caller over quota");
        Err(QueryError::RateLimited { retry_after_secs })
    }
}
