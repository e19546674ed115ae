//! Provider adapter error types.

use std::time::Duration;

/// Errors from one upstream call, after classification.
///
/// `Clone` so a single coalesced failure can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// An attempt exceeded its timeout
    #[error("upstream timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Connection-level failure
    #[error("network error: {0}")]
    Network(String),

    /// Upstream returned a 5xx status
    #[error("upstream server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Upstream throttled us
    #[error("rate limited by upstream")]
    RateLimited,

    /// Credential rejected (401/403)
    #[error("unauthorized: upstream rejected the credential")]
    Unauthorized,

    /// Upstream rejected the request itself (4xx other than 429)
    #[error("upstream rejected request {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Response body didn't match the wire schema
    #[error("undecodable upstream response: {0}")]
    Decode(String),

    /// Breaker is open; upstream was not contacted
    #[error("circuit open for {endpoint}")]
    CircuitOpen { endpoint: String },

    /// No credential could be supplied
    #[error("credential unavailable: {0}")]
    Credential(String),

    /// The caller's attempt budget ran out before another attempt fit
    #[error("fetch budget exhausted after {attempts} attempt(s)")]
    BudgetExhausted { attempts: u32 },
}

impl ProviderError {
    /// Whether another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::Network(_)
                | ProviderError::Server { .. }
                | ProviderError::RateLimited
        )
    }

    /// Whether the failure says something about upstream health.
    ///
    /// Client-class rejections are the caller's fault and leave the breaker
    /// alone.
    pub fn counts_against_breaker(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::Network(_)
                | ProviderError::Server { .. }
                | ProviderError::RateLimited
                | ProviderError::Decode(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}
