//! Caller-facing error taxonomy.

use serde::Serialize;

use crate::domain::{DomainError, IataCode, InvalidAirlineCode, InvalidIata, ModeError};
use crate::provider::ProviderError;

/// Broad class of a query failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    NotFound,
    RateLimited,
    UpstreamUnavailable,
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Validation => "validation",
            ErrorClass::NotFound => "not_found",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::UpstreamUnavailable => "upstream_unavailable",
            ErrorClass::Internal => "internal",
        }
    }
}

/// Why a flight query produced no answer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    /// Malformed code, filter bound or request shape
    #[error("invalid request: {0}")]
    Validation(String),

    /// Mode is reserved or unknown
    #[error("{0}")]
    UnsupportedMode(String),

    /// Airport code isn't in the reference data
    #[error("airport {0} not found")]
    AirportNotFound(IataCode),

    /// Route confirmed to have no matching journeys
    #[error("no flights found from {from} to {to}")]
    NoFlightsFound { from: IataCode, to: IataCode },

    /// Caller exceeded its quota
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Upstream failing or circuit open, and no usable snapshot
    #[error("flight data temporarily unavailable: {0}")]
    Unavailable(String),

    /// Upstream didn't answer in time, and no usable snapshot
    #[error("flight data source timed out")]
    UpstreamTimeout,

    /// Unexpected defect
    #[error("internal error: {0}")]
    Internal(String),
}

impl QueryError {
    pub fn class(&self) -> ErrorClass {
        match self {
            QueryError::Validation(_) | QueryError::UnsupportedMode(_) => ErrorClass::Validation,
            QueryError::AirportNotFound(_) | QueryError::NoFlightsFound { .. } => {
                ErrorClass::NotFound
            }
            QueryError::RateLimited { .. } => ErrorClass::RateLimited,
            QueryError::Unavailable(_) | QueryError::UpstreamTimeout => {
                ErrorClass::UpstreamUnavailable
            }
            QueryError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Validation(_) => "VALIDATION_ERROR",
            QueryError::UnsupportedMode(_) => "UNSUPPORTED_MODE",
            QueryError::AirportNotFound(_) => "AIRPORT_NOT_FOUND",
            QueryError::NoFlightsFound { .. } => "NO_FLIGHTS_FOUND",
            QueryError::RateLimited { .. } => "RATE_LIMITED",
            QueryError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            QueryError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            QueryError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::RateLimited | ErrorClass::UpstreamUnavailable
        )
    }

    /// Whether a last-known-good snapshot may stand in for this failure.
    pub fn allows_fallback(&self) -> bool {
        self.class() == ErrorClass::UpstreamUnavailable
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            QueryError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            QueryError::Unavailable(_) | QueryError::UpstreamTimeout => Some(30),
            _ => None,
        }
    }
}

impl From<DomainError> for QueryError {
    fn from(err: DomainError) -> Self {
        QueryError::Validation(err.to_string())
    }
}

impl From<InvalidIata> for QueryError {
    fn from(err: InvalidIata) -> Self {
        QueryError::Validation(err.to_string())
    }
}

impl From<InvalidAirlineCode> for QueryError {
    fn from(err: InvalidAirlineCode) -> Self {
        QueryError::Validation(err.to_string())
    }
}

impl From<ModeError> for QueryError {
    fn from(err: ModeError) -> Self {
        match err {
            ModeError::Reserved(_) => QueryError::UnsupportedMode(err.to_string()),
            ModeError::Unknown(_) => QueryError::Validation(err.to_string()),
        }
    }
}

impl From<ProviderError> for QueryError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Timeout(_) | ProviderError::BudgetExhausted { .. } => {
                QueryError::UpstreamTimeout
            }
            ProviderError::Rejected { .. } => QueryError::Internal(err.to_string()),
            ProviderError::Network(_)
            | ProviderError::Server { .. }
            | ProviderError::RateLimited
            | ProviderError::Unauthorized
            | ProviderError::Decode(_)
            | ProviderError::CircuitOpen { .. }
            | ProviderError::Credential(_) => QueryError::Unavailable(err.to_string()),
        }
    }
}
