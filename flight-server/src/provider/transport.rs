//! The upstream transport port.

use std::future::Future;

use crate::domain::IataCode;

use super::error::ProviderError;
use super::types::RouteResponse;

/// One network call to the flight-pricing source.
///
/// Implementations perform a single attempt with no retries; the adapter
/// owns retry, timeout and breaker policy.
pub trait FlightTransport: Send + Sync + 'static {
    /// Name of the upstream endpoint, used to key its circuit breaker.
    fn endpoint(&self) -> &str;

    fn call(
        &self,
        from: IataCode,
        to: IataCode,
    ) -> impl Future<Output = Result<RouteResponse, ProviderError>> + Send;
}
