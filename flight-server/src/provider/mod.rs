//! Provider adapter for the upstream flight-pricing source.
//!
//! [`ProviderAdapter`] wraps a [`FlightTransport`] with retries, per-attempt
//! timeouts and a [`CircuitBreaker`]. Transports: [`HttpTransport`] for the
//! real API, [`FixtureTransport`] for local development and
//! [`ScriptedTransport`] for tests.

mod adapter;
mod breaker;
mod client;
mod convert;
mod credential;
mod error;
mod fixture;
mod mock;
mod retry;
mod transport;
mod types;

pub use adapter::ProviderAdapter;
pub use breaker::{BreakerConfig, BreakerSnapshot, BreakerState, CircuitBreaker, Permit};
pub use client::{HttpTransport, ProviderConfig};
pub use convert::{ConversionError, Converted, convert_journey, convert_route_response};
pub use credential::{CredentialSource, EnvCredential, StaticCredential};
pub use error::ProviderError;
pub use fixture::FixtureTransport;
pub use mock::{Outcome, ScriptedTransport};
pub use retry::RetryPolicy;
pub use transport::FlightTransport;
pub use types::{RawJourney, RawSegment, RouteResponse};

use crate::domain::IataCode;

/// The transports the binary can be configured with.
#[derive(Clone)]
pub enum AnyTransport {
    Http(HttpTransport),
    Fixture(FixtureTransport),
}

impl FlightTransport for AnyTransport {
    fn endpoint(&self) -> &str {
        match self {
            AnyTransport::Http(t) => t.endpoint(),
            AnyTransport::Fixture(t) => t.endpoint(),
        }
    }

    async fn call(&self, from: IataCode, to: IataCode) -> Result<RouteResponse, ProviderError> {
        match self {
            AnyTransport::Http(t) => t.call(from, to).await,
            AnyTransport::Fixture(t) => t.call(from, to).await,
        }
    }
}
