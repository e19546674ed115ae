//! The provider adapter: retries, timeouts and the circuit breaker around
//! one [`FlightTransport`].

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::clock::Clock;
use crate::domain::IataCode;
use crate::telemetry::{Event, EventSink};

use super::breaker::{BreakerConfig, CircuitBreaker};
use super::error::ProviderError;
use super::retry::RetryPolicy;
use super::transport::FlightTransport;
use super::types::RawJourney;

/// Guards one upstream capability.
pub struct ProviderAdapter<T> {
    transport: T,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    events: Arc<dyn EventSink>,
}

impl<T: FlightTransport> ProviderAdapter<T> {
    pub fn new(
        transport: T,
        retry: RetryPolicy,
        breaker: BreakerConfig,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let breaker = CircuitBreaker::new(transport.endpoint(), breaker, clock, events.clone());
        Self {
            transport,
            breaker,
            retry,
            events,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch the raw journeys for a route, in upstream order.
    ///
    /// Retryable failures are retried with backoff; every attempt passes
    /// through the breaker, and no attempt starts or waits past `budget`.
    pub async fn call(
        &self,
        from: IataCode,
        to: IataCode,
        budget: Duration,
    ) -> Result<Vec<RawJourney>, ProviderError> {
        let started = Instant::now();
        let deadline = started + budget;
        let mut attempts = 0;

        let result = loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break Err(ProviderError::BudgetExhausted { attempts });
            }

            let permit = match self.breaker.try_acquire() {
                Ok(permit) => permit,
                Err(e) => break Err(e),
            };
            attempts += 1;

            let timeout = self.retry.attempt_timeout.min(remaining);
            let outcome = match tokio::time::timeout(timeout, self.transport.call(from, to)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            };
            permit.record(&outcome);

            match outcome {
                Ok(response) => break Ok(response.journeys),
                Err(e) if e.is_retryable() && attempts < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempts);
                    if Instant::now() + delay >= deadline {
                        break Err(e);
                    }
                    debug!(%from, %to, attempts, error = %e, delay_ms = delay.as_millis() as u64, "retrying upstream call");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        self.events.emit(&Event::FetchCompleted {
            route: format!("{from}-{to}"),
            elapsed: started.elapsed(),
            attempts,
            ok: result.is_ok(),
        });
        result
    }
}
