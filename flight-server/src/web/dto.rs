//! Request and response types for the HTTP API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AirlineCode, FilterCriteria, IataCode, Mode};
use crate::orchestrator::{ErrorClass, FlightAnswer, FlightQuery, Provenance, QueryError, WarmRoute};
use crate::provider::BreakerSnapshot;
use crate::scoring::ScoredSolution;
use crate::telemetry::CounterSnapshot;

/// Query string of `GET /api/flights/best`.
///
/// Everything arrives as text so that malformed values surface as our own
/// validation errors rather than extractor rejections.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BestFlightParams {
    pub from: String,
    pub to: String,
    pub mode: Option<String>,
    pub max_stops: Option<String>,
    pub max_price: Option<String>,
    /// Comma-separated allow list.
    pub airlines: Option<String>,
    /// Comma-separated deny list.
    pub exclude_airlines: Option<String>,
}

impl BestFlightParams {
    pub fn into_query(self) -> Result<FlightQuery, QueryError> {
        let from = IataCode::parse_normalized(&self.from)?;
        let to = IataCode::parse_normalized(&self.to)?;

        let mode = match self.mode.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(m) => m.parse::<Mode>()?,
            None => Mode::default(),
        };

        let mut filters = FilterCriteria::default();
        if let Some(stops) = non_empty(&self.max_stops) {
            let stops = stops
                .parse::<u8>()
                .map_err(|_| QueryError::Validation(format!("invalid max_stops: {stops}")))?;
            filters = filters.with_max_stops(stops);
        }
        if let Some(price) = non_empty(&self.max_price) {
            let price = price
                .parse::<Decimal>()
                .map_err(|_| QueryError::Validation(format!("invalid max_price: {price}")))?;
            filters = filters.with_max_price(price);
        }
        for airline in airline_list(&self.airlines)? {
            filters = filters.allow(airline);
        }
        for airline in airline_list(&self.exclude_airlines)? {
            filters = filters.deny(airline);
        }

        Ok(FlightQuery::new(from, to)
            .with_mode(mode)
            .with_filters(filters))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn airline_list(value: &Option<String>) -> Result<Vec<AirlineCode>, QueryError> {
    let Some(list) = non_empty(value) else {
        return Ok(Vec::new());
    };
    list.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(|code| AirlineCode::parse_normalized(code).map_err(QueryError::from))
        .collect()
}

/// Successful answer of `GET /api/flights/best`.
#[derive(Debug, Serialize)]
pub struct BestFlightResponse {
    pub best: ScoredSolution,
    pub alternatives: Vec<ScoredSolution>,
    pub provenance: Provenance,
    pub correlation_id: Uuid,
}

impl BestFlightResponse {
    pub fn new(answer: FlightAnswer, correlation_id: Uuid) -> Self {
        Self {
            best: answer.best,
            alternatives: answer.alternatives,
            provenance: answer.provenance,
            correlation_id,
        }
    }
}

/// One route in a prefetch request.
#[derive(Debug, Deserialize)]
pub struct PrefetchRoute {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub mode: Option<String>,
}

impl PrefetchRoute {
    pub fn to_warm_route(&self) -> Result<WarmRoute, QueryError> {
        let mode = match self.mode.as_deref() {
            Some(m) => m.parse::<Mode>()?,
            None => Mode::default(),
        };
        Ok(WarmRoute {
            from: IataCode::parse_normalized(&self.from)?,
            to: IataCode::parse_normalized(&self.to)?,
            mode,
        })
    }
}

/// Body of `POST /api/prefetch`.
#[derive(Debug, Deserialize)]
pub struct PrefetchRequest {
    pub routes: Vec<PrefetchRoute>,
}

#[derive(Debug, Serialize)]
pub struct PrefetchAccepted {
    pub accepted: usize,
    pub correlation_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Operational snapshot served by `GET /api/stats`.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub counters: CounterSnapshot,
    pub breaker: BreakerSnapshot,
    pub in_flight: usize,
    pub calibration_samples: u64,
}

/// JSON error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub class: ErrorClass,
    pub message: String,
    pub correlation_id: Uuid,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}
