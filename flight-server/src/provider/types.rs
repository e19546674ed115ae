//! Upstream wire DTOs.
//!
//! The pricing source answers each route query with journeys ordered by
//! price. Fields are kept loose here; validation happens in `convert`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Response body of a route query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RouteResponse {
    #[serde(default)]
    pub journeys: Vec<RawJourney>,
}

/// One candidate journey as sent by upstream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawJourney {
    pub segments: Vec<RawSegment>,
    /// Upstream's own total, informational only.
    #[serde(default)]
    pub total_price: Option<Decimal>,
}

/// One flight segment as sent by upstream.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawSegment {
    pub id: String,
    pub airline: String,
    pub from: String,
    pub to: String,
    pub price: Decimal,
}
