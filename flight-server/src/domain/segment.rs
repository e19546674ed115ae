//! Flight segment types.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AirlineCode, DomainError, IataCode};

/// Upstream identifier of a single flight segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    /// Create a segment id, rejecting empty or blank strings.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::EmptySegmentId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One priced flight between two airports.
///
/// Segments are immutable once fetched; the only way to build one is
/// [`FlightSegment::new`], which enforces a non-negative price and distinct
/// endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightSegment {
    id: SegmentId,
    airline: AirlineCode,
    departure: IataCode,
    arrival: IataCode,
    price: Decimal,
}

impl FlightSegment {
    pub fn new(
        id: SegmentId,
        airline: AirlineCode,
        departure: IataCode,
        arrival: IataCode,
        price: Decimal,
    ) -> Result<Self, DomainError> {
        if price < Decimal::ZERO {
            return Err(DomainError::NegativePrice(price));
        }
        if departure == arrival {
            return Err(DomainError::DegenerateSegment(id.to_string()));
        }
        Ok(Self {
            id,
            airline,
            departure,
            arrival,
            price,
        })
    }

    pub fn id(&self) -> &SegmentId {
        &self.id
    }

    pub fn airline(&self) -> AirlineCode {
        self.airline
    }

    pub fn departure(&self) -> IataCode {
        self.departure
    }

    pub fn arrival(&self) -> IataCode {
        self.arrival
    }

    pub fn price(&self) -> Decimal {
        self.price
    }
}
