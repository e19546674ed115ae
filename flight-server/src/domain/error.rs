//! Domain error types.
//!
//! These errors represent validation failures and data inconsistencies
//! in the domain layer. They are distinct from upstream and cache errors.

use rust_decimal::Decimal;

use super::IataCode;

/// Domain-level errors for validation and data consistency.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Segment identifier was empty
    #[error("segment id must not be empty")]
    EmptySegmentId,

    /// Segment price below zero
    #[error("segment price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    /// Segment departs and arrives at the same airport
    #[error("segment {0} departs and arrives at the same airport")]
    DegenerateSegment(String),

    /// Adjacent segments don't share an airport
    #[error("segment {index} arrives at {arrival} but the next departs from {departure}")]
    NotConnected {
        index: usize,
        arrival: IataCode,
        departure: IataCode,
    },

    /// Segment prices sum past the representable range
    #[error("journey price overflows")]
    PriceOverflow,

    /// Journey has no segments
    #[error("journey must have at least one segment")]
    EmptyJourney,

    /// Filter bounds out of range
    #[error("invalid filter: {0}")]
    InvalidFilter(&'static str),
}
