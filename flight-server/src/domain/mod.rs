//! Domain types for the flight query service.
//!
//! This module contains the core domain model types that represent
//! validated flight data. All types enforce their invariants at construction
//! time, so code that receives these types can trust their validity.

mod airline;
mod airport;
mod criteria;
mod error;
mod journey;
mod segment;

pub use airline::{Airline, AirlineCode, InvalidAirlineCode};
pub use airport::{Airport, IataCode, InvalidIata};
pub use criteria::{FilterCriteria, MAX_STOPS_LIMIT, Mode, ModeError};
pub use error::DomainError;
pub use journey::{Journey, JourneyId};
pub use segment::{FlightSegment, SegmentId};
