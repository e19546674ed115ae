//! Query criteria: ranking mode and candidate filters.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AirlineCode, DomainError, Journey};

/// Upper bound accepted for `max_stops`.
pub const MAX_STOPS_LIMIT: u8 = 5;

/// Error returned when parsing a ranking mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    /// Recognised mode name with no defined weighting
    #[error("mode '{0}' is reserved and not supported")]
    Reserved(String),

    /// Not a mode name at all
    #[error("unknown mode '{0}' (expected 'cheapest' or 'fewest-stops')")]
    Unknown(String),
}

/// How candidates are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Cheapest,
    FewestStops,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Cheapest => "cheapest",
            Mode::FewestStops => "fewest-stops",
        }
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cheapest" => Ok(Mode::Cheapest),
            "fewest-stops" | "fewest_stops" => Ok(Mode::FewestStops),
            "balanced" => Err(ModeError::Reserved(s.to_string())),
            _ => Err(ModeError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate filters for a single request.
///
/// Airline lists are kept as sorted sets so that two requests naming the
/// same airlines in a different order hash to the same cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
    pub max_stops: Option<u8>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub allow_airlines: BTreeSet<AirlineCode>,
    #[serde(default)]
    pub deny_airlines: BTreeSet<AirlineCode>,
}

impl FilterCriteria {
    pub fn with_max_stops(mut self, stops: u8) -> Self {
        self.max_stops = Some(stops);
        self
    }

    pub fn with_max_price(mut self, price: Decimal) -> Self {
        self.max_price = Some(price);
        self
    }

    pub fn allow(mut self, airline: AirlineCode) -> Self {
        self.allow_airlines.insert(airline);
        self
    }

    pub fn deny(mut self, airline: AirlineCode) -> Self {
        self.deny_airlines.insert(airline);
        self
    }

    /// Check bounds: `max_stops` in 0..=5, `max_price` strictly positive.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(stops) = self.max_stops
            && stops > MAX_STOPS_LIMIT
        {
            return Err(DomainError::InvalidFilter(
                "max_stops must be between 0 and 5",
            ));
        }
        if let Some(price) = self.max_price
            && price <= Decimal::ZERO
        {
            return Err(DomainError::InvalidFilter("max_price must be positive"));
        }
        Ok(())
    }

    /// Whether a journey survives these filters.
    ///
    /// The deny list wins over the allow list for an airline named in both.
    pub fn admits(&self, journey: &Journey) -> bool {
        if let Some(max) = self.max_stops
            && journey.stops() > usize::from(max)
        {
            return false;
        }
        if let Some(max) = self.max_price
            && journey.total_price() > max
        {
            return false;
        }
        journey.airlines().all(|airline| {
            !self.deny_airlines.contains(&airline)
                && (self.allow_airlines.is_empty() || self.allow_airlines.contains(&airline))
        })
    }

    /// Canonical text form, stable across processes. Feeds the cache key hash.
    pub fn canonical(&self) -> String {
        let join = |set: &BTreeSet<AirlineCode>| {
            set.iter()
                .map(AirlineCode::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };
        format!(
            "stops={};price={};allow={};deny={}",
            self.max_stops.map(|s| s.to_string()).unwrap_or_default(),
            self.max_price
                .map(|p| p.normalize().to_string())
                .unwrap_or_default(),
            join(&self.allow_airlines),
            join(&self.deny_airlines),
        )
    }
}
