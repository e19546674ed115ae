//! Reference lookup port.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::domain::{Airline, AirlineCode, Airport, IataCode};

use super::error::ReferenceError;

/// Which reference table a key addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Airport,
    Airline,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Airport => "airport",
            ReferenceKind::Airline => "airline",
        }
    }
}

/// A typed reference-data key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKey {
    Airport(IataCode),
    Airline(AirlineCode),
}

impl ReferenceKey {
    pub fn kind(&self) -> ReferenceKind {
        match self {
            ReferenceKey::Airport(_) => ReferenceKind::Airport,
            ReferenceKey::Airline(_) => ReferenceKind::Airline,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ReferenceKey::Airport(code) => code.as_str(),
            ReferenceKey::Airline(code) => code.as_str(),
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind().as_str(), self.code())
    }
}

/// A reference record of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReferenceRecord {
    Airport(Airport),
    Airline(Airline),
}

/// Read-only lookup of reference data by code.
pub trait ReferenceLookup: Send + Sync + 'static {
    fn airport(
        &self,
        code: IataCode,
    ) -> impl Future<Output = Result<Option<Airport>, ReferenceError>> + Send;

    fn airline(
        &self,
        code: AirlineCode,
    ) -> impl Future<Output = Result<Option<Airline>, ReferenceError>> + Send;

    /// Look up either kind by key.
    fn lookup(
        &self,
        key: ReferenceKey,
    ) -> impl Future<Output = Result<Option<ReferenceRecord>, ReferenceError>> + Send {
        async move {
            Ok(match key {
                ReferenceKey::Airport(code) => self.airport(code).await?.map(ReferenceRecord::Airport),
                ReferenceKey::Airline(code) => self.airline(code).await?.map(ReferenceRecord::Airline),
            })
        }
    }
}
