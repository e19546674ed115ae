//! In-memory reference tables.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::{Airline, AirlineCode, Airport, IataCode};

use super::client::{AirlineDto, AirportDto, ReferenceClient};
use super::error::ReferenceError;
use super::lookup::ReferenceLookup;
use super::snapshot::{ReferenceSnapshot, ReferenceTables};

#[derive(Debug, Default)]
struct ReferenceSet {
    airports: HashMap<IataCode, Airport>,
    airlines: HashMap<AirlineCode, Airline>,
}

impl ReferenceSet {
    fn build(tables: ReferenceTables) -> Self {
        Self {
            airports: build_airports(tables.airports),
            airlines: build_airlines(tables.airlines),
        }
    }
}

/// Thread-safe airport and airline lookup.
///
/// Provides code → record mapping with support for background refresh.
#[derive(Clone)]
pub struct ReferenceData {
    inner: Arc<RwLock<ReferenceSet>>,
    client: Option<ReferenceClient>,
    snapshot: Option<ReferenceSnapshot>,
}

impl ReferenceData {
    /// Create reference data from already-loaded records.
    pub fn from_dtos(airports: Vec<AirportDto>, airlines: Vec<AirlineDto>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ReferenceSet::build(ReferenceTables {
                airports,
                airlines,
            }))),
            client: None,
            snapshot: None,
        }
    }

    /// Load a static `{airports, airlines}` JSON file.
    ///
    /// Used with fixture upstreams; unlike a snapshot the file never expires.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ReferenceError> {
        let tables = ReferenceTables::read(path.as_ref())?;
        Ok(Self::from_dtos(tables.airports, tables.airlines))
    }

    /// Load reference data, preferring a fresh disk snapshot over the API.
    ///
    /// A successful API fetch is written back to the snapshot. With neither
    /// source configured the tables start empty.
    pub async fn load(
        client: Option<ReferenceClient>,
        snapshot: Option<ReferenceSnapshot>,
    ) -> Result<Self, ReferenceError> {
        let data = Self {
            inner: Arc::new(RwLock::new(ReferenceSet::default())),
            client,
            snapshot,
        };

        if let Some(snapshot) = &data.snapshot
            && let Some(tables) = snapshot.load()
        {
            info!(
                path = %snapshot.path().display(),
                airports = tables.airports.len(),
                airlines = tables.airlines.len(),
                "loaded reference data from snapshot"
            );
            *data.inner.write().await = ReferenceSet::build(tables);
            return Ok(data);
        }

        if data.client.is_some() {
            data.refresh().await?;
        } else {
            warn!("no reference source configured; airport validation will reject every code");
        }

        Ok(data)
    }

    /// Refresh from the API.
    ///
    /// On success, replaces the current tables. On failure, the existing
    /// tables are preserved and the error is returned.
    pub async fn refresh(&self) -> Result<usize, ReferenceError> {
        let client = self.client.as_ref().ok_or(ReferenceError::NotConfigured)?;
        let tables = ReferenceTables {
            airports: client.fetch_airports().await?,
            airlines: client.fetch_airlines().await?,
        };

        if let Some(snapshot) = &self.snapshot
            && let Err(e) = snapshot.save(&tables)
        {
            warn!(error = %e, "failed to write reference snapshot");
        }

        let set = ReferenceSet::build(tables);
        let count = set.airports.len() + set.airlines.len();
        *self.inner.write().await = set;

        Ok(count)
    }

    pub async fn airport_count(&self) -> usize {
        self.inner.read().await.airports.len()
    }

    pub async fn airline_count(&self) -> usize {
        self.inner.read().await.airlines.len()
    }
}

impl ReferenceLookup for ReferenceData {
    async fn airport(&self, code: IataCode) -> Result<Option<Airport>, ReferenceError> {
        Ok(self.inner.read().await.airports.get(&code).cloned())
    }

    async fn airline(&self, code: AirlineCode) -> Result<Option<Airline>, ReferenceError> {
        Ok(self.inner.read().await.airlines.get(&code).cloned())
    }
}

/// Build the IATA → airport map, skipping malformed codes.
fn build_airports(airports: Vec<AirportDto>) -> HashMap<IataCode, Airport> {
    airports
        .into_iter()
        .filter_map(|a| {
            let code = IataCode::parse_normalized(&a.code).ok()?;
            Some((
                code,
                Airport {
                    code,
                    name: a.name,
                    city: a.city,
                    country: a.country,
                },
            ))
        })
        .collect()
}

/// Build the airline code → airline map, skipping malformed codes.
fn build_airlines(airlines: Vec<AirlineDto>) -> HashMap<AirlineCode, Airline> {
    airlines
        .into_iter()
        .filter_map(|a| {
            let code = AirlineCode::parse_normalized(&a.code).ok()?;
            Some((code, Airline { code, name: a.name }))
        })
        .collect()
}
