//! Airport and airline reference data.
//!
//! Loaded from a disk snapshot or the reference API and queried through the
//! [`ReferenceLookup`] port.

mod client;
mod data;
mod error;
mod lookup;
mod snapshot;

pub use client::{AirlineDto, AirportDto, ReferenceClient, ReferenceClientConfig};
pub use data::ReferenceData;
pub use error::ReferenceError;
pub use lookup::{ReferenceKey, ReferenceKind, ReferenceLookup, ReferenceRecord};
pub use snapshot::{ReferenceSnapshot, ReferenceTables, SnapshotConfig, SnapshotFile};
