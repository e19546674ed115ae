//! Query orchestrator.
//!
//! Answers "what is the best flight from A to B": validate, serve from
//! cache when possible, otherwise fetch through the coalescer and provider
//! adapter, score, cache, and fall back to last-known-good data when the
//! upstream fails.

mod config;
mod error;
mod lookup;
mod warmer;


pub use config::OrchestratorConfig;
pub use error::{ErrorClass, QueryError};
pub use lookup::{FlightAnswer, FlightQuery, Orchestrator, Provenance, Source};
pub use warmer::{PrefetchWarmer, WarmOutcome, WarmReport, WarmRoute, WarmerConfig};
