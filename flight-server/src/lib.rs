//! Flight query orchestration server.
//!
//! Answers "what is the best flight from A to B?" on top of an upstream
//! pricing API that is slow, rate-limited and sometimes down. Requests are
//! served from a versioned cache where possible, identical misses share one
//! upstream call, and a last-known-good snapshot stands in when the
//! upstream fails.

pub mod cache;
pub mod clock;
pub mod coalesce;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod provider;
pub mod reference;
pub mod scoring;
pub mod telemetry;
pub mod web;
