//! Cache store: versioned route results, confirmed-empty markers,
//! last-known-good snapshots and reference data over one [`KvStore`].

mod config;
mod entry;
mod key;
mod route;
mod store;

pub use config::{CacheConfig, MAX_LKG_CAPACITY, MAX_ROUTE_TTL, MIN_ROUTE_TTL, RouteTtlPolicy};
pub use entry::{Freshness, LkgRing, LkgSnapshot, NegativeCacheEntry, RouteCacheEntry};
pub use key::{RouteKey, criteria_hash};
pub use route::{CacheStore, RouteLookup};
pub use store::{KvStore, MokaStore, StoreError};
