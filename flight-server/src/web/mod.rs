//! Web layer for the flight query service.
//!
//! A thin JSON surface over the orchestrator: best-flight queries, the
//! prefetch trigger, health and operational stats.

mod dto;
mod quota;
mod routes;
mod state;

pub use dto::*;
pub use quota::{ANONYMOUS, Quota, QuotaConfig};
pub use routes::{API_KEY_HEADER, AppError, CORRELATION_HEADER, CorrelationId, create_router};
pub use state::AppState;
