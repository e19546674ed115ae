//! HTTP route handlers.

use axum::body::Bytes;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::{Span, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::cache::KvStore;
use crate::orchestrator::{ErrorClass, QueryError, WarmRoute};
use crate::provider::FlightTransport;
use crate::reference::ReferenceLookup;

use super::dto::*;
use super::quota::ANONYMOUS;
use super::state::AppState;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Response header echoing the request's correlation id.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Correlation id assigned to every request.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

/// Create the application router.
pub fn create_router<T, S, R>(state: AppState<T, S, R>) -> Router
where
    T: FlightTransport,
    S: KvStore,
    R: ReferenceLookup,
{
    Router::new()
        .route("/health", get(health))
        .route("/api/flights/best", get(best_flight::<T, S, R>))
        .route("/api/prefetch", post(prefetch::<T, S, R>))
        .route("/api/stats", get(stats::<T, S, R>))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(middleware::from_fn(assign_correlation_id))
}

async fn assign_correlation_id(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4();
    request.extensions_mut().insert(CorrelationId(id));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

fn request_span(request: &Request) -> Span {
    let correlation_id = request
        .extensions()
        .get::<CorrelationId>()
        .map(|id| id.0.to_string())
        .unwrap_or_default();
    info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        %correlation_id,
    )
}

/// The caller's quota identity.
fn caller(headers: &HeaderMap) -> &str {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .unwrap_or(ANONYMOUS)
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Best flight for a route.
async fn best_flight<T, S, R>(
    State(state): State<AppState<T, S, R>>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    headers: HeaderMap,
    Query(params): Query<BestFlightParams>,
) -> Result<Json<BestFlightResponse>, AppError>
where
    T: FlightTransport,
    S: KvStore,
    R: ReferenceLookup,
{
    let fail = |error| AppError::new(error, correlation_id);

    state.quota.check(caller(&headers)).await.map_err(fail)?;
    let query = params.into_query().map_err(fail)?;
    let answer = state.orchestrator.best_flight(query).await.map_err(fail)?;

    Ok(Json(BestFlightResponse::new(answer, correlation_id)))
}

/// Accept a list of routes to warm and run them in the background.
async fn prefetch<T, S, R>(
    State(state): State<AppState<T, S, R>>,
    Extension(CorrelationId(correlation_id)): Extension<CorrelationId>,
    body: Bytes,
) -> Result<(StatusCode, Json<PrefetchAccepted>), AppError>
where
    T: FlightTransport,
    S: KvStore,
    R: ReferenceLookup,
{
    let fail = |error| AppError::new(error, correlation_id);

    // Parse JSON manually so a bad body gets the usual error envelope
    let request: PrefetchRequest = serde_json::from_slice(&body)
        .map_err(|e| fail(QueryError::Validation(format!("invalid JSON: {e}"))))?;
    let routes = request
        .routes
        .iter()
        .map(PrefetchRoute::to_warm_route)
        .collect::<Result<Vec<WarmRoute>, _>>()
        .map_err(fail)?;

    let accepted = routes.len();
    info!(%correlation_id, routes = accepted, "prefetch accepted");

    let warmer = state.warmer.clone();
    tokio::spawn(async move {
        warmer.run(&routes).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(PrefetchAccepted {
            accepted,
            correlation_id,
        }),
    ))
}

/// Operational counters and breaker state.
async fn stats<T, S, R>(State(state): State<AppState<T, S, R>>) -> Json<StatsResponse>
where
    T: FlightTransport,
    S: KvStore,
    R: ReferenceLookup,
{
    Json(StatsResponse {
        counters: state.counters.snapshot(),
        breaker: state.orchestrator.adapter().breaker().snapshot(),
        in_flight: state.orchestrator.in_flight(),
        calibration_samples: state.orchestrator.calibration_samples(),
    })
}

/// Application error type.
///
/// Every failure leaves with its stable code, its class and the request's
/// correlation id.
#[derive(Debug)]
pub struct AppError {
    error: QueryError,
    correlation_id: Uuid,
}

impl AppError {
    pub fn new(error: QueryError, correlation_id: Uuid) -> Self {
        Self {
            error,
            correlation_id,
        }
    }
}

fn status_for(error: &QueryError) -> StatusCode {
    match error {
        QueryError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        _ => match error.class() {
            ErrorClass::Validation => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorClass::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError {
            error,
            correlation_id,
        } = self;
        let status = status_for(&error);
        let class = error.class();

        let message = match class {
            ErrorClass::Internal => {
                error!(%correlation_id, error = %error, "request failed");
                "internal error".to_string()
            }
            ErrorClass::UpstreamUnavailable => {
                warn!(%correlation_id, error = %error, "upstream unavailable");
                error.to_string()
            }
            _ => {
                debug!(%correlation_id, error = %error, "request rejected");
                error.to_string()
            }
        };

        let retry_after_secs = error.retry_after_secs();
        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: error.code(),
                class,
                message,
                correlation_id,
                retryable: error.is_retryable(),
                retry_after_secs,
            },
        });

        let mut response = (status, body).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
