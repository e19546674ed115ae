use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use flight_server::cache::{CacheStore, MokaStore};
use flight_server::clock::{Clock, SystemClock};
use flight_server::config::{
    AppConfig, PROVIDER_TOKEN_VAR, REFERENCE_REFRESH_INTERVAL, UpstreamConfig,
};
use flight_server::orchestrator::{Orchestrator, PrefetchWarmer};
use flight_server::provider::{
    AnyTransport, EnvCredential, FixtureTransport, HttpTransport, ProviderAdapter,
};
use flight_server::reference::{ReferenceClient, ReferenceData, ReferenceSnapshot};
use flight_server::telemetry::{Counters, EventSink, Fanout, TracingSink};
use flight_server::web::{AppState, Quota, create_router};

/// Reference file read from the fixture directory when no API is configured.
const FIXTURE_REFERENCE_FILE: &str = "reference.json";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flight_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let counters = Arc::new(Counters::new());
    let events: Arc<dyn EventSink> = Arc::new(
        Fanout::new()
            .with(Arc::new(TracingSink))
            .with(counters.clone()),
    );

    // Reference data: snapshot first, network if the snapshot is stale
    let reference_client = config
        .reference
        .clone()
        .map(ReferenceClient::new)
        .transpose()
        .expect("Failed to create reference client");
    let refreshable = reference_client.is_some();
    let static_reference = match &config.upstream {
        UpstreamConfig::Fixtures(dir) if !refreshable => Some(dir.join(FIXTURE_REFERENCE_FILE))
            .filter(|path| path.is_file()),
        _ => None,
    };
    let reference = match static_reference {
        Some(path) => ReferenceData::from_file(&path).expect("Failed to load reference file"),
        None => ReferenceData::load(
            reference_client,
            Some(ReferenceSnapshot::new(config.snapshot.clone())),
        )
        .await
        .expect("Failed to load reference data"),
    };
    info!(
        airports = reference.airport_count().await,
        airlines = reference.airline_count().await,
        "reference data loaded"
    );

    if refreshable {
        let reference_refresh = reference.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFERENCE_REFRESH_INTERVAL);
            interval.tick().await; // First tick is immediate, skip it
            loop {
                interval.tick().await;
                match reference_refresh.refresh().await {
                    Ok(count) => info!(count, "refreshed reference data"),
                    Err(e) => warn!(error = %e, "failed to refresh reference data"),
                }
            }
        });
    }

    let transport = match &config.upstream {
        UpstreamConfig::Http(provider) => {
            if std::env::var(PROVIDER_TOKEN_VAR).is_err() {
                warn!("{PROVIDER_TOKEN_VAR} not set; upstream calls will fail");
            }
            let credentials = Arc::new(EnvCredential::new(PROVIDER_TOKEN_VAR));
            AnyTransport::Http(
                HttpTransport::new(provider.clone(), credentials)
                    .expect("Failed to create provider client"),
            )
        }
        UpstreamConfig::Fixtures(dir) => {
            let fixtures = FixtureTransport::new(dir).expect("Failed to load fixtures");
            info!(
                dir = %dir.display(),
                routes = fixtures.route_count(),
                "serving upstream from fixtures"
            );
            AnyTransport::Fixture(fixtures)
        }
    };

    let adapter = ProviderAdapter::new(
        transport,
        config.retry.clone(),
        config.breaker.clone(),
        clock.clone(),
        events.clone(),
    );
    let cache = CacheStore::new(
        MokaStore::new(config.cache.max_capacity),
        config.cache.clone(),
        clock.clone(),
        events.clone(),
    );
    let orchestrator = Orchestrator::new(
        adapter,
        cache,
        reference,
        config.orchestrator.clone(),
        clock,
        events,
    );
    let warmer = PrefetchWarmer::new(orchestrator.clone(), config.warmer.clone());

    let state = AppState::new(orchestrator, warmer, counters, Quota::new(config.quota.clone()));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .expect("Failed to bind listen address");
    info!(addr = %config.listen_addr, "flight server listening");
    info!("  GET  /health            - Health check");
    info!("  GET  /api/flights/best  - Best flight for a route");
    info!("  POST /api/prefetch      - Warm a list of routes");
    info!("  GET  /api/stats         - Operational counters");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
    }
}
