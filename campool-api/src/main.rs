use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campool_api::{app, AppState};
use campool_core::repository::RideshareStore;
use campool_match::{CompatibilityEvaluator, MatchPolicy, MatchingEngine};
use campool_ride::{ExpirationSweeper, RideService};
use campool_store::MemoryStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campool_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = campool_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Campool API on port {}", config.server.port);

    let store: Arc<dyn RideshareStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn mockable::Clock> = Arc::new(mockable::DefaultClock);

    let policy = MatchPolicy {
        tolerance_minutes: config.matching.time_tolerance_minutes,
        campus_marker: config.matching.campus_marker.clone(),
    };

    let rides = Arc::new(RideService::new(Arc::clone(&store), Arc::clone(&clock)));
    let matching = Arc::new(MatchingEngine::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        CompatibilityEvaluator::new(policy),
    ));

    // Background expiry sweep
    let sweeper = ExpirationSweeper::new(Arc::clone(&store), Arc::clone(&clock));
    tokio::spawn(sweeper.run(Duration::from_secs(config.matching.sweep_interval_seconds)));

    let app_state = AppState {
        store,
        rides,
        matching,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
