use std::net::SocketAddr;
use std::sync::Arc;

use festbook_api::{app, app_config::Config, AppState};
use festbook_engine::{BookingEngine, InMemoryBookingStore, InMemoryCatalog, PromoRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "festbook_api=debug,festbook_engine=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!("Starting FestBook API on port {}", config.server.port);

    let catalog = Arc::new(InMemoryCatalog::new());
    let store = Arc::new(InMemoryBookingStore::new());
    let promos = Arc::new(PromoRegistry::new());

    let engine = BookingEngine::new(
        catalog.clone(),
        store,
        promos,
        config.business_rules.to_engine_rules(),
    );

    let app_state = AppState { engine, catalog };
    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
