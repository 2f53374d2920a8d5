mod cache;
mod compiler;
mod config;
mod engine;
mod error;
mod executor;
mod handlers;
mod hasher;
mod models;
mod normaliser;
mod router;
mod validator;

use std::sync::Arc;

use axum::{routing::get, routing::post, Router};
use clickhouse::Client;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cache::InProcessCache;
use config::EngineConfig;
use engine::Engine;
use executor::ClickHouseWarehouse;
use router::TableRouter;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("cctv_chart_engine=debug,tower_http=debug")
        }))
        .init();

    let config_path = std::env::var("CHART_ENGINE_CONFIG")
        .unwrap_or_else(|_| "./chart_engine.toml".to_string());
    let config = EngineConfig::load(&config_path)?;

    let ch = Client::default()
        .with_url(&config.warehouse.url)
        .with_database(&config.warehouse.database)
        .with_user(&config.warehouse.user)
        .with_password(&config.warehouse.password);

    let router = TableRouter::new(config.tenants.tables.clone());
    let warehouse = Arc::new(ClickHouseWarehouse::new(ch));
    let cache = Arc::new(InProcessCache::new(config.cache.default_ttl_seconds));
    let engine = Arc::new(Engine::new(router, warehouse, cache));

    let state = AppState { engine };

    let app = Router::new()
        .route("/api/v1/charts/execute", post(handlers::charts::execute_chart))
        .route("/healthz", get(handlers::health::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!("cctv-chart-engine listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
