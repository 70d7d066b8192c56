//! hexcore API server entry point.

use std::sync::Arc;

use hexcore_api::bootstrap::{Adapters, build_dispatcher};
use hexcore_api::config::AppConfig;
use hexcore_api::error::AppError;
use hexcore_api::routes;
use hexcore_api::state::AppState;
use hexcore_api::telemetry::{FacadeMetrics, init_tracing, install_metrics_exporter};
use hexcore_core::clock::SystemClock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing();

    tracing::info!("Starting hexcore API server");

    let config = AppConfig::from_env()?;
    let pipeline = config.pipeline()?;
    let addr = config.socket_addr()?;
    install_metrics_exporter(config.metrics_addr()?)?;

    let adapters = Adapters::postgres(&config).await?;
    let dispatcher = build_dispatcher(
        adapters,
        &pipeline,
        Arc::new(SystemClock),
        Arc::new(FacadeMetrics),
    )?;

    let app = routes::app(AppState::new(dispatcher))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
