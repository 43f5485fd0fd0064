use axum::{middleware, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::metrics::{metrics_handler, track_metrics, Metrics};

#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    #[error("Failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

pub type HttpServerResult<T> = Result<T, HttpServerError>;

#[derive(Debug, Clone)]
pub struct AppState {
    pub metrics: Arc<Metrics>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}

/// Operational endpoints only; all user interaction happens in chat.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(track_metrics)),
        )
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        service: "NFTChat".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn start_server(state: AppState, bind_address: &str) -> HttpServerResult<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .map_err(|e| HttpServerError::Bind(bind_address.to_string(), e))?;

    tracing::info!("HTTP server listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
