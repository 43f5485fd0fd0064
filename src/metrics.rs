use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

use crate::http_server::AppState;

lazy_static! {
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["method", "endpoint"]
    )
    .unwrap();

    // Bot metrics
    pub static ref BOT_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("bot_commands_total", "Inbound text messages by the command they carried"),
        &["command"]
    )
    .unwrap();
    pub static ref LOGIN_CHALLENGES_ISSUED_TOTAL: IntCounter = IntCounter::new(
        "login_challenges_issued_total",
        "Total number of login challenges issued"
    )
    .unwrap();
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("login_attempts_total", "Signature submissions by outcome"),
        &["outcome"]
    )
    .unwrap();
    pub static ref TRANSPORT_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("transport_errors_total", "Failed calls to the messaging transport"),
        &["operation"]
    )
    .unwrap();
    pub static ref HOLDINGS_LOOKUP_ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("holdings_lookup_errors_total", "Failed NFT balance lookups by chain"),
        &["chain"]
    )
    .unwrap();
}

#[derive(Debug, Clone)]
pub struct Metrics {
    pub registry: Arc<Registry>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        #[cfg(target_os = "linux")]
        {
            let process_collector = ProcessCollector::for_self();
            registry.register(Box::new(process_collector)).unwrap();
        }

        registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone())).unwrap();
        registry.register(Box::new(HTTP_REQUEST_DURATION.clone())).unwrap();

        registry.register(Box::new(BOT_COMMANDS_TOTAL.clone())).unwrap();
        registry.register(Box::new(LOGIN_CHALLENGES_ISSUED_TOTAL.clone())).unwrap();
        registry.register(Box::new(LOGIN_ATTEMPTS_TOTAL.clone())).unwrap();
        registry.register(Box::new(TRANSPORT_ERRORS_TOTAL.clone())).unwrap();
        registry.register(Box::new(HOLDINGS_LOOKUP_ERRORS_TOTAL.clone())).unwrap();

        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;

        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Middleware for tracking HTTP metrics
pub async fn track_metrics(req: Request, next: Next) -> Response {
    let endpoint = req.uri().path().to_string();
    let method = req.method().clone();

    if endpoint == "/metrics" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;

    HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), &endpoint])
        .observe(start.elapsed().as_secs_f64());
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), &endpoint, &response.status().as_u16().to_string()])
        .inc();

    response
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("Failed to encode metrics"),
            )
        }
    }
}
