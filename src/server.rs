//! HTTP surface
//!
//! Three routes plus the static landing page: `POST /screenshot` maps one
//! request onto one browser session, `GET /health` answers regardless of
//! browser availability, `GET /metrics` renders the Prometheus exposition.
//! The concurrency cap lives here as a semaphore: requests beyond it wait
//! briefly for a slot and are then rejected with 503 instead of being
//! accepted unboundedly.

use crate::capture::{Screenshot, Screenshotter};
use crate::config::Config;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{error, info, warn};

pub struct AppState {
    pub service: Arc<dyn Screenshotter>,
    capture_slots: Arc<Semaphore>,
    queue_wait: Duration,
    started_at: Instant,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        service: Arc<dyn Screenshotter>,
        config: &Config,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            service,
            capture_slots: Arc::new(Semaphore::new(config.max_concurrent_captures)),
            queue_wait: config.queue_wait,
            started_at: Instant::now(),
            metrics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScreenshotRequest {
    #[serde(default)]
    pub url: String,
}

pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    let static_pages = Router::new()
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=300, s-maxage=600"),
        ));

    Router::new()
        .route("/screenshot", post(take_screenshot))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(cors_layer(&config.allowed_origins))
        .fallback_service(static_pages)
        .with_state(state)
}

async fn take_screenshot(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScreenshotRequest>,
) -> Response {
    let target_url = request.url.trim().to_string();
    if target_url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "URL is required" })),
        )
            .into_response();
    }

    // Backpressure: each capture owns a whole browser process, so the slot
    // count is the bound on concurrent processes. Wait briefly, then shed.
    let _permit = match timeout(
        state.queue_wait,
        state.capture_slots.clone().acquire_owned(),
    )
    .await
    {
        Ok(Ok(permit)) => permit,
        _ => {
            warn!("capture slots exhausted, rejecting request for {target_url}");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Server is busy, try again later" })),
            )
                .into_response();
        }
    };

    info!("taking screenshot of {target_url}");
    match state.service.screenshot(&target_url).await {
        Ok(shot) => (
            [
                (header::CONTENT_TYPE, Screenshot::MIME),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"screenshot.png\"",
                ),
            ],
            shot.bytes,
        )
            .into_response(),
        Err(e) => {
            error!(stage = %e.stage(), "screenshot of {target_url} failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to take screenshot",
                    "details": e.public_detail(),
                })),
            )
                .into_response()
        }
    }
}

/// Liveness only; deliberately independent of browser availability.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "Screenshot service is running",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn render_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring malformed CORS origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::list(origins))
}
