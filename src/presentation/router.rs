// HTTP router assembly
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    clear_stores, device_alerts, device_chart, device_dashboard, device_events, device_faults,
    health_check, ingest, list_devices, reconnect, status, stream_updates, track_session,
};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is applied per response in the handlers, so no CompressionLayer here
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/status", get(status))
        .route("/session", put(track_session))
        .route("/ingest", post(ingest))
        .route("/stores", delete(clear_stores))
        .route("/reconnect", post(reconnect))
        .route("/devices", get(list_devices))
        .route("/devices/:id", get(device_dashboard))
        .route("/devices/:id/chart", get(device_chart))
        .route("/devices/:id/faults", get(device_faults))
        .route("/devices/:id/events", get(device_events))
        .route("/devices/:id/alerts", get(device_alerts))
        .route("/updates", get(stream_updates))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
