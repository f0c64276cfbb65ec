// HTTP request handlers
use crate::application::error::MonitorError;
use crate::infrastructure::chunked_json::stream_from_updates;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub job_id: String,
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = match &self {
            MonitorError::StreamClosed { .. } => StatusCode::CONFLICT,
            MonitorError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = match &self {
            MonitorError::StreamClosed { session_id } => json!({
                "error": self.to_string(),
                "sessionId": session_id,
            }),
            MonitorError::Unavailable => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

async fn respond<T: Serialize>(result: Result<T, MonitorError>, compress: bool) -> Response {
    match result {
        Ok(data) => match json_response(&data, compress).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => e.into_response(),
    }
}

async fn respond_device<T: Serialize>(
    device_id: &str,
    result: Result<Option<T>, MonitorError>,
    compress: bool,
) -> Response {
    match result {
        Ok(Some(data)) => respond(Ok::<_, MonitorError>(data), compress).await,
        Ok(None) => {
            tracing::debug!(device_id, "Unknown device requested");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("unknown device `{}`", device_id) })),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn status(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    respond(state.monitor.status().await, accepts_brotli(&headers)).await
}

/// Track a job context; switching jobs resets every store
pub async fn track_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackRequest>,
) -> Response {
    let result = state
        .monitor
        .track(request.job_id)
        .await
        .map(|reset| json!({ "reset": reset }));
    respond(result, false).await
}

/// Ingest a single frame or an array of frames
pub async fn ingest(State(state): State<Arc<AppState>>, Json(payload): Json<Value>) -> Response {
    respond(state.monitor.ingest(payload).await, false).await
}

pub async fn clear_stores(State(state): State<Arc<AppState>>) -> Response {
    match state.monitor.clear().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn reconnect(State(state): State<Arc<AppState>>) -> Response {
    let result = state
        .monitor
        .reconnect()
        .await
        .map(|reopened| json!({ "reopened": reopened }));
    respond(result, false).await
}

pub async fn list_devices(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    respond(state.monitor.devices().await, accepts_brotli(&headers)).await
}

pub async fn device_dashboard(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    respond_device(&id, state.monitor.dashboard(&id).await, accepts_brotli(&headers)).await
}

pub async fn device_chart(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    respond_device(&id, state.monitor.chart(&id).await, accepts_brotli(&headers)).await
}

pub async fn device_faults(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    respond_device(&id, state.monitor.faults(&id).await, accepts_brotli(&headers)).await
}

pub async fn device_events(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    respond_device(&id, state.monitor.events(&id).await, accepts_brotli(&headers)).await
}

pub async fn device_alerts(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    respond_device(&id, state.monitor.alerts(&id).await, accepts_brotli(&headers)).await
}

/// Live updates as length-prefixed JSON chunks
pub async fn stream_updates(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    stream_from_updates(state.monitor.subscribe(), accepts_brotli(&headers))
}

#[cfg(test)]
mod tests {
    use crate::application::metadata_resolver::NullMetadataResolver;
    use crate::application::monitor_service::{MonitorService, MonitorSettings};
    use crate::application::monitor_session::SessionSettings;
    use crate::infrastructure::memory_persistence::InMemoryPersistence;
    use crate::presentation::app_state::AppState;
    use crate::presentation::router::build_router;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        let monitor = MonitorService::start(
            MonitorSettings {
                session: SessionSettings::default(),
                idle_timeout: None,
            },
            Arc::new(InMemoryPersistence::default()),
            Arc::new(NullMetadataResolver),
        )
        .await;
        build_router(Arc::new(AppState { monitor }))
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app().await.oneshot(get("/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ingest_then_query_device() {
        let app = app().await;
        let frame = json!({
            "deviceId": "D1",
            "timestamp": "2024-05-01T10:00:00Z",
            "speed": 72,
            "rpm": 2100,
            "fuelLevel": 55,
            "obdFaults": ["P0135"],
            "eventType": 2,
            "eventGValue": 0.45
        });

        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/ingest", frame))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["accepted"], 1);

        let chart = read_json(app.clone().oneshot(get("/devices/D1/chart")).await.unwrap()).await;
        assert_eq!(chart["performance"].as_array().unwrap().len(), 1);
        assert_eq!(chart["performance"][0]["classification"], "braking");

        let faults = read_json(app.clone().oneshot(get("/devices/D1/faults")).await.unwrap()).await;
        assert_eq!(faults[0]["code"], "P0135");

        let alerts = read_json(app.clone().oneshot(get("/devices/D1/alerts")).await.unwrap()).await;
        assert_eq!(alerts["speedAlert"], true);

        let devices = read_json(app.oneshot(get("/devices")).await.unwrap()).await;
        assert_eq!(devices[0]["deviceId"], "D1");
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let response = app().await.oneshot(get("/devices/nope/chart")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_closed_stream_returns_conflict_until_reconnect() {
        let app = app().await;
        app.clone()
            .oneshot(json_request(Method::PUT, "/session", json!({ "jobId": "job-9" })))
            .await
            .unwrap();
        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/ingest",
                json!({ "sessionId": "job-9", "timeoutSeconds": 60 }),
            ))
            .await
            .unwrap();

        let frame = json!({ "deviceId": "D1", "speed": 10 });
        let response = app
            .clone()
            .oneshot(json_request(Method::POST, "/ingest", frame.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(read_json(response).await["sessionId"], "job-9");

        let status = read_json(app.clone().oneshot(get("/status")).await.unwrap()).await;
        assert_eq!(status["stream"]["state"], "closed");

        let response = app
            .clone()
            .oneshot(Request::post("/reconnect").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(read_json(response).await["reopened"], true);

        let response = app
            .oneshot(json_request(Method::POST, "/ingest", frame))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_clear_stores() {
        let app = app().await;
        app.clone()
            .oneshot(json_request(Method::POST, "/ingest", json!({ "deviceId": "D1" })))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(Request::delete("/stores").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let devices = read_json(app.oneshot(get("/devices")).await.unwrap()).await;
        assert!(devices.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_brotli_when_accepted() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/status")
                    .header(header::ACCEPT_ENCODING, "br")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "br");
    }
}
