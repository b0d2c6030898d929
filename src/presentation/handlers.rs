// HTTP request handlers
use crate::application::station_service::ServiceError;
use crate::infrastructure::chunked_events::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Inbound message on `topic`. Each arrival also gives the reloader a chance
/// to check for a newer snapshot.
pub async fn ingest(
    Path(topic): Path<String>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Response {
    let received_ms = now_ms();

    let reloader = state.reloader.clone();
    tokio::spawn(async move {
        if let Err(e) = reloader.check(received_ms).await {
            tracing::warn!(error = %e, "snapshot reload failed");
        }
    });

    match state.service.ingest(topic, body, received_ms).await {
        Ok(report) => Json(report).into_response(),
        Err(ServiceError::Decode(e)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e @ ServiceError::Stopped) => {
            tracing::error!(error = %e, "ingest rejected");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Full dashboard state: registries, gauge values and every buffered point
pub async fn dashboard(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    match state.service.view().await {
        Ok(view) => match json_response(&view, accepts_brotli(&headers)).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => {
            tracing::error!(error = %e, "dashboard view unavailable");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// Live render events as length-prefixed chunks
pub async fn stream_events(headers: HeaderMap, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let compress = state.compress_streams && accepts_brotli(&headers);
    tracing::debug!(compress, "stream subscriber connected");
    stream_from_receiver(state.service.subscribe(), compress).await
}
