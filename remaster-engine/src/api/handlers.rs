//! Request handlers for the control API

use crate::error::Error;
use crate::session::StreamSession;
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use remaster_common::events::SessionStateInfo;
use remaster_common::params::{MasteringPreset, ProcessingParameters};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Engine errors mapped onto HTTP statuses. Internal detail is logged, not
/// echoed to the client.
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Error::Common(remaster_common::Error::NotFound(m)) => {
                (StatusCode::NOT_FOUND, m.clone())
            }
            Error::Common(remaster_common::Error::InvalidInput(m))
            | Error::Common(remaster_common::Error::InvalidParameters(m)) => {
                (StatusCode::BAD_REQUEST, m.clone())
            }
            Error::InvalidState(m) => (StatusCode::CONFLICT, m.clone()),
            Error::CapacityExceeded(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "engine at capacity, retry shortly".to_string(),
            ),
            other => {
                warn!("request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// GET /health
pub async fn health(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "remaster-engine",
        "version": env!("CARGO_PKG_VERSION"),
        "active_jobs": state.engine.active_count(),
        "cache": state.cache.stats(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RegisterTrackRequest {
    /// Path relative to the library root
    pub path: PathBuf,
}

/// POST /library/tracks
pub async fn register_track(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<RegisterTrackRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    // Probing reads the file; keep it off the event loop
    let library = Arc::clone(&state.library);
    let info = tokio::task::spawn_blocking(move || library.register(&req.path))
        .await
        .map_err(|e| ApiError(Error::Internal(e.to_string())))??;
    Ok(Json(json!({
        "track_id": info.track_id,
        "sample_rate": info.sample_rate,
        "channels": info.channels,
        "duration_s": info.duration_s(),
    })))
}

/// GET /library/tracks
pub async fn list_tracks(State(state): State<Arc<SharedState>>) -> Json<serde_json::Value> {
    let tracks: Vec<_> = state
        .library
        .list()
        .into_iter()
        .map(|t| {
            json!({
                "track_id": t.track_id,
                "sample_rate": t.sample_rate,
                "channels": t.channels,
                "duration_s": t.duration_s(),
            })
        })
        .collect();
    Json(json!({ "tracks": tracks }))
}

#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub track_id: Uuid,
    #[serde(default)]
    pub preset: MasteringPreset,
    pub intensity: Option<f32>,
    /// Optional starting position, defaults to the top of the track
    pub position_s: Option<f64>,
}

/// POST /stream/start
pub async fn start_stream(
    State(state): State<Arc<SharedState>>,
    Json(req): Json<StartStreamRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let params = ProcessingParameters {
        preset: req.preset,
        intensity: req.intensity.unwrap_or(0.5),
    };
    params.validate().map_err(Error::from)?;

    // Admission probe: a fully busy gate turns new streams away with a
    // retryable 503 instead of queueing them invisibly. The probe permit
    // drops immediately; the session's producer acquires per chunk.
    state.engine.try_acquire()?;

    let track = state.resolver().resolve(req.track_id)?;
    let handle = StreamSession::spawn(
        state.session_context(),
        track,
        params,
        req.position_s.unwrap_or(0.0),
    )?;
    let stream_id = handle.stream_id();
    state.register_session(handle);

    Ok(Json(json!({ "stream_id": stream_id })))
}

/// POST /stream/:stream_id/pause
pub async fn pause_stream(
    State(state): State<Arc<SharedState>>,
    Path(stream_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let session = lookup(&state, stream_id)?;
    session.pause().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /stream/:stream_id/resume
pub async fn resume_stream(
    State(state): State<Arc<SharedState>>,
    Path(stream_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let session = lookup(&state, stream_id)?;
    session.resume().await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub position_s: f64,
}

/// POST /stream/:stream_id/seek
pub async fn seek_stream(
    State(state): State<Arc<SharedState>>,
    Path(stream_id): Path<Uuid>,
    Json(req): Json<SeekRequest>,
) -> ApiResult<StatusCode> {
    let session = lookup(&state, stream_id)?;
    session.seek(req.position_s).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /stream/:stream_id/stop
pub async fn stop_stream(
    State(state): State<Arc<SharedState>>,
    Path(stream_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let session = lookup(&state, stream_id)?;
    // Best effort: the session may already be ending on its own. Removal
    // here is eager; the session actor also deregisters itself on exit.
    let _ = session.stop().await;
    state.remove_session(stream_id);
    Ok(StatusCode::NO_CONTENT)
}

/// GET /stream/:stream_id/state
pub async fn stream_state(
    State(state): State<Arc<SharedState>>,
    Path(stream_id): Path<Uuid>,
) -> ApiResult<Json<serde_json::Value>> {
    let session = lookup(&state, stream_id)?;
    let session_state: SessionStateInfo = session.state();
    Ok(Json(json!({
        "stream_id": stream_id,
        "state": session_state,
    })))
}

fn lookup(
    state: &SharedState,
    stream_id: Uuid,
) -> std::result::Result<crate::session::StreamSessionHandle, ApiError> {
    state
        .session(stream_id)
        .ok_or_else(|| ApiError(Error::NotFound(format!("stream {}", stream_id))))
}
