//! HTTP/SSE API for the Remaster engine
//!
//! Control is plain HTTP POST; delivery is SSE. A playback client starts a
//! stream, attaches to its event stream, and drives it with
//! pause/resume/seek/stop. After a transport drop the client re-arms the
//! session explicitly by re-issuing its last command (typically a fresh
//! start plus seek); the server never infers that streaming should resume.

pub mod handlers;
pub mod sse;

use crate::state::SharedState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Create the API router
pub fn create_router(state: Arc<SharedState>) -> Router {
    Router::new()
        // Health and diagnostics
        .route("/health", get(handlers::health))
        // Track registration (thin catalog seam for the binary)
        .route("/library/tracks", post(handlers::register_track))
        .route("/library/tracks", get(handlers::list_tracks))
        // Stream control
        .route("/stream/start", post(handlers::start_stream))
        .route("/stream/:stream_id/pause", post(handlers::pause_stream))
        .route("/stream/:stream_id/resume", post(handlers::resume_stream))
        .route("/stream/:stream_id/seek", post(handlers::seek_stream))
        .route("/stream/:stream_id/stop", post(handlers::stop_stream))
        .route("/stream/:stream_id/state", get(handlers::stream_state))
        // Stream delivery and firehose monitoring
        .route("/stream/:stream_id/events", get(sse::stream_events))
        .route("/events", get(sse::all_events))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP server until shutdown.
pub async fn serve(state: Arc<SharedState>) -> crate::error::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| crate::error::Error::Http(format!("bind {}: {}", bind_addr, e)))?;
    info!("listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .map_err(|e| crate::error::Error::Http(e.to_string()))
}
