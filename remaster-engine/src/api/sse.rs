//! SSE delivery of stream events
//!
//! Backed by the shared broadcast channel: each SSE connection subscribes
//! and converts `StreamEvent`s to SSE frames. The per-stream endpoint
//! filters to one stream id; `/events` is the unfiltered firehose for
//! monitoring.
//!
//! A broadcast lag (slow SSE consumer falling behind the buffer) is logged
//! and skipped; the bounded in-session queue is what protects memory, the
//! broadcast buffer only decouples transport jitter.

use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

fn event_stream(
    state: Arc<SharedState>,
    filter: Option<Uuid>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let rx = state.subscribe_events();
    BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(stream_event) => {
                if let Some(wanted) = filter {
                    if stream_event.stream_id() != wanted {
                        return None;
                    }
                }
                Event::default()
                    .event(stream_event.event_name())
                    .json_data(&stream_event)
                    .ok()
                    .map(Ok)
            }
            Err(e) => {
                warn!("SSE subscriber lagged: {:?}", e);
                None
            }
        }
    })
}

/// GET /stream/:stream_id/events
pub async fn stream_events(
    State(state): State<Arc<SharedState>>,
    Path(stream_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE client attached to stream {}", stream_id);
    Sse::new(event_stream(state, Some(stream_id))).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}

/// GET /events
pub async fn all_events(
    State(state): State<Arc<SharedState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("SSE client attached to event firehose");
    Sse::new(event_stream(state, None)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
