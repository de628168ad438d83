//! Event types for the Remaster wire protocol
//!
//! These are the outbound events a streaming client consumes over SSE.
//! Chunk PCM payloads travel base64-encoded inside the JSON body.
//!
//! The `crossfade_already_applied` flag is part of the wire contract: the
//! server resolves chunk overlaps before framing, and the flag tells any
//! downstream layer that holds its own notion of overlap to apply no further
//! blending. Blending twice reintroduces the boundary energy dip the
//! equal-power fade exists to remove.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Remaster stream event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Stream descriptor, emitted once when a session enters Starting
    StreamStarted {
        stream_id: Uuid,
        sample_rate: u32,
        channels: u8,
        total_chunks: u32,
        total_duration_s: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One mastered chunk, ready for playback
    Chunk {
        stream_id: Uuid,
        /// Monotonically increasing per stream
        index: u32,
        /// Frames in this chunk (samples per channel)
        frame_count: u32,
        /// Base64-encoded little-endian f32 interleaved PCM
        samples_b64: String,
        /// Always true from this server; consumers must not re-blend overlaps
        crossfade_already_applied: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Stream finished (end of track, stop command, or disconnect)
    StreamEnded {
        stream_id: Uuid,
        reason: EndReason,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Terminal stream failure. `message` is a stable, generic description;
    /// diagnostic detail stays in the server log and never crosses the wire.
    StreamError {
        stream_id: Uuid,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session state transition (Starting, Streaming, Paused, ...)
    StateChanged {
        stream_id: Uuid,
        state: SessionStateInfo,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl StreamEvent {
    /// Stream this event belongs to
    pub fn stream_id(&self) -> Uuid {
        match self {
            StreamEvent::StreamStarted { stream_id, .. }
            | StreamEvent::Chunk { stream_id, .. }
            | StreamEvent::StreamEnded { stream_id, .. }
            | StreamEvent::StreamError { stream_id, .. }
            | StreamEvent::StateChanged { stream_id, .. } => *stream_id,
        }
    }

    /// Event name used as the SSE `event:` field
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::StreamStarted { .. } => "stream_started",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::StreamEnded { .. } => "stream_ended",
            StreamEvent::StreamError { .. } => "stream_error",
            StreamEvent::StateChanged { .. } => "state_changed",
        }
    }
}

/// Why a stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// All chunks delivered
    EndOfTrack,
    /// Client issued stop
    Stopped,
    /// Transport went away
    Disconnected,
}

/// Session state as reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStateInfo {
    Idle,
    Starting,
    Streaming,
    Paused,
    Ended,
    Errored,
}
