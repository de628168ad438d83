//! # Remaster Engine Library (remaster-engine)
//!
//! Chunked real-time audio mastering and streaming engine.
//!
//! **Purpose:** Split a track into overlapping windows, run each window
//! through the mastering DSP chain, stitch processed windows back together
//! with equal-power crossfades, and deliver the result incrementally over
//! HTTP/SSE with pause, seek, and reconnect support.
//!
//! **Architecture:** tokio event loop for sessions and transport; decode and
//! DSP dispatched to the blocking pool; bounded outbound queues for
//! backpressure; an LRU chunk cache shared across sessions.

pub mod api;
pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod library;
pub mod processing;
pub mod session;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
