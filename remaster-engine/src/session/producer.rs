//! Chunk producer task
//!
//! One producer runs per session epoch (a start or a seek begins a new
//! epoch). It registers a job with the processing engine, then walks the
//! chunk specs in order: acquire a processing slot, dispatch decode+DSP to
//! the blocking pool, trim the trailing overlap for delivery, and push the
//! framed result into the bounded outbound queue. A full queue suspends the
//! producer; it never drops chunks and the queue never grows.
//!
//! The slot is held only across one chunk's decode+DSP: a producer that is
//! paused, or suspended on a full queue, occupies nothing at the gate and
//! other sessions keep processing.
//!
//! Cancellation is cooperative at chunk granularity: the stop flag is
//! checked between chunks and a closed outbound queue aborts the current
//! send. The job guard drops on every exit path, clearing the registry
//! entry under the engine's identity check.

use crate::error::{Error, Result};
use crate::library::TrackInfo;
use crate::processing::{ChunkTail, ChunkedAudioProcessor, ProcessingEngine};
use remaster_common::params::ProcessingParameters;
use remaster_common::ChunkSpec;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error};
use uuid::Uuid;

/// One chunk framed for transport: trailing overlap trimmed, leading
/// overlap already blended.
#[derive(Debug, Clone)]
pub(crate) struct FramedChunk {
    /// Chunk index within the track
    pub index: u32,
    /// Frames in the payload
    pub frame_count: u32,
    /// Interleaved f32 PCM
    pub samples: Vec<f32>,
}

pub(crate) struct ProducerConfig {
    pub session_key: Uuid,
    pub track: TrackInfo,
    pub params: ProcessingParameters,
    pub specs: Arc<Vec<ChunkSpec>>,
    pub start_index: usize,
}

/// Run the producer until end of track, stop, or error.
pub(crate) async fn run_producer(
    config: ProducerConfig,
    processor: Arc<ChunkedAudioProcessor>,
    engine: Arc<ProcessingEngine>,
    out_tx: mpsc::Sender<Result<FramedChunk>>,
    stop_rx: watch::Receiver<bool>,
) {
    // Registry entry for the whole epoch: identity only, no slot. Dropping
    // the guard on any exit below clears the entry if this job is still
    // the session's current one.
    let _guard = engine.submit(config.session_key);

    // Session state: the tail lives here, never shared across sessions
    let mut tail: Option<ChunkTail> = None;

    for idx in config.start_index..config.specs.len() {
        if *stop_rx.borrow() {
            debug!("producer for {} stopped at chunk {}", config.session_key, idx);
            return;
        }

        let spec = config.specs[idx];
        let has_next = idx + 1 < config.specs.len();
        let next_start = config.specs.get(idx + 1).map(|s| s.start_sample);

        // One slot per chunk: the permit moves into the blocking closure
        // and frees the moment decode+DSP returns, before the queue send.
        let permit = match engine.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                let _ = out_tx.send(Err(e)).await;
                return;
            }
        };

        // CPU-bound work goes to the blocking pool; the event loop only
        // awaits the result.
        let proc = Arc::clone(&processor);
        let track = config.track.clone();
        let params = config.params;
        let prev_tail = tail.take();
        let produced = tokio::task::spawn_blocking(move || {
            let _slot = permit;
            proc.process_chunk(&track, spec, &params, prev_tail.as_ref())
        })
        .await;

        let output = match produced {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let _ = out_tx.send(Err(e)).await;
                return;
            }
            Err(join_err) => {
                error!("chunk worker panicked: {}", join_err);
                let _ = out_tx
                    .send(Err(Error::Processing("chunk worker failed".to_string())))
                    .await;
                return;
            }
        };

        tail = output.tail;
        let chunk = output.chunk;

        // The delivered payload advances by the chunk interval: the
        // trailing overlap belongs to the next chunk's blend, so it is
        // trimmed here. The last chunk keeps everything it has.
        let total_frames = chunk.frame_count();
        let emit_frames = match (has_next, next_start) {
            (true, Some(next)) => {
                let interval = (next - chunk.spec.start_sample) as usize;
                interval.min(total_frames)
            }
            _ => total_frames,
        };

        let ch = chunk.channels as usize;
        let framed = FramedChunk {
            index: chunk.spec.index,
            frame_count: emit_frames as u32,
            samples: chunk.samples[..emit_frames * ch].to_vec(),
        };

        // Backpressure point: suspends while the bounded queue is full.
        // A closed queue means the session moved on (seek/stop/disconnect).
        if out_tx.send(Ok(framed)).await.is_err() {
            debug!("outbound queue closed, producer for {} exiting", config.session_key);
            return;
        }
    }

    debug!("producer for {} reached end of track", config.session_key);
}
