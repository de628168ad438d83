//! Stream session: per-connection delivery state machine
//!
//! States: `Idle → Starting → Streaming ⇄ Paused → Ended | Errored`.
//!
//! The session actor owns the delivery loop. Chunks arrive through a
//! bounded queue from the producer task (see [`producer`]); the actor
//! frames them as [`StreamEvent::Chunk`] with `crossfade_already_applied`
//! set, because the processor resolved all overlaps server-side.
//!
//! Pause is a flag the loop checks between chunks: it stops draining the
//! queue but never cancels the producer's job, so prebuffered chunks
//! survive and resume emits the next chunk without re-decoding anything.
//! Seek starts a new producer epoch, which drops the crossfade tail (the
//! old tail is no longer temporally adjacent) and supersedes the old job in
//! the engine registry; the old producer's late cleanup is identity-checked
//! there.
//!
//! On a processing error the session emits one terminal `stream_error`
//! event with a generic message and transitions to Errored; diagnostic
//! detail stays in the server log.

mod producer;

use crate::error::{Error, Result};
use crate::library::TrackInfo;
use crate::processing::{ChunkedAudioProcessor, ProcessingEngine};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use producer::{run_producer, FramedChunk, ProducerConfig};
use remaster_common::boundary;
use remaster_common::events::{EndReason, SessionStateInfo, StreamEvent};
use remaster_common::params::ProcessingParameters;
use remaster_common::ChunkSpec;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Commands a client can issue against a running session
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    Pause,
    Resume,
    Seek { position_s: f64 },
    Stop,
}

/// Called with the stream id when a session reaches a terminal state, so
/// the owning registry can drop its handle.
pub type SessionCleanup = Arc<dyn Fn(Uuid) + Send + Sync>;

/// Everything a session needs from the engine environment
#[derive(Clone)]
pub struct SessionContext {
    pub processor: Arc<ChunkedAudioProcessor>,
    pub engine: Arc<ProcessingEngine>,
    pub event_tx: broadcast::Sender<StreamEvent>,
    pub chunk_duration_s: f64,
    pub chunk_interval_s: f64,
    pub outbound_queue_chunks: usize,
    /// Invoked once when the session ends or errors; `None` leaves
    /// deregistration to the caller
    pub cleanup: Option<SessionCleanup>,
}

/// Handle held by the transport layer for one stream
#[derive(Clone)]
pub struct StreamSessionHandle {
    stream_id: Uuid,
    cmd_tx: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<SessionStateInfo>,
}

impl StreamSessionHandle {
    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn state(&self) -> SessionStateInfo {
        *self.state_rx.borrow()
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.send(SessionCommand::Resume).await
    }

    pub async fn seek(&self, position_s: f64) -> Result<()> {
        if !position_s.is_finite() || position_s < 0.0 {
            return Err(Error::Common(remaster_common::Error::InvalidInput(
                format!("seek position must be non-negative, got {}", position_s),
            )));
        }
        self.send(SessionCommand::Seek { position_s }).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send(SessionCommand::Stop).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| Error::InvalidState("session already ended".to_string()))
    }
}

/// One streaming session
pub struct StreamSession;

impl StreamSession {
    /// Validate, emit the stream descriptor, and spawn the session actor.
    pub fn spawn(
        ctx: SessionContext,
        track: TrackInfo,
        params: ProcessingParameters,
        start_position_s: f64,
    ) -> Result<StreamSessionHandle> {
        params.validate().map_err(Error::from)?;

        let specs = boundary::boundaries_for(
            track.duration_samples,
            track.sample_rate,
            ctx.chunk_duration_s,
            ctx.chunk_interval_s,
        )?;
        let start_index = position_to_index(start_position_s, ctx.chunk_interval_s, specs.len())?;

        let stream_id = Uuid::new_v4();
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (state_tx, state_rx) = watch::channel(SessionStateInfo::Starting);

        let handle = StreamSessionHandle {
            stream_id,
            cmd_tx,
            state_rx,
        };

        info!(
            "stream {} starting: track {}, {} chunks, preset {}",
            stream_id,
            track.track_id,
            specs.len(),
            params.preset
        );

        let actor = SessionActor {
            ctx,
            stream_id,
            track,
            params,
            specs: Arc::new(specs),
            state_tx,
        };
        tokio::spawn(actor.run(cmd_rx, start_index));

        Ok(handle)
    }
}

fn position_to_index(position_s: f64, interval_s: f64, total: usize) -> Result<usize> {
    let index = boundary::chunk_index_for(position_s, interval_s)? as usize;
    Ok(index.min(total))
}

struct SessionActor {
    ctx: SessionContext,
    stream_id: Uuid,
    track: TrackInfo,
    params: ProcessingParameters,
    specs: Arc<Vec<ChunkSpec>>,
    state_tx: watch::Sender<SessionStateInfo>,
}

/// A producer epoch: queue receiver plus the stop flag for the running task
struct Epoch {
    out_rx: mpsc::Receiver<Result<FramedChunk>>,
    stop_tx: watch::Sender<bool>,
}

impl SessionActor {
    async fn run(self, mut cmd_rx: mpsc::Receiver<SessionCommand>, start_index: usize) {
        self.emit(StreamEvent::StreamStarted {
            stream_id: self.stream_id,
            sample_rate: self.track.sample_rate,
            channels: self.track.channels,
            total_chunks: self.specs.len() as u32,
            total_duration_s: self.track.duration_s(),
            timestamp: chrono::Utc::now(),
        });
        self.set_state(SessionStateInfo::Starting);

        let mut epoch = self.start_epoch(start_index);
        let mut paused = false;
        let mut streaming = false;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    None => {
                        // Every handle dropped: transport disconnect. End
                        // the session; re-arming after reconnect is the
                        // client's job via a fresh start command.
                        self.finish(epoch, EndReason::Disconnected);
                        return;
                    }
                    Some(SessionCommand::Pause) => {
                        if !paused {
                            paused = true;
                            // Producer keeps filling the bounded queue and
                            // suspends when it is full; its job survives.
                            self.set_state(SessionStateInfo::Paused);
                        }
                    }
                    Some(SessionCommand::Resume) => {
                        if paused {
                            paused = false;
                            self.set_state(if streaming {
                                SessionStateInfo::Streaming
                            } else {
                                SessionStateInfo::Starting
                            });
                        }
                    }
                    Some(SessionCommand::Seek { position_s }) => {
                        let index = match position_to_index(
                            position_s,
                            self.ctx.chunk_interval_s,
                            self.specs.len(),
                        ) {
                            Ok(index) => index,
                            Err(e) => {
                                debug!("stream {}: bad seek: {}", self.stream_id, e);
                                continue;
                            }
                        };
                        debug!("stream {}: seek to chunk {}", self.stream_id, index);
                        // New epoch: the old tail is not adjacent to the
                        // seek target, so the fresh producer starts with no
                        // tail. The superseded job cleans itself up under
                        // the engine's identity check.
                        self.stop_epoch(epoch);
                        epoch = self.start_epoch(index);
                        paused = false;
                        streaming = false;
                        self.set_state(SessionStateInfo::Starting);
                    }
                    Some(SessionCommand::Stop) => {
                        self.finish(epoch, EndReason::Stopped);
                        return;
                    }
                },
                framed = epoch.out_rx.recv(), if !paused => match framed {
                    None => {
                        self.finish(epoch, EndReason::EndOfTrack);
                        return;
                    }
                    Some(Ok(framed)) => {
                        if !streaming {
                            streaming = true;
                            self.set_state(SessionStateInfo::Streaming);
                        }
                        self.emit_chunk(framed);
                    }
                    Some(Err(e)) => {
                        // Full detail server-side only; the wire gets a
                        // stable generic message.
                        error!("stream {} failed: {}", self.stream_id, e);
                        self.emit(StreamEvent::StreamError {
                            stream_id: self.stream_id,
                            message: "processing failed".to_string(),
                            timestamp: chrono::Utc::now(),
                        });
                        self.set_state(SessionStateInfo::Errored);
                        self.stop_epoch(epoch);
                        self.cleanup();
                        return;
                    }
                },
            }
        }
    }

    fn start_epoch(&self, start_index: usize) -> Epoch {
        let (out_tx, out_rx) = mpsc::channel(self.ctx.outbound_queue_chunks);
        let (stop_tx, stop_rx) = watch::channel(false);

        let config = ProducerConfig {
            session_key: self.stream_id,
            track: self.track.clone(),
            params: self.params,
            specs: Arc::clone(&self.specs),
            start_index,
        };
        tokio::spawn(run_producer(
            config,
            Arc::clone(&self.ctx.processor),
            Arc::clone(&self.ctx.engine),
            out_tx,
            stop_rx,
        ));

        Epoch { out_rx, stop_tx }
    }

    /// Signal the producer to stop between chunks and unblock any pending
    /// send by dropping the receiver.
    fn stop_epoch(&self, epoch: Epoch) {
        let _ = epoch.stop_tx.send(true);
        drop(epoch.out_rx);
    }

    fn finish(&self, epoch: Epoch, reason: EndReason) {
        self.stop_epoch(epoch);
        // Deregister before announcing the end, so a client reacting to
        // stream_ended never finds a stale handle.
        self.cleanup();
        self.emit(StreamEvent::StreamEnded {
            stream_id: self.stream_id,
            reason,
            timestamp: chrono::Utc::now(),
        });
        self.set_state(SessionStateInfo::Ended);
        info!("stream {} ended: {:?}", self.stream_id, reason);
    }

    /// Remove this session from the owning registry, if one was attached.
    fn cleanup(&self) {
        if let Some(callback) = &self.ctx.cleanup {
            callback(self.stream_id);
        }
    }

    fn emit_chunk(&self, framed: FramedChunk) {
        let mut bytes = Vec::with_capacity(framed.samples.len() * 4);
        for sample in &framed.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        self.emit(StreamEvent::Chunk {
            stream_id: self.stream_id,
            index: framed.index,
            frame_count: framed.frame_count,
            samples_b64: BASE64.encode(&bytes),
            // The processor blended every overlap already; any downstream
            // layer with its own overlap notion must apply no further fade.
            crossfade_already_applied: true,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine (client may still be attaching to SSE)
        let _ = self.ctx.event_tx.send(event);
    }

    fn set_state(&self, state: SessionStateInfo) {
        let changed = *self.state_tx.borrow() != state;
        let _ = self.state_tx.send(state);
        if changed {
            self.emit(StreamEvent::StateChanged {
                stream_id: self.stream_id,
                state,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
