//! Session integration tests
//!
//! Drives a full session actor (producer, engine gate, bounded queue, event
//! broadcast) over a synthetic decoder and asserts the delivery contract:
//! ordered flagged chunks, pause without job cancellation, seek restarting
//! at the target chunk, and clean stop.

use remaster_common::events::{EndReason, SessionStateInfo, StreamEvent};
use remaster_common::params::{MasteringPreset, ProcessingParameters};
use remaster_engine::audio::{AudioChunk, ChunkDecoder};
use remaster_engine::config::Config;
use remaster_engine::error::Result;
use remaster_engine::library::TrackInfo;
use remaster_engine::state::SharedState;
use remaster_engine::processing::{ChunkedAudioProcessor, ProcessingCache, ProcessingEngine};
use remaster_engine::session::{SessionCleanup, SessionContext, StreamSession};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::timeout;
use uuid::Uuid;

// 1 kHz nominal rate keeps the synthetic track small: 1.5 s windows every
// 1.0 s give 1500-frame chunks with a 500-frame overlap, and a 5000-frame
// track splits into 5 chunks.
const SAMPLE_RATE: u32 = 1000;
const TRACK_FRAMES: u64 = 5000;
const TOTAL_CHUNKS: usize = 5;

/// Ramp decoder with a call counter, for asserting that pause and resume
/// never re-decode. The optional per-call delay paces delivery so that
/// commands issued mid-stream land before the track runs out.
struct CountingDecoder {
    calls: AtomicUsize,
    total_frames: u64,
    delay: Duration,
}

impl CountingDecoder {
    fn new(total_frames: u64) -> Arc<Self> {
        Self::paced(total_frames, Duration::ZERO)
    }

    fn paced(total_frames: u64, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            total_frames,
            delay,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChunkDecoder for CountingDecoder {
    fn decode_range(
        &self,
        track: &TrackInfo,
        start_sample: u64,
        length_samples: u32,
    ) -> Result<AudioChunk> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            // Runs on the blocking pool, so a real sleep is fine
            std::thread::sleep(self.delay);
        }
        let end = (start_sample + length_samples as u64).min(self.total_frames);
        let mut samples = Vec::new();
        for frame in start_sample..end {
            samples.push(((frame % 100) as f32 / 100.0) - 0.5);
        }
        Ok(AudioChunk::new(samples, track.sample_rate, 1))
    }
}

fn make_context(
    decoder: Arc<dyn ChunkDecoder>,
) -> (SessionContext, broadcast::Receiver<StreamEvent>) {
    make_context_with(decoder, 4, None)
}

fn make_context_with(
    decoder: Arc<dyn ChunkDecoder>,
    max_jobs: usize,
    cleanup: Option<SessionCleanup>,
) -> (SessionContext, broadcast::Receiver<StreamEvent>) {
    let (event_tx, event_rx) = broadcast::channel(256);
    let cache = Arc::new(ProcessingCache::new(16));
    let processor = Arc::new(ChunkedAudioProcessor::new(decoder, cache, 1.5, 1.0));
    let ctx = SessionContext {
        processor,
        engine: ProcessingEngine::new(max_jobs),
        event_tx,
        chunk_duration_s: 1.5,
        chunk_interval_s: 1.0,
        outbound_queue_chunks: 4,
        cleanup,
    };
    (ctx, event_rx)
}

fn track() -> TrackInfo {
    TrackInfo {
        track_id: Uuid::new_v4(),
        path: PathBuf::from("/synthetic"),
        sample_rate: SAMPLE_RATE,
        channels: 1,
        duration_samples: TRACK_FRAMES,
        source_signature: 11,
    }
}

fn params() -> ProcessingParameters {
    ProcessingParameters {
        preset: MasteringPreset::Flat,
        intensity: 0.5,
    }
}

async fn next_event(rx: &mut broadcast::Receiver<StreamEvent>) -> StreamEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test]
async fn chunks_arrive_in_order_flagged_and_complete() {
    let decoder = CountingDecoder::new(TRACK_FRAMES);
    let (ctx, mut rx) = make_context(decoder);
    let _handle = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();

    let mut chunk_indices = Vec::new();
    let mut total_frames = 0u64;
    let mut saw_started = false;
    loop {
        match next_event(&mut rx).await {
            StreamEvent::StreamStarted {
                sample_rate,
                total_chunks,
                ..
            } => {
                saw_started = true;
                assert_eq!(sample_rate, SAMPLE_RATE);
                assert_eq!(total_chunks as usize, TOTAL_CHUNKS);
            }
            StreamEvent::Chunk {
                index,
                frame_count,
                crossfade_already_applied,
                ..
            } => {
                assert!(crossfade_already_applied, "every chunk carries the flag");
                chunk_indices.push(index);
                total_frames += frame_count as u64;
            }
            StreamEvent::StreamEnded { reason, .. } => {
                assert_eq!(reason, EndReason::EndOfTrack);
                break;
            }
            StreamEvent::StreamError { message, .. } => panic!("stream failed: {}", message),
            StreamEvent::StateChanged { .. } => {}
        }
    }

    assert!(saw_started, "descriptor must precede chunks");
    assert_eq!(chunk_indices, vec![0, 1, 2, 3, 4]);
    // Trimmed interior chunks advance by the interval; together the
    // delivered frames cover the track exactly once.
    assert_eq!(total_frames, TRACK_FRAMES);
}

#[tokio::test]
async fn pause_holds_delivery_without_cancelling_the_job() {
    let decoder = CountingDecoder::paced(TRACK_FRAMES, Duration::from_millis(100));
    let (ctx, mut rx) = make_context(Arc::clone(&decoder) as _);
    let handle = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();

    // Wait for the first chunk, then pause
    let mut last_index = loop {
        if let StreamEvent::Chunk { index, .. } = next_event(&mut rx).await {
            break index;
        }
    };
    handle.pause().await.unwrap();

    // Drain until the pause transition shows up; chunks already emitted
    // before the command landed are fine.
    loop {
        match next_event(&mut rx).await {
            StreamEvent::StateChanged {
                state: SessionStateInfo::Paused,
                ..
            } => break,
            StreamEvent::Chunk { index, .. } => last_index = index,
            _ => {}
        }
    }

    // Broadcast order proves causality: nothing may follow the pause
    // transition until resume.
    let quiet = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(quiet.is_err(), "no events may be emitted while paused");
    assert_eq!(handle.state(), SessionStateInfo::Paused);

    handle.resume().await.unwrap();
    let next_index = loop {
        if let StreamEvent::Chunk { index, .. } = next_event(&mut rx).await {
            break index;
        }
    };
    assert_eq!(
        next_index,
        last_index + 1,
        "resume continues exactly where delivery stopped"
    );

    // Run to completion; each chunk was decoded at most once, so the
    // producer's job survived the pause.
    loop {
        if let StreamEvent::StreamEnded { reason, .. } = next_event(&mut rx).await {
            assert_eq!(reason, EndReason::EndOfTrack);
            break;
        }
    }
    assert!(
        decoder.calls() <= TOTAL_CHUNKS,
        "pause must not force re-decoding (saw {} decode calls)",
        decoder.calls()
    );
}

#[tokio::test]
async fn seek_restarts_delivery_at_the_target_chunk() {
    let decoder = CountingDecoder::paced(TRACK_FRAMES, Duration::from_millis(100));
    let (ctx, mut rx) = make_context(decoder);
    let handle = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();

    // Let the first chunk land so the seek hits a running delivery loop
    loop {
        if let StreamEvent::Chunk { .. } = next_event(&mut rx).await {
            break;
        }
    }

    // Seek to 3.0 s: chunk interval 1.0 s puts that at chunk 3
    handle.seek(3.0).await.unwrap();

    let mut indices = Vec::new();
    loop {
        match next_event(&mut rx).await {
            StreamEvent::Chunk { index, .. } => indices.push(index),
            StreamEvent::StreamEnded { reason, .. } => {
                assert_eq!(reason, EndReason::EndOfTrack);
                break;
            }
            StreamEvent::StreamError { message, .. } => panic!("stream failed: {}", message),
            _ => {}
        }
    }

    // Chunks framed before the seek landed may still appear, but delivery
    // must finish with the post-seek run 3, 4 and nothing after it.
    assert!(
        indices.ends_with(&[3, 4]),
        "post-seek delivery must run 3 then 4, got {:?}",
        indices
    );
}

#[tokio::test]
async fn stop_ends_the_stream_with_stopped_reason() {
    let decoder = CountingDecoder::paced(TRACK_FRAMES, Duration::from_millis(100));
    let (ctx, mut rx) = make_context(decoder);
    let handle = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();

    // Let at least one chunk through first
    loop {
        if let StreamEvent::Chunk { .. } = next_event(&mut rx).await {
            break;
        }
    }
    handle.stop().await.unwrap();

    loop {
        if let StreamEvent::StreamEnded { reason, .. } = next_event(&mut rx).await {
            assert_eq!(reason, EndReason::Stopped);
            break;
        }
    }
}

#[tokio::test]
async fn paused_session_leaves_the_gate_free_for_another() {
    // One processing slot shared by two sessions. Slots are held per chunk
    // invocation, not per session, so a paused session must not block the
    // other one's delivery.
    let decoder = CountingDecoder::paced(TRACK_FRAMES, Duration::from_millis(50));
    let (ctx, mut rx) = make_context_with(decoder, 1, None);

    let first = StreamSession::spawn(ctx.clone(), track(), params(), 0.0).unwrap();

    // Get the first session streaming, then park it
    loop {
        if let StreamEvent::Chunk { .. } = next_event(&mut rx).await {
            break;
        }
    }
    first.pause().await.unwrap();
    loop {
        if let StreamEvent::StateChanged {
            state: SessionStateInfo::Paused,
            ..
        } = next_event(&mut rx).await
        {
            break;
        }
    }

    let second = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();
    let second_id = second.stream_id();

    // The second session must make progress while the first stays paused
    loop {
        match next_event(&mut rx).await {
            StreamEvent::Chunk { stream_id, .. } if stream_id == second_id => break,
            StreamEvent::StreamError { stream_id, message, .. } => {
                panic!("stream {} failed: {}", stream_id, message)
            }
            _ => {}
        }
    }
    assert_eq!(first.state(), SessionStateInfo::Paused);
}

#[tokio::test]
async fn ended_session_invokes_its_cleanup_callback() {
    let removed: Arc<Mutex<Vec<Uuid>>> = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&removed);
    let cleanup: SessionCleanup = Arc::new(move |stream_id| {
        recorder.lock().unwrap().push(stream_id);
    });

    let decoder = CountingDecoder::new(TRACK_FRAMES);
    let (ctx, mut rx) = make_context_with(decoder, 4, Some(cleanup));
    let handle = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();

    loop {
        if let StreamEvent::StreamEnded { reason, .. } = next_event(&mut rx).await {
            assert_eq!(reason, EndReason::EndOfTrack);
            break;
        }
    }

    // Deregistration happens before stream_ended is announced
    assert_eq!(*removed.lock().unwrap(), vec![handle.stream_id()]);
}

#[tokio::test]
async fn errored_session_removes_itself_from_the_registry() {
    // Wired through SharedState: a decode failure must not leave a dead
    // handle behind in the session registry.
    let state = SharedState::new(Config::default());
    let bogus = TrackInfo {
        track_id: Uuid::new_v4(),
        path: PathBuf::from("/nonexistent/track.wav"),
        sample_rate: 44100,
        channels: 2,
        duration_samples: 44100 * 30,
        source_signature: 7,
    };

    let handle = StreamSession::spawn(state.session_context(), bogus, params(), 0.0).unwrap();
    let stream_id = handle.stream_id();
    state.register_session(handle);
    assert!(state.session(stream_id).is_some());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while state.session(stream_id).is_some() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "errored session was never deregistered"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn invalid_seek_position_is_rejected_by_the_handle() {
    let decoder = CountingDecoder::new(TRACK_FRAMES);
    let (ctx, _rx) = make_context(decoder);
    let handle = StreamSession::spawn(ctx, track(), params(), 0.0).unwrap();

    assert!(handle.seek(-1.0).await.is_err());
    assert!(handle.seek(f64::NAN).await.is_err());
}
