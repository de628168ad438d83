//! Shared engine state
//!
//! Thread-safe shared state wiring the cache, processor, concurrency gate,
//! session registry, and the event broadcaster together for the API layer.

use crate::audio::decoder::SymphoniaDecoder;
use crate::config::Config;
use crate::library::{FileLibrary, TrackResolver};
use crate::processing::{ChunkedAudioProcessor, ProcessingCache, ProcessingEngine};
use crate::session::{SessionContext, StreamSessionHandle};
use remaster_common::events::StreamEvent;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared state accessible by all components
pub struct SharedState {
    pub config: Config,

    /// Track registration and resolution
    pub library: Arc<FileLibrary>,

    /// Shared chunk producer (decode + DSP + cache + blend)
    pub processor: Arc<ChunkedAudioProcessor>,

    /// Global concurrency gate
    pub engine: Arc<ProcessingEngine>,

    /// Processed-chunk cache, shared across sessions
    pub cache: Arc<ProcessingCache>,

    /// Event broadcaster feeding the SSE streams
    pub event_tx: broadcast::Sender<StreamEvent>,

    /// Live sessions by stream id. Entries are removed by the session
    /// itself when it ends or errors (via the cleanup callback handed out
    /// in [`SharedState::session_context`]), and eagerly by the stop
    /// handler. The lock is sync and never held across an await.
    pub sessions: RwLock<HashMap<Uuid, StreamSessionHandle>>,
}

impl SharedState {
    /// Wire up the engine from configuration.
    pub fn new(config: Config) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        let cache = Arc::new(ProcessingCache::new(config.cache_capacity_chunks));
        let processor = Arc::new(ChunkedAudioProcessor::new(
            Arc::new(SymphoniaDecoder),
            Arc::clone(&cache),
            config.chunk_duration_s,
            config.chunk_interval_s,
        ));
        let engine = ProcessingEngine::new(config.max_concurrent_jobs);
        let library = Arc::new(FileLibrary::new(config.library_root.clone()));

        Arc::new(Self {
            config,
            library,
            processor,
            engine,
            cache,
            event_tx,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Context handed to each new session. Carries a weak-referenced
    /// cleanup callback so an ending session removes itself from the
    /// registry without keeping the state alive.
    pub fn session_context(self: &Arc<Self>) -> SessionContext {
        let weak = Arc::downgrade(self);
        SessionContext {
            processor: Arc::clone(&self.processor),
            engine: Arc::clone(&self.engine),
            event_tx: self.event_tx.clone(),
            chunk_duration_s: self.config.chunk_duration_s,
            chunk_interval_s: self.config.chunk_interval_s,
            outbound_queue_chunks: self.config.outbound_queue_chunks,
            cleanup: Some(Arc::new(move |stream_id| {
                if let Some(state) = weak.upgrade() {
                    state.remove_session(stream_id);
                }
            })),
        }
    }

    /// Resolver view of the library
    pub fn resolver(&self) -> Arc<dyn TrackResolver> {
        Arc::clone(&self.library) as Arc<dyn TrackResolver>
    }

    /// Subscribe to the event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_tx.subscribe()
    }

    pub fn register_session(&self, handle: StreamSessionHandle) {
        self.sessions
            .write()
            .expect("sessions lock poisoned")
            .insert(handle.stream_id(), handle);
    }

    pub fn session(&self, stream_id: Uuid) -> Option<StreamSessionHandle> {
        self.sessions
            .read()
            .expect("sessions lock poisoned")
            .get(&stream_id)
            .cloned()
    }

    pub fn remove_session(&self, stream_id: Uuid) {
        self.sessions
            .write()
            .expect("sessions lock poisoned")
            .remove(&stream_id);
    }
}
