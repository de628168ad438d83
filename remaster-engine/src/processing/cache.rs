//! Processed-chunk cache
//!
//! Content-addressed store mapping (track, source signature, chunk index,
//! parameter hash) to a previously mastered chunk. Bounded by chunk count
//! with LRU eviction; an unbounded chunk cache grows by tens of megabytes a
//! minute under active streaming.
//!
//! Entries are the pre-blend DSP output: crossfade blending depends on a
//! session's own tail, so blended chunks would be wrong for every other
//! session. Values are `Arc`-shared; a hit clones the Arc, never the PCM.
//!
//! Locking: a single `std::sync::Mutex` scoped strictly to map mutation.
//! The lock is never held across an await point, and two producers racing a
//! miss simply overwrite each other whole (last write wins, no torn values).

use crate::audio::types::ProcessedChunk;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Cache key: every field that can change the produced audio is present.
/// Omitting `params_hash` would serve stale chunks after a parameter change;
/// omitting `source_signature` would serve chunks of an edited file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub track_id: Uuid,
    pub source_signature: u64,
    pub chunk_index: u32,
    pub params_hash: u64,
}

/// Counters surfaced on the health endpoint
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct CacheInner {
    map: HashMap<CacheKey, Arc<ProcessedChunk>>,
    /// LRU order, least recent at the front
    order: VecDeque<CacheKey>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &CacheKey) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(*key);
    }
}

/// Bounded LRU cache of mastered chunks, shared across sessions.
pub struct ProcessingCache {
    inner: Mutex<CacheInner>,
}

impl ProcessingCache {
    /// Create a cache bounded to `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ProcessedChunk>> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        match inner.map.get(key).cloned() {
            Some(chunk) => {
                inner.hits += 1;
                inner.touch(key);
                Some(chunk)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn put(&self, key: CacheKey, chunk: Arc<ProcessedChunk>) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        let replaced = inner.map.insert(key, chunk).is_some();
        inner.touch(&key);
        if replaced {
            // Concurrent producers raced the same miss; last write wins
            debug!("cache entry replaced for chunk {}", key.chunk_index);
        }
        while inner.map.len() > inner.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.map.remove(&oldest);
                inner.evictions += 1;
            } else {
                break;
            }
        }
    }

    /// Drop every entry for a track, regardless of signature or parameters.
    pub fn invalidate_track(&self, track_id: Uuid) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.map.retain(|k, _| k.track_id != track_id);
        inner.order.retain(|k| k.track_id != track_id);
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache lock poisoned");
        CacheStats {
            entries: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}
