//! Chunk production: cache, processor orchestration, concurrency gate

pub mod cache;
pub mod engine;
pub mod processor;

pub use cache::{CacheKey, CacheStats, ProcessingCache};
pub use engine::{JobGuard, ProcessingEngine};
pub use processor::{ChunkTail, ChunkedAudioProcessor, ProcessorOutput};
