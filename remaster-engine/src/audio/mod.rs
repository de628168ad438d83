//! Audio decode and buffer types

pub mod decoder;
pub mod types;

pub use decoder::{ChunkDecoder, SymphoniaDecoder};
pub use types::{AudioChunk, ProcessedChunk};
