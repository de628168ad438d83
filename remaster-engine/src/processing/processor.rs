//! Chunked audio processor
//!
//! Produces one mastered chunk: cache check → decode → DSP chain →
//! equal-power blend of the leading overlap against the previous chunk's
//! tail → retain this chunk's own tail → return.
//!
//! Crossfading happens here and nowhere else. Delivered chunks carry the
//! `crossfade_already_applied` flag downstream so no later layer blends the
//! overlap a second time; a double equal-power blend reintroduces the exact
//! energy dip the fade exists to remove.
//!
//! Tails are session state, owned by the caller and passed in explicitly: a
//! tail is only valid against the chunk immediately following the one that
//! produced it, under the same parameters. Seeks break adjacency, so the
//! session drops its tail on seek and the first chunk after a seek is
//! emitted unblended.

use crate::audio::decoder::ChunkDecoder;
use crate::audio::types::ProcessedChunk;
use crate::dsp::{features, MasteringChain};
use crate::error::Result;
use crate::library::TrackInfo;
use crate::processing::cache::{CacheKey, ProcessingCache};
use remaster_common::fade_curves::equal_power_gains;
use remaster_common::params::ProcessingParameters;
use remaster_common::ChunkSpec;
use std::sync::Arc;
use tracing::{debug, trace};

/// Trailing overlap of a processed chunk, kept to blend into its successor.
#[derive(Debug, Clone)]
pub struct ChunkTail {
    /// Index of the chunk this tail came from
    pub chunk_index: u32,

    /// Parameter hash the tail was produced under
    pub params_hash: u64,

    /// Interleaved samples of the trailing overlap region
    pub samples: Vec<f32>,

    pub channels: u8,
}

impl ChunkTail {
    /// A tail may only blend into the chunk directly after its producer,
    /// under identical parameters.
    fn is_adjacent_to(&self, spec: &ChunkSpec, params_hash: u64) -> bool {
        self.chunk_index + 1 == spec.index && self.params_hash == params_hash
    }
}

/// Result of producing one chunk
#[derive(Debug, Clone)]
pub struct ProcessorOutput {
    /// Mastered chunk with its leading overlap already blended
    pub chunk: ProcessedChunk,

    /// Tail for the next call; `None` when the chunk was too short to carry
    /// a full overlap (end of track)
    pub tail: Option<ChunkTail>,
}

/// Orchestrates decode, DSP, caching, and overlap blending for one chunk at
/// a time. Shared by all sessions; per-session state (the tail) stays with
/// the caller.
pub struct ChunkedAudioProcessor {
    decoder: Arc<dyn ChunkDecoder>,
    chain: MasteringChain,
    cache: Arc<ProcessingCache>,
    chunk_duration_s: f64,
    chunk_interval_s: f64,
}

impl ChunkedAudioProcessor {
    pub fn new(
        decoder: Arc<dyn ChunkDecoder>,
        cache: Arc<ProcessingCache>,
        chunk_duration_s: f64,
        chunk_interval_s: f64,
    ) -> Self {
        Self {
            decoder,
            chain: MasteringChain::new(),
            cache,
            chunk_duration_s,
            chunk_interval_s,
        }
    }

    /// Frames two consecutive chunks share at a given sample rate
    fn overlap_frames(&self, sample_rate: u32) -> usize {
        let overlap_s = self.chunk_duration_s - self.chunk_interval_s;
        (overlap_s * sample_rate as f64).round().max(0.0) as usize
    }

    /// Produce one mastered chunk, blended against `prev_tail` when that
    /// tail is temporally adjacent.
    pub fn process_chunk(
        &self,
        track: &TrackInfo,
        spec: ChunkSpec,
        params: &ProcessingParameters,
        prev_tail: Option<&ChunkTail>,
    ) -> Result<ProcessorOutput> {
        let params_hash = params.cache_hash();
        let key = CacheKey {
            track_id: track.track_id,
            source_signature: track.source_signature,
            chunk_index: spec.index,
            params_hash,
        };

        let processed = match self.cache.get(&key) {
            Some(cached) => {
                trace!("cache hit for chunk {} of {}", spec.index, track.track_id);
                cached
            }
            None => {
                let produced = self.produce(track, spec, params)?;
                let produced = Arc::new(produced);
                self.cache.put(key, Arc::clone(&produced));
                produced
            }
        };

        // Tail comes from the pre-blend chunk: blending only rewrites the
        // leading overlap, and the trailing region must match what the
        // cached copy would hand any other session.
        let tail = self.extract_tail(&processed, params_hash);

        let mut chunk = (*processed).clone();
        if let Some(prev) = prev_tail {
            if prev.is_adjacent_to(&chunk.spec, params_hash) {
                self.blend_leading_overlap(&mut chunk, prev);
            } else {
                debug!(
                    "tail from chunk {} not adjacent to chunk {}, skipping blend",
                    prev.chunk_index, chunk.spec.index
                );
            }
        }

        Ok(ProcessorOutput { chunk, tail })
    }

    /// Decode and master one chunk (cache miss path).
    fn produce(
        &self,
        track: &TrackInfo,
        spec: ChunkSpec,
        params: &ProcessingParameters,
    ) -> Result<ProcessedChunk> {
        let decoded = self
            .decoder
            .decode_range(track, spec.start_sample, spec.length_samples)?;

        // Short read at end of track: shrink the spec to the decoded frames
        // so the length invariant refers to real audio, never padding.
        let decoded_frames = decoded.frame_count() as u32;
        let mut spec = spec;
        if decoded_frames < spec.length_samples {
            debug!(
                "chunk {}: short read, {} of {} frames",
                spec.index, decoded_frames, spec.length_samples
            );
            spec.length_samples = decoded_frames;
        }

        let chunk_features = features::analyze(&decoded);
        let mastered = self.chain.process(&decoded, params, &chunk_features)?;

        debug_assert_eq!(
            mastered.samples.len(),
            spec.length_samples as usize * mastered.channels as usize
        );

        Ok(ProcessedChunk {
            spec,
            samples: mastered.samples,
            sample_rate: mastered.sample_rate,
            channels: mastered.channels,
        })
    }

    /// Last `overlap_samples` frames of a chunk, or `None` if it is too
    /// short to carry a full overlap.
    fn extract_tail(&self, chunk: &ProcessedChunk, params_hash: u64) -> Option<ChunkTail> {
        let overlap = self.overlap_frames(chunk.sample_rate);
        if overlap == 0 || chunk.frame_count() < overlap {
            return None;
        }
        let ch = chunk.channels as usize;
        let start = (chunk.frame_count() - overlap) * ch;
        Some(ChunkTail {
            chunk_index: chunk.spec.index,
            params_hash,
            samples: chunk.samples[start..].to_vec(),
            channels: chunk.channels,
        })
    }

    /// Equal-power blend of the chunk's leading overlap against the
    /// previous chunk's tail, in place.
    fn blend_leading_overlap(&self, chunk: &mut ProcessedChunk, tail: &ChunkTail) {
        let ch = chunk.channels as usize;
        if ch == 0 || tail.channels != chunk.channels {
            return;
        }
        let overlap_frames = self
            .overlap_frames(chunk.sample_rate)
            .min(tail.samples.len() / ch)
            .min(chunk.frame_count());
        if overlap_frames == 0 {
            return;
        }

        let denom = (overlap_frames - 1).max(1) as f32;
        for frame in 0..overlap_frames {
            let t = frame as f32 / denom;
            let (gain_out, gain_in) = equal_power_gains(t);
            for c in 0..ch {
                let i = frame * ch + c;
                chunk.samples[i] = tail.samples[i] * gain_out + chunk.samples[i] * gain_in;
            }
        }
    }
}
