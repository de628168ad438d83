//! Chunk boundary math for windowed mastering
//!
//! A track is processed as overlapping time windows ("chunks"). Chunk starts
//! are spaced `interval_s` apart while each chunk covers `chunk_duration_s`
//! of audio, so consecutive chunks share `chunk_duration_s - interval_s`
//! seconds of overlap. The overlap region is consumed by the equal-power
//! crossfade when chunks are stitched back together.
//!
//! This module is pure math: no state, no I/O. Two calls with the same
//! arguments always produce identical specs, which is what makes `ChunkSpec`
//! usable as a cache-key component.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One processing window within a track.
///
/// Derived deterministically from track duration and the boundary constants;
/// two specs for the same track and index are always equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// Zero-based chunk index
    pub index: u32,

    /// First sample frame covered by this chunk
    pub start_sample: u64,

    /// Frames actually covered. The final chunk is clamped to whatever
    /// remains of the track and may be shorter than the nominal window.
    pub length_samples: u32,
}

impl ChunkSpec {
    /// End sample (exclusive) of this chunk
    pub fn end_sample(&self) -> u64 {
        self.start_sample + self.length_samples as u64
    }
}

/// Validate the boundary constants shared by all computations here.
///
/// `interval_s` defines chunk spacing and must not exceed `chunk_duration_s`;
/// the difference between the two is the crossfade overlap.
fn validate_constants(chunk_duration_s: f64, interval_s: f64) -> Result<()> {
    if !chunk_duration_s.is_finite() || chunk_duration_s <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "chunk duration must be positive, got {}",
            chunk_duration_s
        )));
    }
    if !interval_s.is_finite() || interval_s <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "chunk interval must be positive, got {}",
            interval_s
        )));
    }
    if interval_s > chunk_duration_s {
        return Err(Error::InvalidInput(format!(
            "chunk interval ({}) exceeds chunk duration ({})",
            interval_s, chunk_duration_s
        )));
    }
    Ok(())
}

/// Compute the chunk specs covering a track.
///
/// Chunk `i` starts at `i * interval` and nominally covers `chunk_duration`
/// seconds. The last chunk's length is clamped to the remaining samples and
/// is never padded in the returned spec; any padding a downstream transform
/// needs is that transform's internal concern.
///
/// A zero-length track yields an empty sequence.
pub fn boundaries_for(
    duration_samples: u64,
    sample_rate: u32,
    chunk_duration_s: f64,
    interval_s: f64,
) -> Result<Vec<ChunkSpec>> {
    validate_constants(chunk_duration_s, interval_s)?;
    if sample_rate == 0 {
        return Err(Error::InvalidInput("sample rate must be nonzero".to_string()));
    }

    let interval_samples = (interval_s * sample_rate as f64).round() as u64;
    let chunk_samples = (chunk_duration_s * sample_rate as f64).round() as u64;
    if interval_samples == 0 {
        return Err(Error::InvalidInput(
            "chunk interval rounds to zero samples".to_string(),
        ));
    }

    let mut specs = Vec::new();
    let mut start = 0u64;
    let mut index = 0u32;
    while start < duration_samples {
        let remaining = duration_samples - start;
        let length = remaining.min(chunk_samples);
        specs.push(ChunkSpec {
            index,
            start_sample: start,
            length_samples: length as u32,
        });
        start += interval_samples;
        index += 1;
    }
    Ok(specs)
}

/// Chunk index containing a playback position.
///
/// Positions beyond the last chunk are the caller's concern; this is a plain
/// floor division on the spacing constant.
pub fn chunk_index_for(position_s: f64, interval_s: f64) -> Result<u32> {
    if !position_s.is_finite() || position_s < 0.0 {
        return Err(Error::InvalidInput(format!(
            "position must be non-negative, got {}",
            position_s
        )));
    }
    if !interval_s.is_finite() || interval_s <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "chunk interval must be positive, got {}",
            interval_s
        )));
    }
    Ok((position_s / interval_s).floor() as u32)
}

/// Number of sample frames two consecutive chunks share.
pub fn overlap_samples(sample_rate: u32, chunk_duration_s: f64, interval_s: f64) -> Result<u32> {
    validate_constants(chunk_duration_s, interval_s)?;
    if sample_rate == 0 {
        return Err(Error::InvalidInput("sample rate must be nonzero".to_string()));
    }
    let overlap_s = chunk_duration_s - interval_s;
    Ok((overlap_s * sample_rate as f64).round() as u32)
}

/// Total chunk count for a track (convenience over `boundaries_for`).
pub fn chunk_count(
    duration_samples: u64,
    sample_rate: u32,
    chunk_duration_s: f64,
    interval_s: f64,
) -> Result<u32> {
    validate_constants(chunk_duration_s, interval_s)?;
    if sample_rate == 0 {
        return Err(Error::InvalidInput("sample rate must be nonzero".to_string()));
    }
    let interval_samples = (interval_s * sample_rate as f64).round() as u64;
    if interval_samples == 0 {
        return Err(Error::InvalidInput(
            "chunk interval rounds to zero samples".to_string(),
        ));
    }
    Ok(duration_samples.div_ceil(interval_samples) as u32)
}
