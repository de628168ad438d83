//! Mastering chain orchestration
//!
//! Composes the EQ, dynamics, and loudness stages over one decoded chunk and
//! enforces the chain-level invariants on the way out:
//!
//! - output length equals input length, channel for channel
//! - channel count and f32 sample type are preserved
//! - `Flat` preset (and zero intensity) is exact unity, never "mild boost"
//! - malformed parameters are rejected up front, not clamped in the hot path
//!
//! A violated invariant is a `Processing` error for the whole chunk; the
//! chain never returns partially processed audio.

use crate::audio::types::AudioChunk;
use crate::dsp::dynamics::SoftKneeLimiter;
use crate::dsp::eq::{preset_bands, SpectralEq};
use crate::dsp::features::SpectralFeatures;
use crate::dsp::loudness::LoudnessNormalizer;
use crate::error::{Error, Result};
use remaster_common::params::{MasteringPreset, ProcessingParameters};

/// The mastering DSP chain. Stateless per call; one instance is shared by
/// all sessions.
pub struct MasteringChain {
    eq: SpectralEq,
    loudness: LoudnessNormalizer,
}

impl MasteringChain {
    pub fn new() -> Self {
        Self {
            eq: SpectralEq::new(),
            loudness: LoudnessNormalizer::new(),
        }
    }

    /// Master one decoded chunk.
    pub fn process(
        &self,
        chunk: &AudioChunk,
        params: &ProcessingParameters,
        features: &SpectralFeatures,
    ) -> Result<AudioChunk> {
        params.validate()?;

        if chunk.channels == 0 {
            return Err(Error::Processing("chunk has zero channels".to_string()));
        }
        if chunk.samples.len() % chunk.channels as usize != 0 {
            return Err(Error::Processing(format!(
                "sample count {} is not a multiple of channel count {}",
                chunk.samples.len(),
                chunk.channels
            )));
        }

        // Bypass is exact: no stage runs, the samples come back untouched.
        if params.preset == MasteringPreset::Flat || params.intensity == 0.0 {
            return Ok(chunk.clone());
        }

        // EQ runs per channel; stereo content is never collapsed.
        let bands = preset_bands(params.preset);
        let gains = self
            .eq
            .bin_gains(chunk.sample_rate, bands, params.intensity, features.tilt);

        let planes = chunk.deinterleave();
        let mut processed = Vec::with_capacity(planes.len());
        for (ch, plane) in planes.iter().enumerate() {
            let out = self.eq.process_channel(plane, &gains);
            if out.len() != plane.len() {
                return Err(Error::Processing(format!(
                    "EQ changed channel {} length: {} -> {}",
                    ch,
                    plane.len(),
                    out.len()
                )));
            }
            processed.push(out);
        }

        let mut output = AudioChunk::interleave(&processed, chunk.sample_rate);

        // Memoryless stages run on the interleaved buffer; per-sample math
        // is channel-agnostic.
        if let Some(limiter) = SoftKneeLimiter::for_preset(params.preset, params.intensity) {
            limiter.process(&mut output.samples);
        }
        self.loudness.process(&mut output.samples, params.intensity);

        if output.samples.len() != chunk.samples.len() || output.channels != chunk.channels {
            return Err(Error::Processing(format!(
                "chain broke shape: {} samples x {} ch in, {} x {} out",
                chunk.samples.len(),
                chunk.channels,
                output.samples.len(),
                output.channels
            )));
        }

        Ok(output)
    }
}

impl Default for MasteringChain {
    fn default() -> Self {
        Self::new()
    }
}
