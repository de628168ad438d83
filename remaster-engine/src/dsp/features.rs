//! Chunk feature extraction for the adaptive EQ
//!
//! The EQ adapts its top-octave gains to the material: bright sources get
//! pulled back, dull ones lifted. The brightness measure here is the ratio
//! of first-difference energy to signal energy, which tracks high-frequency
//! emphasis without a second FFT pass over the chunk.

use crate::audio::types::AudioChunk;

/// Features the chain consumes when shaping its response to one chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralFeatures {
    /// Spectral tilt in roughly [-1, 1]: positive = bright, negative = dull,
    /// zero = neutral balance.
    pub tilt: f32,
}

impl SpectralFeatures {
    /// Neutral features: the adaptive term contributes nothing.
    pub fn neutral() -> Self {
        Self { tilt: 0.0 }
    }
}

/// First-difference ratio of a neutral (pink-ish) music signal; measured
/// ratios are centered on this before scaling to tilt.
const NEUTRAL_DIFF_RATIO: f32 = 0.35;

/// Analyze one decoded chunk.
pub fn analyze(chunk: &AudioChunk) -> SpectralFeatures {
    if chunk.samples.len() < 2 || chunk.channels == 0 {
        return SpectralFeatures::neutral();
    }

    let mut signal_energy = 0.0f64;
    let mut diff_energy = 0.0f64;

    // Differences taken within each channel; an interleaved diff would
    // measure inter-channel spread, not spectral content.
    for plane in chunk.deinterleave() {
        for pair in plane.windows(2) {
            let d = (pair[1] - pair[0]) as f64;
            diff_energy += d * d;
        }
        for s in &plane {
            signal_energy += (*s as f64) * (*s as f64);
        }
    }

    if signal_energy < 1e-12 {
        return SpectralFeatures::neutral();
    }

    let ratio = (diff_energy / signal_energy).sqrt() as f32;
    let tilt = ((ratio - NEUTRAL_DIFF_RATIO) / NEUTRAL_DIFF_RATIO).clamp(-1.0, 1.0);
    SpectralFeatures { tilt }
}
