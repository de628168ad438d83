//! Dynamics stage: soft-knee limiting
//!
//! Memoryless soft limiter: samples below the threshold pass unchanged;
//! above it the excess is squashed through tanh toward the ceiling, which
//! the output never exceeds (f32 tanh saturates to exactly 1.0 for large
//! inputs, so the ceiling itself is attainable). Per-sample and per-channel
//! independent, so sample count and channel count are preserved trivially.

use remaster_common::params::MasteringPreset;

/// Smallest allowed `ceiling - threshold` span. All limiter math divides by
/// this span; a configuration with `ceiling == threshold` must not divide by
/// zero.
const MIN_SPAN: f32 = 1e-4;

/// Soft-knee limiter
#[derive(Debug, Clone, Copy)]
pub struct SoftKneeLimiter {
    /// Level where limiting begins (linear amplitude)
    pub threshold: f32,

    /// Output bound (linear amplitude), inclusive: heavily overdriven
    /// samples land exactly on it
    pub ceiling: f32,
}

impl SoftKneeLimiter {
    /// Limiter tuned for a preset at the given intensity.
    ///
    /// Returns `None` when the stage should be bypassed entirely (`Flat`
    /// preset or zero intensity): bypass is exact unity, not a limiter with
    /// neutral-looking settings.
    pub fn for_preset(preset: MasteringPreset, intensity: f32) -> Option<Self> {
        if preset == MasteringPreset::Flat || intensity <= 0.0 {
            return None;
        }
        let strength = match preset {
            MasteringPreset::Flat => 0.0,
            MasteringPreset::Warm | MasteringPreset::Vocal => 0.25,
            MasteringPreset::Bright => 0.2,
            MasteringPreset::Club => 0.45,
        };
        Some(Self {
            threshold: 1.0 - 0.5 * strength * intensity,
            ceiling: 0.995,
        })
    }

    /// Gain curve applied to one sample.
    pub fn shape(&self, sample: f32) -> f32 {
        let magnitude = sample.abs();
        if magnitude <= self.threshold {
            return sample;
        }
        // Span clamp keeps the division defined even for degenerate
        // threshold/ceiling configurations.
        let span = (self.ceiling - self.threshold).max(MIN_SPAN);
        let squashed = self.threshold + span * ((magnitude - self.threshold) / span).tanh();
        squashed.copysign(sample)
    }

    /// Limit a buffer in place.
    pub fn process(&self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.shape(*sample);
        }
    }
}
