//! Loudness stage: RMS-referenced makeup gain
//!
//! Measures the chunk's RMS and applies a single gain nudging it toward the
//! target level. Intensity blends between unity and the computed gain.
//! The gain is bounded and the RMS denominator clamped, so silence is never
//! divided by and quiet passages are never blasted.

/// Target RMS level, about -14 dBFS
const TARGET_RMS: f32 = 0.2;

/// RMS floor for the gain division
const MIN_RMS: f32 = 1e-4;

/// Gain bounds (linear)
const MIN_GAIN: f32 = 0.25;
const MAX_GAIN: f32 = 4.0;

/// Loudness normalizer
#[derive(Debug, Clone, Copy)]
pub struct LoudnessNormalizer {
    pub target_rms: f32,
}

impl LoudnessNormalizer {
    pub fn new() -> Self {
        Self {
            target_rms: TARGET_RMS,
        }
    }

    /// Makeup gain for a measured RMS level.
    pub fn gain_for(&self, rms: f32) -> f32 {
        (self.target_rms / rms.max(MIN_RMS)).clamp(MIN_GAIN, MAX_GAIN)
    }

    /// Apply makeup gain in place, scaled by intensity.
    ///
    /// `intensity == 0.0` is exact unity (the buffer is untouched).
    pub fn process(&self, samples: &mut [f32], intensity: f32) {
        if samples.is_empty() || intensity <= 0.0 {
            return;
        }
        let sum_sq: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        let rms = (sum_sq / samples.len() as f64).sqrt() as f32;
        let gain = 1.0 + (self.gain_for(rms) - 1.0) * intensity;
        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }
}

impl Default for LoudnessNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_signal_is_raised_toward_target() {
        let normalizer = LoudnessNormalizer::new();
        let mut samples = vec![0.05f32; 4096];
        normalizer.process(&mut samples, 1.0);
        let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        assert!(rms > 0.05, "rms {}", rms);
        assert!(rms <= TARGET_RMS + 1e-3);
    }

    #[test]
    fn loud_signal_is_pulled_down() {
        let normalizer = LoudnessNormalizer::new();
        let mut samples = vec![0.8f32; 4096];
        normalizer.process(&mut samples, 1.0);
        assert!(samples[0] < 0.8);
    }

    #[test]
    fn silence_stays_silent_and_finite() {
        let normalizer = LoudnessNormalizer::new();
        let mut samples = vec![0.0f32; 1024];
        normalizer.process(&mut samples, 1.0);
        assert!(samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn zero_intensity_is_exact_unity() {
        let normalizer = LoudnessNormalizer::new();
        let original = vec![0.05f32, -0.3, 0.7];
        let mut samples = original.clone();
        normalizer.process(&mut samples, 0.0);
        assert_eq!(samples, original);
    }

    #[test]
    fn gain_is_bounded() {
        let normalizer = LoudnessNormalizer::new();
        assert_eq!(normalizer.gain_for(0.0), MAX_GAIN);
        assert_eq!(normalizer.gain_for(10.0), MIN_GAIN);
    }
}
