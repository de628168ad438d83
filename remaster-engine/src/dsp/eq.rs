//! Spectral EQ stage
//!
//! Block FFT processing with a Hann analysis window at 50% overlap-add.
//! Hann at half-window hop sums to exactly 1.0, so flat gains reconstruct
//! the input and no synthesis window is applied after the inverse
//! transform. Applying a second window would square the Hann and modulate
//! the output at `sample_rate / fft_size`, which is audible.
//!
//! Per-band gains are applied symmetrically to positive and negative
//! frequency bins before the inverse transform; skipping the mirror would
//! silently discard energy when taking the real part. DC is never touched.
//!
//! The concrete band layouts per preset are tuning, not contract; only the
//! length/channel/unity invariants are load-bearing.

use remaster_common::params::MasteringPreset;
use rustfft::{num_complex::Complex, FftPlanner};

/// Analysis FFT length. Chunks shorter than this are padded internally and
/// trimmed on return.
pub const FFT_SIZE: usize = 4096;

/// One EQ band: gain applied to bins whose center frequency falls in
/// `[low_hz, high_hz)`.
#[derive(Debug, Clone, Copy)]
pub struct Band {
    pub low_hz: f32,
    pub high_hz: f32,
    pub gain_db: f32,
}

/// Band layout for a preset at full intensity.
///
/// `Flat` has no bands: every bin stays at unity, making bypass exact.
pub fn preset_bands(preset: MasteringPreset) -> &'static [Band] {
    match preset {
        MasteringPreset::Flat => &[],
        MasteringPreset::Warm => &[
            Band { low_hz: 20.0, high_hz: 250.0, gain_db: 3.0 },
            Band { low_hz: 250.0, high_hz: 2000.0, gain_db: 0.5 },
            Band { low_hz: 8000.0, high_hz: 20000.0, gain_db: -2.0 },
        ],
        MasteringPreset::Bright => &[
            Band { low_hz: 20.0, high_hz: 120.0, gain_db: -1.0 },
            Band { low_hz: 3000.0, high_hz: 8000.0, gain_db: 2.5 },
            Band { low_hz: 8000.0, high_hz: 16000.0, gain_db: 3.0 },
        ],
        MasteringPreset::Club => &[
            Band { low_hz: 20.0, high_hz: 120.0, gain_db: 4.0 },
            Band { low_hz: 120.0, high_hz: 250.0, gain_db: 2.0 },
            Band { low_hz: 2000.0, high_hz: 5000.0, gain_db: -1.5 },
        ],
        MasteringPreset::Vocal => &[
            Band { low_hz: 20.0, high_hz: 120.0, gain_db: -2.0 },
            Band { low_hz: 250.0, high_hz: 4000.0, gain_db: 2.5 },
        ],
    }
}

/// Spectral EQ processor
pub struct SpectralEq {
    fft_size: usize,
}

impl SpectralEq {
    pub fn new() -> Self {
        Self { fft_size: FFT_SIZE }
    }

    /// Per-bin linear gains for one channel's transform.
    ///
    /// Returns `fft_size / 2 + 1` gains (DC through Nyquist). Band gains are
    /// scaled by `intensity`; an adaptive tilt term (derived from the chunk's
    /// own spectral balance) nudges the high bands to keep bright sources
    /// from over-brightening.
    pub fn bin_gains(
        &self,
        sample_rate: u32,
        bands: &[Band],
        intensity: f32,
        tilt: f32,
    ) -> Vec<f32> {
        let half = self.fft_size / 2;
        let bin_hz = sample_rate as f32 / self.fft_size as f32;
        let mut gains = vec![1.0f32; half + 1];

        if bands.is_empty() {
            return gains;
        }

        for (k, gain) in gains.iter_mut().enumerate().skip(1) {
            let freq = k as f32 * bin_hz;
            let mut gain_db = 0.0f32;
            for band in bands {
                if freq >= band.low_hz && freq < band.high_hz {
                    gain_db += band.gain_db;
                }
            }
            // Adaptive tilt: bright content (tilt > 0) pulls the top octaves
            // back, dull content gets a mild lift. Bounded to ±1.5 dB.
            if freq > 2000.0 {
                let octaves = (freq / 2000.0).log2();
                gain_db -= (tilt * octaves * 0.75).clamp(-1.5, 1.5);
            }
            gain_db *= intensity;
            *gain = 10.0f32.powf(gain_db / 20.0);
        }
        // DC stays at unity regardless of bands
        gains[0] = 1.0;
        gains
    }

    /// Apply the EQ to one channel.
    ///
    /// Output length always equals input length: the leading half-hop pad
    /// and trailing block pad exist only inside this function.
    pub fn process_channel(&self, input: &[f32], bin_gains: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return Vec::new();
        }
        let n = self.fft_size;
        let hop = n / 2;
        debug_assert_eq!(bin_gains.len(), hop + 1);

        let mut planner = FftPlanner::<f32>::new();
        let fft_forward = planner.plan_fft_forward(n);
        let fft_inverse = planner.plan_fft_inverse(n);

        // Hann analysis window; its 50% overlap-add sums to unity, so no
        // synthesis window is applied after the inverse transform.
        let window: Vec<f32> = (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos()))
            .collect();

        // Pad half a hop in front so the first input sample sits where the
        // overlapped windows already sum to one.
        let content_len = hop + input.len();
        let mut out = vec![0.0f32; content_len + n];
        let mut block = vec![Complex::new(0.0f32, 0.0f32); n];

        let mut offset = 0usize;
        while offset < content_len {
            for i in 0..n {
                let pos = offset + i;
                // Padded view: [0; hop] ++ input ++ zeros
                let sample = if pos >= hop && pos - hop < input.len() {
                    input[pos - hop]
                } else {
                    0.0
                };
                block[i] = Complex::new(sample * window[i], 0.0);
            }

            fft_forward.process(&mut block);

            // Mirror each positive-bin gain onto its negative twin; the
            // inverse transform keeps only the real part, and an unmirrored
            // gain would shed half the adjusted energy there.
            for k in 1..hop {
                let g = bin_gains[k];
                block[k] *= g;
                block[n - k] *= g;
            }
            block[hop] *= bin_gains[hop]; // Nyquist, self-conjugate
            // block[0] (DC) untouched

            fft_inverse.process(&mut block);

            let scale = 1.0 / n as f32;
            for i in 0..n {
                out[offset + i] += block[i].re * scale;
            }

            offset += hop;
        }

        out[hop..hop + input.len()].to_vec()
    }
}

impl Default for SpectralEq {
    fn default() -> Self {
        Self::new()
    }
}
