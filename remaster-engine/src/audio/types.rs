//! Core audio data types
//!
//! Buffers carry f32 interleaved PCM end-to-end. The DSP chain preserves
//! sample count, channel count, and sample type; any internal framing a
//! stage needs (FFT padding) never leaks into these buffers.

use remaster_common::ChunkSpec;

/// One decoded window of audio, input to the mastering chain.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved: `[ch0, ch1, ch0, ch1, ...]` for stereo
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// PCM audio samples (interleaved)
    pub samples: Vec<f32>,

    /// Source sample rate (no resampling stage in this engine)
    pub sample_rate: u32,

    /// Channel count (1 = mono, 2 = stereo, ...)
    pub channels: u8,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u8) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// RMS level across all channels
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum_sq / self.samples.len() as f64).sqrt() as f32
    }

    /// Split interleaved samples into one Vec per channel
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let ch = self.channels as usize;
        let frames = self.frame_count();
        let mut planes = vec![Vec::with_capacity(frames); ch];
        for frame in self.samples.chunks_exact(ch) {
            for (c, sample) in frame.iter().enumerate() {
                planes[c].push(*sample);
            }
        }
        planes
    }

    /// Rebuild an interleaved chunk from per-channel planes
    pub fn interleave(planes: &[Vec<f32>], sample_rate: u32) -> Self {
        let ch = planes.len();
        let frames = planes.first().map(|p| p.len()).unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * ch);
        for i in 0..frames {
            for plane in planes {
                samples.push(plane[i]);
            }
        }
        Self {
            samples,
            sample_rate,
            channels: ch as u8,
        }
    }
}

/// One mastered chunk, output of the chunked processor.
///
/// Invariant: `samples.len() == spec.length_samples as usize * channels`.
/// When decode short-reads at end of track, `spec.length_samples` reflects
/// the frames actually decoded, so the invariant still holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedChunk {
    /// Window this chunk covers
    pub spec: ChunkSpec,

    /// Mastered PCM samples (interleaved, same dtype as the decoded input)
    pub samples: Vec<f32>,

    /// Sample rate, unchanged from the source
    pub sample_rate: u32,

    /// Channel count, unchanged from the source
    pub channels: u8,
}

impl ProcessedChunk {
    /// Number of sample frames
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deinterleave_round_trip() {
        let chunk = AudioChunk::new(vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0], 44100, 2);
        assert_eq!(chunk.frame_count(), 3);

        let planes = chunk.deinterleave();
        assert_eq!(planes.len(), 2);
        assert_eq!(planes[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(planes[1], vec![-1.0, -2.0, -3.0]);

        let rebuilt = AudioChunk::interleave(&planes, 44100);
        assert_eq!(rebuilt.samples, chunk.samples);
        assert_eq!(rebuilt.channels, 2);
    }

    #[test]
    fn rms_of_constant_signal() {
        let chunk = AudioChunk::new(vec![0.5; 1000], 44100, 1);
        assert!((chunk.rms() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rms_of_empty_is_zero() {
        let chunk = AudioChunk::new(vec![], 44100, 2);
        assert_eq!(chunk.rms(), 0.0);
    }
}
