//! Crossfade integration tests
//!
//! Exercises the processor's overlap blending end to end on a synthetic
//! phase-continuous tone: the blend must be seamless across the chunk
//! boundary, and re-applying a fade to an already-blended overlap (what a
//! client would do if it ignored `crossfade_already_applied`) must
//! measurably drop the level there.

use remaster_common::fade_curves::equal_power_gains;
use remaster_common::params::{MasteringPreset, ProcessingParameters};
use remaster_common::ChunkSpec;
use remaster_engine::audio::{AudioChunk, ChunkDecoder};
use remaster_engine::error::Result;
use remaster_engine::library::TrackInfo;
use remaster_engine::processing::{ChunkedAudioProcessor, ProcessingCache};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

const SAMPLE_RATE: u32 = 44100;
const CHANNELS: u8 = 2;

/// Phase-continuous sine tone. Any two decode ranges line up exactly, so a
/// correct blend is indistinguishable from the unbroken signal.
struct SineDecoder {
    total_frames: u64,
    freq_hz: f64,
    amplitude: f32,
}

impl ChunkDecoder for SineDecoder {
    fn decode_range(
        &self,
        track: &TrackInfo,
        start_sample: u64,
        length_samples: u32,
    ) -> Result<AudioChunk> {
        let end = (start_sample + length_samples as u64).min(self.total_frames);
        let ch = track.channels as usize;
        let mut samples = Vec::with_capacity((end - start_sample) as usize * ch);
        for frame in start_sample..end {
            let t = frame as f64 / track.sample_rate as f64;
            let v = (2.0 * std::f64::consts::PI * self.freq_hz * t).sin() as f32 * self.amplitude;
            for _ in 0..ch {
                samples.push(v);
            }
        }
        Ok(AudioChunk::new(samples, track.sample_rate, track.channels))
    }
}

/// 440 Hz at 0.9 full scale, windows of 1500 frames spaced 1000 apart, so
/// consecutive chunks share a 500-frame overlap.
fn make_processor() -> ChunkedAudioProcessor {
    make_processor_with(1500, 1000, 440.0, 0.9)
}

fn make_processor_with(
    window_frames: u32,
    interval_frames: u32,
    freq_hz: f64,
    amplitude: f32,
) -> ChunkedAudioProcessor {
    ChunkedAudioProcessor::new(
        Arc::new(SineDecoder {
            total_frames: 100_000,
            freq_hz,
            amplitude,
        }),
        Arc::new(ProcessingCache::new(8)),
        window_frames as f64 / SAMPLE_RATE as f64,
        interval_frames as f64 / SAMPLE_RATE as f64,
    )
}

fn track() -> TrackInfo {
    TrackInfo {
        track_id: Uuid::new_v4(),
        path: PathBuf::from("/synthetic"),
        sample_rate: SAMPLE_RATE,
        channels: CHANNELS,
        duration_samples: 100_000,
        source_signature: 7,
    }
}

fn spec(index: u32) -> ChunkSpec {
    ChunkSpec {
        index,
        start_sample: index as u64 * 1000,
        length_samples: 1500,
    }
}

fn params() -> ProcessingParameters {
    ProcessingParameters {
        preset: MasteringPreset::Flat,
        intensity: 0.5,
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

#[test]
fn blended_overlap_has_no_energy_dip() {
    let processor = make_processor();
    let track = track();
    let p = params();

    let first = processor
        .process_chunk(&track, spec(0), &p, None)
        .unwrap();
    let tail = first.tail.expect("full chunk carries a tail");
    let second = processor
        .process_chunk(&track, spec(1), &p, Some(&tail))
        .unwrap();

    // The leading 500 overlap frames were blended; the next 500 were not.
    // On a continuous tone both regions must carry the same energy.
    let ch = CHANNELS as usize;
    let overlap = &second.chunk.samples[..500 * ch];
    let body = &second.chunk.samples[500 * ch..1000 * ch];

    let rms_overlap = rms(overlap);
    let rms_body = rms(body);
    let ratio = rms_overlap / rms_body;
    assert!(
        (ratio - 1.0).abs() < 0.05,
        "overlap RMS {} vs body RMS {} (ratio {})",
        rms_overlap,
        rms_body,
        ratio
    );
}

#[test]
fn full_scale_kilohertz_overlap_keeps_its_energy() {
    // The stress case for summed fades: two full-scale 1 kHz windows
    // crossfaded over 1000 samples at 44100 Hz. Equal-power gains must hold
    // the level through the whole overlap with nothing clipped away.
    let processor = make_processor_with(5000, 4000, 1000.0, 1.0);
    let track = track();
    let p = params();

    let first = processor
        .process_chunk(
            &track,
            ChunkSpec {
                index: 0,
                start_sample: 0,
                length_samples: 5000,
            },
            &p,
            None,
        )
        .unwrap();
    let tail = first.tail.expect("full chunk carries a tail");
    let second = processor
        .process_chunk(
            &track,
            ChunkSpec {
                index: 1,
                start_sample: 4000,
                length_samples: 5000,
            },
            &p,
            Some(&tail),
        )
        .unwrap();

    let ch = CHANNELS as usize;
    let overlap = &second.chunk.samples[..1000 * ch];
    let body = &second.chunk.samples[1000 * ch..2000 * ch];

    let rms_overlap = rms(overlap);
    let rms_body = rms(body);
    let ratio = rms_overlap / rms_body;
    assert!(
        (ratio - 1.0).abs() < 0.05,
        "overlap RMS {} vs body RMS {} (ratio {})",
        rms_overlap,
        rms_body,
        ratio
    );
}

#[test]
fn blend_reproduces_the_continuous_signal() {
    let processor = make_processor();
    let track = track();
    let p = params();

    let first = processor
        .process_chunk(&track, spec(0), &p, None)
        .unwrap();
    let tail = first.tail.unwrap();
    let second = processor
        .process_chunk(&track, spec(1), &p, Some(&tail))
        .unwrap();

    // Chunk 1 starts at sample 1000 of the same tone
    let ch = CHANNELS as usize;
    for frame in 0..1500usize {
        let t = (1000 + frame) as f64 / SAMPLE_RATE as f64;
        let expected = (2.0 * std::f64::consts::PI * 440.0 * t).sin() as f32 * 0.9;
        for c in 0..ch {
            let got = second.chunk.samples[frame * ch + c];
            assert!(
                (got - expected).abs() < 1e-4,
                "frame {} ch {}: got {}, expected {}",
                frame,
                c,
                got,
                expected
            );
        }
    }
}

#[test]
fn refading_a_blended_overlap_drops_its_level() {
    // What happens when a downstream layer ignores the
    // crossfade_already_applied flag and fades the chunk in again: the
    // overlap loses energy it cannot get back. Average of sin^4 over the
    // quarter period puts the damage near -4 dB.
    let processor = make_processor();
    let track = track();
    let p = params();

    let first = processor
        .process_chunk(&track, spec(0), &p, None)
        .unwrap();
    let tail = first.tail.unwrap();
    let second = processor
        .process_chunk(&track, spec(1), &p, Some(&tail))
        .unwrap();

    let ch = CHANNELS as usize;
    let overlap_frames = 500usize;
    let mut refaded: Vec<f32> = second.chunk.samples[..overlap_frames * ch].to_vec();
    let denom = (overlap_frames - 1) as f32;
    for frame in 0..overlap_frames {
        let (_, gain_in) = equal_power_gains(frame as f32 / denom);
        for c in 0..ch {
            refaded[frame * ch + c] *= gain_in;
        }
    }

    let rms_correct = rms(&second.chunk.samples[..overlap_frames * ch]);
    let rms_refaded = rms(&refaded);
    assert!(rms_correct > 0.5, "tone should be near full scale");
    let ratio = rms_refaded / rms_correct;
    assert!(
        ratio > 0.5 && ratio < 0.7,
        "double-faded overlap should land near 0.61 of the correct level, got {}",
        ratio
    );
}
