//! Audio decoder using symphonia
//!
//! Decodes a sample range from an audio file (MP3, FLAC, Vorbis, WAV) to
//! interleaved f32 PCM. Positioning is two-stage: the format reader seeks
//! to the packet at or before the requested sample, then decoded frames
//! are skipped up to the exact start, so chunk cost tracks chunk length
//! rather than position in the file. Containers that cannot seek fall back
//! to decoding from the start of the stream.
//!
//! A short read at end of track is valid: the returned chunk simply carries
//! fewer frames than requested. Decode failures are terminal for the
//! affected chunk and are never retried here.

use crate::audio::types::AudioChunk;
use crate::error::{Error, Result};
use crate::library::TrackInfo;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoder seam between the chunked processor and the codec layer.
///
/// Tests substitute an implementation with a call counter and synthetic PCM;
/// production uses [`SymphoniaDecoder`].
pub trait ChunkDecoder: Send + Sync {
    /// Decode `length_samples` frames starting at `start_sample`.
    ///
    /// Returns fewer frames when the track ends inside the requested range.
    fn decode_range(
        &self,
        track: &TrackInfo,
        start_sample: u64,
        length_samples: u32,
    ) -> Result<AudioChunk>;
}

/// Symphonia-backed decoder
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    /// Open a file and return its format reader plus the selected track id.
    fn open(path: &Path) -> Result<(Box<dyn FormatReader>, u32)> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Decode(format!("failed to open {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("failed to probe format: {}", e)))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("no audio track found".to_string()))?;

        let track_id = track.id;
        Ok((format, track_id))
    }

    /// Probe a file for `(sample_rate, channels, duration_samples)`.
    ///
    /// Falls back to counting decoded frames when the container does not
    /// declare a frame count (common for some MP3 files).
    pub fn probe_file(path: &Path) -> Result<(u32, u8, u64)> {
        let (mut format, track_id) = Self::open(path)?;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.id == track_id)
            .ok_or_else(|| Error::Decode("selected track disappeared".to_string()))?;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| Error::Decode("sample rate not declared".to_string()))?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u8)
            .ok_or_else(|| Error::Decode("channel count not declared".to_string()))?;

        if let Some(n_frames) = codec_params.n_frames {
            return Ok((sample_rate, channels, n_frames));
        }

        // No declared duration: decode and count.
        warn!(
            "{}: container declares no frame count, counting by decode",
            path.display()
        );
        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("failed to create decoder: {}", e)))?;

        let mut frames: u64 = 0;
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Error::Decode(format!("packet read failed: {}", e))),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(decoded) => frames += decoded.frames() as u64,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Recoverable per symphonia docs: skip the bad packet
                    warn!("skipping undecodable packet: {}", e);
                }
                Err(e) => return Err(Error::Decode(format!("decode failed: {}", e))),
            }
        }
        Ok((sample_rate, channels, frames))
    }
}

impl ChunkDecoder for SymphoniaDecoder {
    fn decode_range(
        &self,
        track: &TrackInfo,
        start_sample: u64,
        length_samples: u32,
    ) -> Result<AudioChunk> {
        debug!(
            "decoding {} frames at {} from {}",
            length_samples,
            start_sample,
            track.path.display()
        );

        let (mut format, track_id) = Self::open(&track.path)?;
        let codec_params = format
            .tracks()
            .iter()
            .find(|t| t.id == track_id)
            .ok_or_else(|| Error::Decode("selected track disappeared".to_string()))?
            .codec_params
            .clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("failed to create decoder: {}", e)))?;

        let channels = track.channels as usize;
        if channels == 0 {
            return Err(Error::Decode("track has zero channels".to_string()));
        }
        let want = length_samples as usize * channels;
        let range_end = start_sample + length_samples as u64;

        let mut collected: Vec<f32> = Vec::with_capacity(want);
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        // Coarse positioning: land on the packet at or before the start
        // sample, then let the intersection below skip the remainder frame
        // by frame. Audio track timestamps count frames, so `start_sample`
        // is directly usable as the target.
        let mut frames_seen: u64 = 0;
        if start_sample > 0 {
            match format.seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: start_sample,
                    track_id,
                },
            ) {
                Ok(seeked) => {
                    decoder.reset();
                    frames_seen = seeked.actual_ts;
                }
                Err(e) => {
                    // Not every container supports seeking; reopen and walk
                    // the stream from the top.
                    debug!(
                        "seek to {} in {} failed ({}), decoding from start",
                        start_sample,
                        track.path.display(),
                        e
                    );
                    let (reopened, _) = Self::open(&track.path)?;
                    format = reopened;
                    decoder = symphonia::default::get_codecs()
                        .make(&codec_params, &DecoderOptions::default())
                        .map_err(|e| {
                            Error::Decode(format!("failed to create decoder: {}", e))
                        })?;
                }
            }
        }

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // End of stream; a short read here is valid
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(Error::Decode(format!("packet read failed: {}", e))),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("decode failed: {}", e))),
            };

            let packet_frames = decoded.frames() as u64;
            let packet_start = frames_seen;
            let packet_end = frames_seen + packet_frames;
            frames_seen = packet_end;

            // Skip packets entirely before the requested range
            if packet_end <= start_sample {
                continue;
            }

            if sample_buf
                .as_ref()
                .map(|b| b.capacity() < decoded.capacity() * channels)
                .unwrap_or(true)
            {
                sample_buf = Some(SampleBuffer::<f32>::new(
                    decoded.capacity() as u64,
                    *decoded.spec(),
                ));
            }
            let buf = sample_buf.as_mut().expect("sample buffer initialized above");
            buf.copy_interleaved_ref(decoded);
            let samples = buf.samples();

            // Intersect this packet's frame range with the requested range
            let copy_from = start_sample.max(packet_start);
            let copy_to = range_end.min(packet_end);
            if copy_from < copy_to {
                let first = (copy_from - packet_start) as usize * channels;
                let last = (copy_to - packet_start) as usize * channels;
                collected.extend_from_slice(&samples[first..last]);
            }

            if frames_seen >= range_end {
                break;
            }
        }

        if collected.len() < want {
            debug!(
                "short read: wanted {} frames, decoded {}",
                length_samples,
                collected.len() / channels
            );
        }

        Ok(AudioChunk::new(
            collected,
            track.sample_rate,
            track.channels,
        ))
    }
}
