//! Audio types and sample-format helpers shared by the ingest pipeline
//! and the provider adapters.

mod ingest;
mod resample;

pub use ingest::AudioIngestPipeline;
pub use resample::{StreamResampler, downmix_to_mono};

/// Per-ingested-packet metadata, queued separately from the raw samples
/// so timestamps survive buffer compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioInfo {
    /// Number of frames in the packet.
    pub frames: u32,
    /// Offset since the start of the session, in nanoseconds.
    pub timestamp_offset_ns: u64,
}

/// A bounded, timestamped segment of mono audio at the session's target
/// sample rate.
///
/// Chunks are produced by [`AudioIngestPipeline::extract`] and consumed
/// immediately by the adapter send path; they are not retained.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Mono samples in `[-1.0, 1.0]` at the target rate.
    pub samples: Vec<f32>,
    /// Monotonic offset of the first sample, ns since session start.
    pub start_ts_ns: u64,
    /// Monotonic offset just past the last sample, ns since session start.
    pub end_ts_ns: u64,
}

impl AudioChunk {
    /// Chunk start in milliseconds.
    pub fn start_ts_ms(&self) -> u64 {
        self.start_ts_ns / 1_000_000
    }

    /// Chunk end in milliseconds.
    pub fn end_ts_ms(&self) -> u64 {
        self.end_ts_ns / 1_000_000
    }
}

/// Convert float samples to 16-bit signed little-endian PCM.
///
/// Samples are clamped to `[-1.0, 1.0]` and scaled by 32767 with the
/// fractional part truncated, so full-scale input maps to `32767` /
/// `-32767` (never `-32768`).
pub fn f32_to_s16le(samples: &[f32]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let value = (clamped * 32767.0) as i16;
        pcm.extend_from_slice(&value.to_le_bytes());
    }
    pcm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion_boundaries() {
        let pcm = f32_to_s16le(&[1.0, -1.0, 0.0]);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 32767);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), -32767);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), 0);
    }

    #[test]
    fn test_pcm_conversion_clamps_out_of_range() {
        let pcm = f32_to_s16le(&[2.5, -3.0]);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 32767);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), -32767);
    }

    #[test]
    fn test_pcm_conversion_truncates() {
        // 0.5 * 32767 = 16383.5 -> truncated, not rounded
        let pcm = f32_to_s16le(&[0.5]);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 16383);
    }

    #[test]
    fn test_chunk_timestamp_units() {
        let chunk = AudioChunk {
            samples: vec![0.0; 160],
            start_ts_ns: 1_500_000_000,
            end_ts_ns: 1_510_000_000,
        };
        assert_eq!(chunk.start_ts_ms(), 1500);
        assert_eq!(chunk.end_ts_ms(), 1510);
    }
}
