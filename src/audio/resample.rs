//! Streaming resampler feeding the provider chunk format.
//!
//! Wraps a fixed-input-size FFT resampler and buffers arbitrary-length
//! input slices into full processing blocks. Input that does not fill a
//! block stays pending and is emitted with the next call, so chunk
//! boundaries never drop samples.

use rubato::{FftFixedIn, Resampler};
use tracing::{error, warn};

use crate::error::TranscribeError;

/// Processing block size fed to the FFT resampler.
const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Mix interleaved per-channel buffers down to mono by averaging.
pub fn downmix_to_mono(channels: &[Vec<f32>]) -> Vec<f32> {
    match channels {
        [] => Vec::new(),
        [mono] => mono.clone(),
        multi => {
            let frames = multi.iter().map(Vec::len).min().unwrap_or(0);
            let scale = 1.0 / multi.len() as f32;
            (0..frames)
                .map(|i| multi.iter().map(|ch| ch[i]).sum::<f32>() * scale)
                .collect()
        }
    }
}

/// Stateful mono resampler from the capture rate to the target rate.
///
/// When the rates match this is a passthrough with no added latency.
pub struct StreamResampler {
    resampler: Option<FftFixedIn<f32>>,
    in_buf: Vec<f32>,
}

impl StreamResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, TranscribeError> {
        let resampler = if source_rate == target_rate {
            None
        } else {
            Some(
                FftFixedIn::<f32>::new(
                    source_rate as usize,
                    target_rate as usize,
                    RESAMPLER_CHUNK_SIZE,
                    1,
                    1,
                )
                .map_err(|e| {
                    TranscribeError::Config(format!(
                        "failed to create resampler {source_rate} -> {target_rate}: {e}"
                    ))
                })?,
            )
        };
        Ok(Self {
            resampler,
            in_buf: Vec::with_capacity(RESAMPLER_CHUNK_SIZE),
        })
    }

    /// Feed `src` through the resampler, appending output samples to `out`.
    ///
    /// A trailing partial block is retained internally until enough input
    /// arrives to fill it.
    pub fn process(&mut self, mut src: &[f32], out: &mut Vec<f32>) {
        let Some(resampler) = self.resampler.as_mut() else {
            out.extend_from_slice(src);
            return;
        };

        while !src.is_empty() {
            let space = RESAMPLER_CHUNK_SIZE - self.in_buf.len();
            let take = space.min(src.len());
            self.in_buf.extend_from_slice(&src[..take]);
            src = &src[take..];

            if self.in_buf.len() == RESAMPLER_CHUNK_SIZE {
                match resampler.process(&[&self.in_buf[..]], None) {
                    Ok(blocks) => {
                        if let Some(mono) = blocks.first() {
                            out.extend_from_slice(mono);
                        }
                    }
                    Err(e) => {
                        // Drop the block rather than poison the stream.
                        error!("resampler failed on a full block: {}", e);
                    }
                }
                self.in_buf.clear();
            }
        }
    }

    /// Number of input samples buffered waiting for a full block.
    pub fn pending(&self) -> usize {
        if self.resampler.is_some() {
            self.in_buf.len()
        } else {
            0
        }
    }
}

impl std::fmt::Debug for StreamResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResampler")
            .field("passthrough", &self.resampler.is_none())
            .field("pending", &self.in_buf.len())
            .finish()
    }
}

/// Warn once when the host feeds a layout the pipeline cannot use.
pub(crate) fn check_channel_layout(expected: usize, got: usize) {
    if expected != got {
        warn!(
            "audio packet has {} channels, pipeline configured for {}",
            got, expected
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut rs = StreamResampler::new(16000, 16000).unwrap();
        let mut out = Vec::new();
        rs.process(&[0.1, 0.2, 0.3], &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.3]);
        assert_eq!(rs.pending(), 0);
    }

    #[test]
    fn test_downsampling_ratio() {
        let mut rs = StreamResampler::new(48000, 16000).unwrap();
        let mut out = Vec::new();
        // 48000 input samples = 1 s -> expect ~16000 output samples,
        // minus at most one pending block.
        rs.process(&vec![0.0f32; 48000], &mut out);
        let produced = out.len();
        assert!(produced > 15000, "produced only {produced} samples");
        assert!(produced <= 16000);
        assert!(rs.pending() < RESAMPLER_CHUNK_SIZE);
    }

    #[test]
    fn test_partial_block_is_retained() {
        let mut rs = StreamResampler::new(48000, 16000).unwrap();
        let mut out = Vec::new();
        rs.process(&[0.0f32; 100], &mut out);
        assert!(out.is_empty());
        assert_eq!(rs.pending(), 100);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let left = vec![1.0f32, 0.0];
        let right = vec![0.0f32, 1.0];
        let mono = downmix_to_mono(&[left, right]);
        assert_eq!(mono, vec![0.5, 0.5]);
    }

    #[test]
    fn test_downmix_single_channel_is_identity() {
        let mono = downmix_to_mono(&[vec![0.25f32, -0.25]]);
        assert_eq!(mono, vec![0.25, -0.25]);
    }
}
