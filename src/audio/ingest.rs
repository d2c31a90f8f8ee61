//! Producer/consumer audio pipeline between the host's capture thread
//! and a session's send loop.
//!
//! The host pushes raw per-channel packets from its real-time thread;
//! the send loop periodically extracts bounded, timestamped chunks that
//! have already been downmixed and resampled to the session's target
//! format. Raw samples and per-packet metadata are queued separately so
//! timestamps survive buffer compaction.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::resample::check_channel_layout;
use super::{AudioChunk, AudioInfo, StreamResampler, downmix_to_mono};
use crate::error::TranscribeError;

/// Cap on a single extracted chunk, in seconds of input audio.
const MAX_CHUNK_SECONDS: u64 = 10;

struct IngestBuffers {
    /// One sample buffer per capture channel.
    channel_buffers: Vec<VecDeque<f32>>,
    /// Packet metadata, FIFO, parallel to the sample buffers.
    infos: VecDeque<AudioInfo>,
}

/// Thread-safe ingest buffer with capped chunk extraction.
///
/// `push` never blocks on anything but the buffer mutex; if the host
/// feeds faster than extraction drains, the buffers grow until the send
/// loop catches up. Nothing is dropped implicitly.
pub struct AudioIngestPipeline {
    shared: Mutex<IngestBuffers>,
    /// Locked only by the extracting task, never by `push`.
    resampler: Mutex<StreamResampler>,
    notify: Notify,
    stop: AtomicBool,
    source_rate: u32,
    channels: usize,
    max_chunk_frames: u64,
}

impl AudioIngestPipeline {
    pub fn new(
        source_rate: u32,
        channels: usize,
        target_rate: u32,
    ) -> Result<Self, TranscribeError> {
        if source_rate == 0 || channels == 0 {
            return Err(TranscribeError::Config(
                "ingest pipeline needs a non-zero sample rate and channel count".to_string(),
            ));
        }
        Ok(Self {
            shared: Mutex::new(IngestBuffers {
                channel_buffers: (0..channels).map(|_| VecDeque::new()).collect(),
                infos: VecDeque::new(),
            }),
            resampler: Mutex::new(StreamResampler::new(source_rate, target_rate)?),
            notify: Notify::new(),
            stop: AtomicBool::new(false),
            source_rate,
            channels,
            max_chunk_frames: source_rate as u64 * MAX_CHUNK_SECONDS,
        })
    }

    /// Append one captured packet and wake a waiting extractor.
    ///
    /// Called from the host's real-time audio thread; holds the buffer
    /// mutex only for the copy.
    pub fn push(&self, channel_samples: &[&[f32]], frames: u32, timestamp_offset_ns: u64) {
        check_channel_layout(self.channels, channel_samples.len());
        {
            let mut shared = self.shared.lock();
            for (c, buffer) in shared.channel_buffers.iter_mut().enumerate() {
                if let Some(samples) = channel_samples.get(c) {
                    buffer.extend(samples.iter().take(frames as usize).copied());
                }
            }
            shared.infos.push_back(AudioInfo {
                frames,
                timestamp_offset_ns,
            });
        }
        self.notify.notify_one();
    }

    /// Extract the next chunk, or `None` when no packet metadata is
    /// queued (or the resampler is still filling its first block).
    ///
    /// Whole packets are consumed until the 10-second frame cap would be
    /// exceeded; the packet that would cross the cap stays queued for the
    /// next extraction. Packets are never split, so a single oversized
    /// packet is taken whole.
    pub fn extract(&self) -> Option<AudioChunk> {
        let (channels_data, num_frames, start_ts_ns, end_ts_ns) = {
            let mut shared = self.shared.lock();

            let mut num_frames: u64 = 0;
            let mut start_ts_ns = 0u64;
            let mut last_info: Option<AudioInfo> = None;
            while let Some(&info) = shared.infos.front() {
                if num_frames > 0 && num_frames + info.frames as u64 > self.max_chunk_frames {
                    break;
                }
                shared.infos.pop_front();
                if last_info.is_none() {
                    start_ts_ns = info.timestamp_offset_ns;
                }
                num_frames += info.frames as u64;
                last_info = Some(info);
            }
            let last = last_info?;

            let frames_to_ns = |frames: u64| frames * 1_000_000_000 / self.source_rate as u64;
            let end_ts_ns = last.timestamp_offset_ns + frames_to_ns(last.frames as u64);
            if start_ts_ns > end_ts_ns {
                // Incoming media had a timestamp reset; rebuild the start
                // from the end and the accumulated frame count.
                debug!(
                    "timestamp discontinuity: start {} > end {}, recomputing",
                    start_ts_ns, end_ts_ns
                );
                start_ts_ns = end_ts_ns.saturating_sub(frames_to_ns(num_frames));
            }

            let channels_data: Vec<Vec<f32>> = shared
                .channel_buffers
                .iter_mut()
                .map(|buffer| {
                    let take = (num_frames as usize).min(buffer.len());
                    buffer.drain(..take).collect()
                })
                .collect();
            (channels_data, num_frames, start_ts_ns, end_ts_ns)
        };

        if num_frames == 0 {
            return None;
        }

        // Downmix and resample outside the buffer lock so the host's
        // push path never waits on DSP.
        let mono = downmix_to_mono(&channels_data);
        let mut samples = Vec::new();
        self.resampler.lock().process(&mono, &mut samples);
        if samples.is_empty() {
            return None;
        }

        Some(AudioChunk {
            samples,
            start_ts_ns,
            end_ts_ns,
        })
    }

    /// Park until audio is queued or a stop is requested, with a safety
    /// timeout so a missed wake can never deadlock the send loop.
    pub async fn wait_for_audio(&self, wait_timeout: Duration) {
        if self.stop_requested() || self.has_audio() {
            return;
        }
        let notified = self.notify.notified();
        // Re-check after arming the waiter; a push in between has already
        // stored its permit.
        if self.stop_requested() || self.has_audio() {
            return;
        }
        let _ = tokio::time::timeout(wait_timeout, notified).await;
    }

    /// Request extraction waiters to wake and observe the stop flag.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
        self.notify.notify_one();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn has_audio(&self) -> bool {
        !self.shared.lock().infos.is_empty()
    }

    /// Total frames currently queued, for diagnostics.
    pub fn queued_frames(&self) -> u64 {
        self.shared
            .lock()
            .infos
            .iter()
            .map(|info| info.frames as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;

    fn pipeline() -> AudioIngestPipeline {
        AudioIngestPipeline::new(RATE, 1, RATE).unwrap()
    }

    fn push_frames(p: &AudioIngestPipeline, frames: u32, ts_ns: u64) {
        let samples = vec![0.25f32; frames as usize];
        p.push(&[&samples], frames, ts_ns);
    }

    #[test]
    fn test_extract_empty_returns_none() {
        assert!(pipeline().extract().is_none());
    }

    #[test]
    fn test_extract_single_packet_timestamps() {
        let p = pipeline();
        // 16000 frames = 1 s starting at t = 2 s
        push_frames(&p, RATE, 2_000_000_000);

        let chunk = p.extract().expect("chunk");
        assert_eq!(chunk.samples.len(), RATE as usize);
        assert_eq!(chunk.start_ts_ns, 2_000_000_000);
        assert_eq!(chunk.end_ts_ns, 3_000_000_000);
        assert!(p.extract().is_none());
    }

    #[test]
    fn test_chunk_cap_retains_remainder() {
        let p = pipeline();
        // Three 5-second packets: the cap is 10 s, so the first extract
        // takes exactly two packets and the third stays queued.
        let five_s = RATE * 5;
        push_frames(&p, five_s, 0);
        push_frames(&p, five_s, 5_000_000_000);
        push_frames(&p, five_s, 10_000_000_000);

        let chunk = p.extract().expect("capped chunk");
        assert_eq!(chunk.samples.len(), (five_s * 2) as usize);
        assert_eq!(chunk.start_ts_ns, 0);
        assert_eq!(chunk.end_ts_ns, 10_000_000_000);
        assert_eq!(p.queued_frames(), five_s as u64);

        let rest = p.extract().expect("remainder chunk");
        assert_eq!(rest.samples.len(), five_s as usize);
        assert_eq!(rest.start_ts_ns, 10_000_000_000);
        assert!(p.extract().is_none());
    }

    #[test]
    fn test_timestamp_discontinuity_recomputes_start() {
        let p = pipeline();
        // Second packet jumps backwards, as after a host clock reset.
        push_frames(&p, RATE, 5_000_000_000);
        push_frames(&p, RATE, 1_000_000_000);

        let chunk = p.extract().expect("chunk");
        // end = 1 s + 1 s of frames; start rebuilt from end - 2 s.
        assert_eq!(chunk.end_ts_ns, 2_000_000_000);
        assert_eq!(chunk.start_ts_ns, 0);
    }

    #[test]
    fn test_oversized_single_packet_taken_whole() {
        let p = pipeline();
        let twelve_s = RATE * 12;
        push_frames(&p, twelve_s, 0);

        let chunk = p.extract().expect("chunk");
        assert_eq!(chunk.samples.len(), twelve_s as usize);
        assert!(p.extract().is_none());
    }

    #[test]
    fn test_stereo_downmix() {
        let p = AudioIngestPipeline::new(RATE, 2, RATE).unwrap();
        let left = vec![1.0f32; 100];
        let right = vec![0.0f32; 100];
        p.push(&[&left, &right], 100, 0);

        let chunk = p.extract().expect("chunk");
        assert_eq!(chunk.samples.len(), 100);
        assert!((chunk.samples[0] - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_wait_returns_on_push() {
        let p = std::sync::Arc::new(pipeline());
        let waiter = p.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_for_audio(Duration::from_secs(5)).await;
            waiter.has_audio()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        push_frames(&p, 100, 0);
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_returns_on_stop() {
        let p = std::sync::Arc::new(pipeline());
        let waiter = p.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_for_audio(Duration::from_secs(5)).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        p.request_stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("wait did not unblock on stop")
            .unwrap();
    }
}
