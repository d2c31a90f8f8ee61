//! Streaming speech-to-text client library.
//!
//! The host pushes raw PCM packets from its capture thread; the crate
//! buffers and resamples them into bounded timestamped chunks, streams
//! the chunks to a remote transcription provider over a long-lived
//! connection, and decodes provider wire responses into a uniform
//! stream of timestamped results.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use streamscribe::{AudioIngestPipeline, TranscriptionConfig, TranscriptionSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TranscriptionConfig {
//!         provider: "deepgram".to_string(),
//!         api_key: "your-api-key".to_string(),
//!         language: "en".to_string(),
//!         ..Default::default()
//!     };
//!
//!     // Capture side: 48 kHz stereo in, 16 kHz mono out.
//!     let pipeline = Arc::new(AudioIngestPipeline::new(48000, 2, config.sample_rate)?);
//!
//!     let callback = Arc::new(|result: streamscribe::TranscriptionResult| {
//!         Box::pin(async move {
//!             println!("[{:?}] {}", result.kind, result.text);
//!         }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
//!     });
//!
//!     let mut session = TranscriptionSession::new(&config, pipeline.clone(), callback)?;
//!     session.start().await?;
//!
//!     // ... host audio thread calls pipeline.push(...) ...
//!
//!     session.stop().await;
//!     Ok(())
//! }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod language;
pub mod providers;
pub mod session;

// Re-export commonly used items for convenience
pub use audio::{AudioChunk, AudioIngestPipeline, AudioInfo, f32_to_s16le};
pub use config::{TRANSCRIPTION_SAMPLE_RATE, TranscriptionConfig};
pub use error::TranscribeError;
pub use providers::{
    ProviderAdapter, ProviderKind, ResultKind, TranscriptionResult, create_adapter,
};
pub use session::{
    ErrorCallback, ResultCallback, SessionState, SessionStats, TranscriptionSession,
};
