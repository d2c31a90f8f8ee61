//! Canonical result type and the adapter contract every transcription
//! provider implements.

use crate::audio::AudioChunk;
use crate::error::TranscribeError;

/// Classification of a transcription result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Kind could not be determined from the wire message.
    Unknown,
    /// Sentence-final text; immutable for the covered span.
    Speech,
    /// No speech detected over the covered span.
    Silence,
    /// Provisional text; may be superseded by a later partial or final.
    Partial,
}

/// A timestamped transcription result in the crate's uniform shape.
///
/// Consumers must treat [`ResultKind::Speech`] as sentence-final and
/// [`ResultKind::Partial`] as overwritable text for the same span.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    /// Start of the covered span, ms since session start.
    pub start_ts_ms: u64,
    /// End of the covered span, ms since session start.
    pub end_ts_ms: u64,
    /// Transcribed text.
    pub text: String,
    /// Language tag of the text.
    pub language: String,
    pub kind: ResultKind,
}

impl TranscriptionResult {
    pub fn is_final(&self) -> bool {
        self.kind == ResultKind::Speech
    }
}

/// Contract between the session and one transcription backend.
///
/// Adapters keep their transport halves behind internal async locks so
/// the session's send loop and result loop can run concurrently against
/// a shared reference. The session owns the lifecycle: it calls
/// `connect` before the loops start and `close` exactly once after they
/// join. `close` must be safe to call even if `connect` never completed.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Establish the provider connection. Must fail within a bounded
    /// handshake timeout rather than hang.
    async fn connect(&self) -> Result<(), TranscribeError>;

    /// Frame and write one audio chunk.
    async fn send_audio(&self, chunk: &AudioChunk) -> Result<(), TranscribeError>;

    /// Block for the next provider message and map it to the canonical
    /// result shape.
    ///
    /// `Ok(None)` means "no result in this message" (metadata, keep-alive,
    /// unknown-but-harmless frames) and is never an error. Protocol
    /// violations and provider-reported exceptions are fatal errors.
    async fn read_result(&self) -> Result<Option<TranscriptionResult>, TranscribeError>;

    /// Tear the connection down. Idempotent.
    async fn close(&self) -> Result<(), TranscribeError>;

    /// Whether results arrive on an independently readable channel that
    /// deserves its own task. When `false` the session reads results
    /// inline in the send loop with a short bound.
    fn needs_results_task(&self) -> bool {
        true
    }

    /// Human-readable provider identification for logs.
    fn provider_info(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_finality() {
        let mut result = TranscriptionResult {
            start_ts_ms: 0,
            end_ts_ms: 1200,
            text: "hello world".to_string(),
            language: "en-US".to_string(),
            kind: ResultKind::Partial,
        };
        assert!(!result.is_final());
        result.kind = ResultKind::Speech;
        assert!(result.is_final());
    }
}
