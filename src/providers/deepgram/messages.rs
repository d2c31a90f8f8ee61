//! Deepgram live-transcription wire messages.

use serde::Deserialize;

use crate::providers::base::{ResultKind, TranscriptionResult};

/// Top-level message from the `/v1/listen` socket.
#[derive(Debug, Deserialize)]
pub struct DeepgramResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub channel: Option<DeepgramChannel>,
    pub is_final: Option<bool>,
    pub speech_final: Option<bool>,
    /// Segment start, seconds since stream start.
    pub start: Option<f64>,
    /// Segment duration, seconds.
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramChannel {
    pub alternatives: Vec<DeepgramAlternative>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramAlternative {
    pub transcript: String,
    pub words: Option<Vec<DeepgramWord>>,
}

#[derive(Debug, Deserialize)]
pub struct DeepgramWord {
    pub word: String,
    /// Word start, seconds since stream start.
    pub start: f64,
    /// Word end, seconds since stream start.
    pub end: f64,
}

/// Error message shape (`type == "Error"`).
#[derive(Debug, Deserialize)]
pub struct DeepgramErrorMessage {
    pub description: Option<String>,
    pub message: Option<String>,
}

fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0) as u64
}

impl DeepgramResponse {
    /// Map a `Results` message to the canonical result shape.
    ///
    /// Word-level timestamps bound the span when present; otherwise the
    /// segment `start`/`duration` pair is used.
    pub fn to_result(&self, language: &str) -> Option<TranscriptionResult> {
        let alternative = self.channel.as_ref()?.alternatives.first()?;

        let (start_ts_ms, end_ts_ms) = match alternative.words.as_deref() {
            Some([first, .., last]) => (seconds_to_ms(first.start), seconds_to_ms(last.end)),
            Some([only]) => (seconds_to_ms(only.start), seconds_to_ms(only.end)),
            _ => {
                let start = self.start.unwrap_or(0.0);
                let end = start + self.duration.unwrap_or(0.0);
                (seconds_to_ms(start), seconds_to_ms(end))
            }
        };

        Some(TranscriptionResult {
            start_ts_ms,
            end_ts_ms,
            text: alternative.transcript.clone(),
            language: language.to_string(),
            kind: if self.is_final.unwrap_or(false) {
                ResultKind::Speech
            } else {
                ResultKind::Partial
            },
        })
    }
}
