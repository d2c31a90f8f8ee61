//! WebSocket client for the AWS Transcribe streaming endpoint.
//!
//! Audio goes out as float->s16le PCM wrapped in `AudioEvent` frames;
//! results come back as event-stream messages whose JSON payload carries
//! `Transcript.Results`. An `exception` message type is fatal for the
//! session.
//!
//! The transport has no independently readable result channel worth a
//! dedicated task (results arrive interleaved on the same socket at the
//! pace of the audio), so `needs_results_task` is `false` and the
//! session polls `read_result` inline in its send loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info, warn};

use super::eventstream::{EventStreamMessage, decode, encode_audio_event};
use super::presign::PresignedUrlBuilder;
use crate::audio::{AudioChunk, f32_to_s16le};
use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::language;
use crate::providers::base::{ProviderAdapter, ResultKind, TranscriptionResult};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Event-stream-over-WebSocket adapter for AWS Transcribe.
pub struct AwsTranscribeAdapter {
    config: TranscriptionConfig,
    signer: PresignedUrlBuilder,
    sink: Mutex<Option<WsSink>>,
    stream: Mutex<Option<WsStream>>,
    closed: AtomicBool,
}

impl AwsTranscribeAdapter {
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscribeError> {
        let secret_key = config.secret_key.clone().unwrap_or_default();
        let signer = PresignedUrlBuilder::new(&config.api_key, &secret_key, &config.region)?;
        Ok(Self {
            config,
            signer,
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

}

/// Map one decoded event-stream message to the canonical result shape.
///
/// Separated from the socket plumbing so the protocol mapping is
/// testable without a connection.
fn map_event(
    message: &EventStreamMessage,
    language: &str,
) -> Result<Option<TranscriptionResult>, TranscribeError> {
    match message.header(":message-type") {
        Some("event") => {
            let results = message
                .payload
                .pointer("/Transcript/Results")
                .and_then(Value::as_array);
            let Some(first) = results.and_then(|r| r.first()) else {
                // An event with no results is a keep-alive, not an error.
                return Ok(None);
            };
            let text = first
                .pointer("/Alternatives/0/Transcript")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let is_partial = first
                .get("IsPartial")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let seconds_to_ms =
                |v: &Value| v.as_f64().map(|s| (s * 1000.0) as u64).unwrap_or(0);
            let start_ts_ms = first.get("StartTime").map(seconds_to_ms).unwrap_or(0);
            let end_ts_ms = first.get("EndTime").map(seconds_to_ms).unwrap_or(0);

            Ok(Some(TranscriptionResult {
                start_ts_ms,
                end_ts_ms,
                text: text.to_string(),
                language: language.to_string(),
                kind: if is_partial {
                    ResultKind::Partial
                } else {
                    ResultKind::Speech
                },
            }))
        }
        Some("exception") => {
            let detail = message
                .payload
                .get("Message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified provider exception");
            Err(TranscribeError::Read(format!(
                "provider exception: {detail}"
            )))
        }
        other => {
            warn!("unhandled event-stream message type: {:?}", other);
            Ok(None)
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for AwsTranscribeAdapter {
    async fn connect(&self) -> Result<(), TranscribeError> {
        let language = language::to_bcp47(&self.config.language);
        let url = self
            .signer
            .presign(language, "pcm", self.config.sample_rate, Utc::now());

        debug!("connecting to Transcribe streaming endpoint");
        let connector = crate::providers::rustls_connector();
        let connect = connect_async_tls_with_config(url, None, false, Some(connector));
        let (ws, _response) = timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| TranscribeError::Connect("websocket handshake timed out".to_string()))?
            .map_err(|e| TranscribeError::Connect(format!("websocket handshake failed: {e}")))?;
        info!("connected to AWS Transcribe streaming");

        let (sink, stream) = ws.split();
        *self.sink.lock().await = Some(sink);
        *self.stream.lock().await = Some(stream);
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_audio(&self, chunk: &AudioChunk) -> Result<(), TranscribeError> {
        let mut sink = self.sink.lock().await;
        let sink = sink
            .as_mut()
            .ok_or_else(|| TranscribeError::Send("not connected".to_string()))?;

        let pcm = f32_to_s16le(&chunk.samples);
        let frame = encode_audio_event(&pcm);
        sink.send(Message::Binary(frame.into()))
            .await
            .map_err(|e| TranscribeError::Send(format!("audio frame write failed: {e}")))
    }

    async fn read_result(&self) -> Result<Option<TranscriptionResult>, TranscribeError> {
        let mut stream = self.stream.lock().await;
        let stream = stream
            .as_mut()
            .ok_or_else(|| TranscribeError::Read("not connected".to_string()))?;

        match stream.next().await {
            Some(Ok(Message::Binary(data))) => {
                let message = decode(&data)?;
                map_event(&message, language::to_bcp47(&self.config.language))
            }
            Some(Ok(Message::Close(frame))) => {
                info!("websocket closed by provider: {:?}", frame);
                Ok(None)
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => Ok(None),
            Some(Ok(other)) => {
                warn!("unexpected non-binary frame from Transcribe: {:?}", other);
                Ok(None)
            }
            Some(Err(e)) => Err(TranscribeError::Read(format!("websocket read failed: {e}"))),
            None => Err(TranscribeError::Read("websocket stream ended".to_string())),
        }
    }

    async fn close(&self) -> Result<(), TranscribeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("close frame write failed (already closed?): {}", e);
            }
        }
        self.stream.lock().await.take();
        info!("AWS Transcribe connection closed");
        Ok(())
    }

    fn needs_results_task(&self) -> bool {
        false
    }

    fn provider_info(&self) -> &'static str {
        "AWS Transcribe streaming (event-stream WebSocket)"
    }
}
