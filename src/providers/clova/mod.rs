//! Clova Speech NEST provider: bidirectional gRPC streaming with bearer
//! token auth.
//!
//! The stream opens with one CONFIG message and `connect` completes only
//! once the server has accepted the stream, so configuration is a hard
//! synchronization point before any audio is sent. Each audio chunk
//! becomes one DATA message with a monotonically increasing `seqId` used
//! to correlate result timing back to chunk timestamps.

pub mod proto;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::MetadataValue;
use tonic::transport::{ClientTlsConfig, Endpoint};
use tracing::{debug, info};

use proto::nest_service_client::NestServiceClient;
use proto::{NestConfig, NestData, NestRequest, RequestType, nest_request};

use crate::audio::{AudioChunk, f32_to_s16le};
use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::language;
use crate::providers::base::{ProviderAdapter, ResultKind, TranscriptionResult};

const NEST_ENDPOINT: &str = "https://clovaspeech-gw.ncloud.com:50051";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// Running partial sentence built from response fragments.
#[derive(Debug, Default)]
struct PartialSentence {
    text: String,
    start_ts_ms: u64,
    end_ts_ms: u64,
}

/// Bidirectional-RPC adapter for Clova NEST recognition.
pub struct ClovaAdapter {
    config: TranscriptionConfig,
    sender: Mutex<Option<mpsc::Sender<NestRequest>>>,
    stream: Mutex<Option<tonic::codec::Streaming<proto::NestResponse>>>,
    next_seq: AtomicI32,
    /// seqId -> (start_ms, end_ms) of the chunk that carried it.
    chunk_times: parking_lot::Mutex<HashMap<i32, (u64, u64)>>,
    partial: parking_lot::Mutex<PartialSentence>,
    closed: AtomicBool,
}

impl ClovaAdapter {
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscribeError> {
        if config.api_key.is_empty() {
            return Err(TranscribeError::AuthConfig(
                "Clova requires a bearer token".to_string(),
            ));
        }
        Ok(Self {
            config,
            sender: Mutex::new(None),
            stream: Mutex::new(None),
            next_seq: AtomicI32::new(1),
            chunk_times: parking_lot::Mutex::new(HashMap::new()),
            partial: parking_lot::Mutex::new(PartialSentence::default()),
            closed: AtomicBool::new(false),
        })
    }

    fn config_request(&self) -> NestRequest {
        let config_json = serde_json::json!({
            "transcription": {
                "language": language::to_short(&self.config.language),
            }
        });
        NestRequest {
            r#type: RequestType::Config as i32,
            part: Some(nest_request::Part::Config(NestConfig {
                config: config_json.to_string(),
            })),
        }
    }

    fn record_chunk_timing(&self, seq: i32, start_ts_ms: u64, end_ts_ms: u64) {
        self.chunk_times.lock().insert(seq, (start_ts_ms, end_ts_ms));
    }

    /// Fold one response document into the running sentence.
    ///
    /// Fragments accumulate into a partial until the sentence boundary
    /// is observed. The boundary rule (an empty text fragment following
    /// accumulated text is sentence-final) is specific to this
    /// provider's response format, not a session contract.
    fn process_contents(
        &self,
        contents: &str,
    ) -> Result<Option<TranscriptionResult>, TranscribeError> {
        let document: Value = serde_json::from_str(contents)
            .map_err(|e| TranscribeError::Format(format!("unparseable response document: {e}")))?;

        let Some(transcription) = document.get("transcription") else {
            debug!("response without transcription section");
            return Ok(None);
        };
        let text = transcription
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let seq = transcription
            .get("seqId")
            .and_then(Value::as_i64)
            .map(|v| v as i32);
        let timing = seq.and_then(|s| self.chunk_times.lock().remove(&s));

        let mut partial = self.partial.lock();
        if let Some((chunk_start, chunk_end)) = timing {
            if partial.text.is_empty() {
                partial.start_ts_ms = chunk_start;
            }
            partial.end_ts_ms = partial.end_ts_ms.max(chunk_end);
        }

        if text.is_empty() {
            if partial.text.is_empty() {
                return Ok(None);
            }
            let sentence = std::mem::take(&mut *partial);
            return Ok(Some(TranscriptionResult {
                start_ts_ms: sentence.start_ts_ms,
                end_ts_ms: sentence.end_ts_ms,
                text: sentence.text,
                language: language::to_short(&self.config.language).to_string(),
                kind: ResultKind::Speech,
            }));
        }

        partial.text.push_str(text);
        Ok(Some(TranscriptionResult {
            start_ts_ms: partial.start_ts_ms,
            end_ts_ms: partial.end_ts_ms,
            text: partial.text.clone(),
            language: language::to_short(&self.config.language).to_string(),
            kind: ResultKind::Partial,
        }))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ClovaAdapter {
    async fn connect(&self) -> Result<(), TranscribeError> {
        let tls = ClientTlsConfig::new().with_webpki_roots();
        let channel = Endpoint::from_static(NEST_ENDPOINT)
            .tls_config(tls)
            .map_err(|e| TranscribeError::Connect(format!("tls configuration failed: {e}")))?
            .connect_timeout(CONNECT_TIMEOUT)
            .connect()
            .await
            .map_err(|e| TranscribeError::Connect(format!("channel connect failed: {e}")))?;

        let bearer: MetadataValue<_> = format!("Bearer {}", self.config.api_key)
            .parse()
            .map_err(|_| {
                TranscribeError::AuthConfig("bearer token is not a valid header value".to_string())
            })?;

        // Queue CONFIG before the stream opens so it is the first message
        // the server sees; recognize() returning means the server accepted
        // the stream, which is the synchronization point audio waits on.
        let (tx, rx) = mpsc::channel::<NestRequest>(REQUEST_CHANNEL_CAPACITY);
        tx.send(self.config_request())
            .await
            .map_err(|_| TranscribeError::Connect("request channel closed".to_string()))?;

        let mut request = tonic::Request::new(ReceiverStream::new(rx));
        request.metadata_mut().insert("authorization", bearer);

        let mut client = NestServiceClient::new(channel);
        let response = client
            .recognize(request)
            .await
            .map_err(|status| {
                TranscribeError::Connect(format!("recognition stream rejected: {status}"))
            })?;
        info!("Clova NEST recognition stream established");

        *self.stream.lock().await = Some(response.into_inner());
        *self.sender.lock().await = Some(tx);
        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn send_audio(&self, chunk: &AudioChunk) -> Result<(), TranscribeError> {
        let sender = self.sender.lock().await;
        let sender = sender
            .as_ref()
            .ok_or_else(|| TranscribeError::Send("not connected".to_string()))?;

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.record_chunk_timing(seq, chunk.start_ts_ms(), chunk.end_ts_ms());

        let extra = serde_json::json!({ "seqId": seq, "epFlag": false });
        let request = NestRequest {
            r#type: RequestType::Data as i32,
            part: Some(nest_request::Part::Data(NestData {
                chunk: f32_to_s16le(&chunk.samples),
                extra_contents: extra.to_string(),
            })),
        };
        sender
            .send(request)
            .await
            .map_err(|_| TranscribeError::Send("recognition stream closed".to_string()))
    }

    async fn read_result(&self) -> Result<Option<TranscriptionResult>, TranscribeError> {
        let mut stream = self.stream.lock().await;
        let stream = stream
            .as_mut()
            .ok_or_else(|| TranscribeError::Read("not connected".to_string()))?;

        match stream.message().await {
            Ok(Some(response)) => self.process_contents(&response.contents),
            Ok(None) => Err(TranscribeError::Read(
                "recognition stream ended".to_string(),
            )),
            Err(status) => Err(TranscribeError::Read(format!(
                "recognition stream error: {status}"
            ))),
        }
    }

    async fn close(&self) -> Result<(), TranscribeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        // Dropping the sender half-closes the request stream; the server
        // finishes the response side.
        self.sender.lock().await.take();
        self.stream.lock().await.take();
        info!("Clova NEST connection closed");
        Ok(())
    }

    fn provider_info(&self) -> &'static str {
        "Clova Speech NEST (bidirectional gRPC)"
    }
}
