//! Deepgram live-transcription provider: plain JSON over a TLS
//! WebSocket.
//!
//! Audio goes out as raw s16le PCM binary frames; results come back as
//! JSON text frames. Unknown message types are logged and skipped;
//! only malformed JSON and provider-reported errors are fatal.

mod messages;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async_tls_with_config};
use tracing::{debug, info, warn};
use url::Url;

pub use messages::{DeepgramErrorMessage, DeepgramResponse};

use crate::audio::{AudioChunk, f32_to_s16le};
use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::language;
use crate::providers::base::{ProviderAdapter, TranscriptionResult};

const LISTEN_ENDPOINT: &str = "wss://api.deepgram.com/v1/listen";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// JSON-over-WebSocket adapter for Deepgram.
pub struct DeepgramAdapter {
    config: TranscriptionConfig,
    sink: Mutex<Option<WsSink>>,
    stream: Mutex<Option<WsStream>>,
    closed: AtomicBool,
}

impl DeepgramAdapter {
    pub fn new(config: TranscriptionConfig) -> Result<Self, TranscribeError> {
        if config.api_key.is_empty() {
            return Err(TranscribeError::AuthConfig(
                "Deepgram requires an API key".to_string(),
            ));
        }
        Ok(Self {
            config,
            sink: Mutex::new(None),
            stream: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    fn build_listen_url(&self) -> Result<String, TranscribeError> {
        let mut url = Url::parse(LISTEN_ENDPOINT)
            .map_err(|e| TranscribeError::Config(format!("invalid listen endpoint: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("encoding", "linear16");
            query.append_pair("sample_rate", &self.config.sample_rate.to_string());
            query.append_pair("channels", &self.config.channels.to_string());
            query.append_pair("language", language::to_bcp47(&self.config.language));
            query.append_pair("interim_results", "true");
            query.append_pair("punctuate", "true");
        }
        Ok(url.to_string())
    }

    /// Map one JSON text frame to the canonical result shape.
    fn handle_text_frame(
        &self,
        text: &str,
    ) -> Result<Option<TranscriptionResult>, TranscribeError> {
        let response: DeepgramResponse = serde_json::from_str(text)
            .map_err(|e| TranscribeError::Format(format!("unparseable result message: {e}")))?;

        match response.response_type.as_str() {
            "Results" => Ok(response.to_result(language::to_bcp47(&self.config.language))),
            "Metadata" => {
                debug!("received stream metadata");
                Ok(None)
            }
            "Error" => {
                let detail = serde_json::from_str::<DeepgramErrorMessage>(text)
                    .ok()
                    .and_then(|e| e.description.or(e.message))
                    .unwrap_or_else(|| "unspecified provider error".to_string());
                Err(TranscribeError::Read(format!("provider error: {detail}")))
            }
            other => {
                warn!("unknown message type from Deepgram: {}", other);
                Ok(None)
            }
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for DeepgramAdapter {
    async fn connect(&self) -> Result<(), TranscribeError> {
        let url = self.build_listen_url()?;
        let mut request = url
            .into_client_request()
            .map_err(|e| TranscribeError::Connect(format!("invalid request URL: {e}")))?;
        let auth = format!("Token {}", self.config.api_key)
            .parse()
            .map_err(|_| {
                TranscribeError::AuthConfig("API key is not a valid header value".to_string())
            })?;
        request.headers_mut().insert("Authorization", auth);

        debug!("connecting to Deepgram listen endpoint");
        let connector = crate::providers::rustls_connector();
        let connect = connect_async_tls_with_config(request, None, false, Some(connector));
        let (ws, _response) = timeout(CONNECT_TIMEOUT, connect)
            .await
            .map_err(|_| TranscribeError::Connect("websocket handshake timed out".to_string()))?
            .map_err(|e| TranscribeError::Connect(format!("websocket handshake failed: {e}")))?;
        info!("connected to Deepgram listen socket");

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

        let pcm = Bytes::from(f32_to_s16le(&chunk.samples));
        sink.send(Message::Binary(pcm))
            .await
            .map_err(|e| TranscribeError::Send(format!("audio write failed: {e}")))
    }

    async fn read_result(&self) -> Result<Option<TranscriptionResult>, TranscribeError> {
        let mut stream = self.stream.lock().await;
        let stream = stream
            .as_mut()
            .ok_or_else(|| TranscribeError::Read("not connected".to_string()))?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => self.handle_text_frame(&text),
            Some(Ok(Message::Binary(data))) => {
                warn!("unexpected {}-byte binary frame from Deepgram", data.len());
                Ok(None)
            }
            Some(Ok(Message::Close(frame))) => {
                info!("websocket closed by provider: {:?}", frame);
                Ok(None)
            }
            Some(Ok(_)) => Ok(None),
            Some(Err(e)) => Err(TranscribeError::Read(format!("websocket read failed: {e}"))),
            None => Err(TranscribeError::Read("websocket stream ended".to_string())),
        }
    }

    async fn close(&self) -> Result<(), TranscribeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(mut sink) = self.sink.lock().await.take() {
            // Ask the provider to flush pending finals before the socket
            // goes away.
            let close_stream = Message::Text(r#"{"type":"CloseStream"}"#.into());
            if let Err(e) = sink.send(close_stream).await {
                debug!("CloseStream write failed (already closed?): {}", e);
            }
            if let Err(e) = sink.send(Message::Close(None)).await {
                debug!("close frame write failed: {}", e);
            }
        }
        self.stream.lock().await.take();
        info!("Deepgram connection closed");
        Ok(())
    }

    fn provider_info(&self) -> &'static str {
        "Deepgram live transcription (JSON WebSocket)"
    }
}
