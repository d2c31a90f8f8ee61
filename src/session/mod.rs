//! Transcription session: owns one provider adapter and drives it with
//! two concurrent loops.
//!
//! The send loop extracts capped chunks from the ingest pipeline and
//! writes them through the adapter; the result loop blocks on adapter
//! reads and forwards canonical results to the host callback. Adapters
//! whose transport has no independently readable result channel skip the
//! second loop and are polled inline after each send with a short bound.
//!
//! ```text
//! host push ──▶ AudioIngestPipeline ──▶ send loop ──▶ adapter ──▶ network
//! network ──▶ adapter ──▶ result loop ──▶ host callback
//! ```
//!
//! State machine: `Created → Connecting → Streaming → Draining → Closed`,
//! with `Failed` terminal reachable from any state. `Closed`/`Failed` are
//! reached exactly once; afterwards the session is inert.

mod task;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use task::TaskGuard;

use crate::audio::AudioIngestPipeline;
use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;
use crate::providers::{ProviderAdapter, TranscriptionResult, create_adapter};

/// How long the send loop parks waiting for audio before re-checking its
/// predicate.
const AUDIO_WAIT_TIMEOUT: Duration = Duration::from_millis(250);

/// Bound on the inline result poll for adapters without a result task,
/// so sending never starves behind a quiet wire.
const INLINE_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// How long `stop` waits for each loop to observe the signal.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Connecting,
    Streaming,
    Draining,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Connecting => "connecting",
            SessionState::Streaming => "streaming",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Async callback invoked for every canonical result, in wire order.
pub type ResultCallback =
    Arc<dyn Fn(TranscriptionResult) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Async callback invoked once with the error that failed the session.
pub type ErrorCallback =
    Arc<dyn Fn(TranscribeError) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Counters kept while a session runs.
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub chunks_sent: u64,
    pub results_received: u64,
    pub final_results: u64,
}

/// Orchestrates one adapter across the send and result loops.
pub struct TranscriptionSession {
    adapter: Arc<dyn ProviderAdapter>,
    pipeline: Arc<AudioIngestPipeline>,
    state: Arc<RwLock<SessionState>>,
    stats: Arc<Mutex<SessionStats>>,
    shutdown_tx: broadcast::Sender<()>,
    result_callback: ResultCallback,
    error_callback: Option<ErrorCallback>,
    send_task: Option<TaskGuard>,
    read_task: Option<TaskGuard>,
    stopped: AtomicBool,
}

impl TranscriptionSession {
    /// Create a session for the provider selected by `config`.
    pub fn new(
        config: &TranscriptionConfig,
        pipeline: Arc<AudioIngestPipeline>,
        result_callback: ResultCallback,
    ) -> Result<Self, TranscribeError> {
        let adapter = create_adapter(config)?;
        Ok(Self::with_adapter(adapter, pipeline, result_callback))
    }

    /// Create a session around an existing adapter. Used by the factory
    /// and by tests that inject a mock.
    pub fn with_adapter(
        adapter: Arc<dyn ProviderAdapter>,
        pipeline: Arc<AudioIngestPipeline>,
        result_callback: ResultCallback,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            adapter,
            pipeline,
            state: Arc::new(RwLock::new(SessionState::Created)),
            stats: Arc::new(Mutex::new(SessionStats::default())),
            shutdown_tx,
            result_callback,
            error_callback: None,
            send_task: None,
            read_task: None,
            stopped: AtomicBool::new(false),
        }
    }

    /// Register a callback for the error that fails the session.
    pub fn on_error(&mut self, callback: ErrorCallback) {
        self.error_callback = Some(callback);
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.lock().clone()
    }

    /// Connect the adapter and spawn the loops.
    ///
    /// Fails without spawning anything if the connection cannot be
    /// established; the session is then `Failed` and must be discarded.
    pub async fn start(&mut self) -> Result<(), TranscribeError> {
        if self.state() != SessionState::Created {
            return Err(TranscribeError::Config(format!(
                "session cannot start from state '{}'",
                self.state()
            )));
        }

        *self.state.write() = SessionState::Connecting;
        info!("connecting session via {}", self.adapter.provider_info());
        if let Err(e) = self.adapter.connect().await {
            error!("session connect failed: {}", e);
            *self.state.write() = SessionState::Failed;
            self.report_error(e.clone()).await;
            return Err(e);
        }
        *self.state.write() = SessionState::Streaming;

        self.send_task = Some(self.spawn_send_loop());
        if self.adapter.needs_results_task() {
            self.read_task = Some(self.spawn_result_loop());
        }
        Ok(())
    }

    /// Signal the loops, join them, and close the adapter exactly once.
    ///
    /// Safe to call repeatedly and safe to call when `start` failed or
    /// never ran; the adapter's `close` is idempotent on top of the
    /// session's own once-guard.
    pub async fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut state = self.state.write();
            if *state == SessionState::Streaming || *state == SessionState::Connecting {
                *state = SessionState::Draining;
            }
        }

        let _ = self.shutdown_tx.send(());
        self.pipeline.request_stop();

        if let Some(task) = self.send_task.take() {
            task.join(STOP_JOIN_TIMEOUT).await;
        }
        if let Some(task) = self.read_task.take() {
            task.join(STOP_JOIN_TIMEOUT).await;
        }

        if let Err(e) = self.adapter.close().await {
            debug!("adapter close reported: {}", e);
        }

        {
            let mut state = self.state.write();
            if *state != SessionState::Failed {
                *state = SessionState::Closed;
            }
        }
        info!("session stopped in state '{}'", self.state());
    }

    fn spawn_send_loop(&self) -> TaskGuard {
        let adapter = self.adapter.clone();
        let pipeline = self.pipeline.clone();
        let state = self.state.clone();
        let stats = self.stats.clone();
        let result_callback = self.result_callback.clone();
        let error_callback = self.error_callback.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let inline_reads = !self.adapter.needs_results_task();

        TaskGuard::spawn("send-loop", async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = pipeline.wait_for_audio(AUDIO_WAIT_TIMEOUT) => {}
                }
                if pipeline.stop_requested() {
                    break;
                }
                let Some(chunk) = pipeline.extract() else {
                    continue;
                };

                debug!(
                    "sending chunk: {} samples, {}..{} ms",
                    chunk.samples.len(),
                    chunk.start_ts_ms(),
                    chunk.end_ts_ms()
                );
                if let Err(e) = adapter.send_audio(&chunk).await {
                    fail_session(&state, &error_callback, e).await;
                    break;
                }
                stats.lock().chunks_sent += 1;

                if inline_reads {
                    // One bounded poll per chunk keeps results flowing on
                    // transports that interleave them with the audio.
                    match tokio::time::timeout(INLINE_READ_TIMEOUT, adapter.read_result()).await {
                        Err(_) => {}
                        Ok(Ok(None)) => {}
                        Ok(Ok(Some(result))) => {
                            record_result(&stats, &result);
                            result_callback(result).await;
                        }
                        Ok(Err(e)) => {
                            fail_session(&state, &error_callback, e).await;
                            break;
                        }
                    }
                }
            }
            debug!("send loop exited");
        })
    }

    fn spawn_result_loop(&self) -> TaskGuard {
        let adapter = self.adapter.clone();
        let state = self.state.clone();
        let stats = self.stats.clone();
        let result_callback = self.result_callback.clone();
        let error_callback = self.error_callback.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        TaskGuard::spawn("result-loop", async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    read = adapter.read_result() => match read {
                        Ok(Some(result)) => {
                            record_result(&stats, &result);
                            result_callback(result).await;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            fail_session(&state, &error_callback, e).await;
                            break;
                        }
                    }
                }
            }
            debug!("result loop exited");
        })
    }

    async fn report_error(&self, error: TranscribeError) {
        if let Some(callback) = &self.error_callback {
            callback(error).await;
        }
    }
}

impl Drop for TranscriptionSession {
    fn drop(&mut self) {
        // Loops still running are told to stop; their guards abort them
        // if the signal is never observed.
        let _ = self.shutdown_tx.send(());
        self.pipeline.request_stop();
    }
}

fn record_result(stats: &Mutex<SessionStats>, result: &TranscriptionResult) {
    let mut stats = stats.lock();
    stats.results_received += 1;
    if result.is_final() {
        stats.final_results += 1;
    }
}

async fn fail_session(
    state: &RwLock<SessionState>,
    error_callback: &Option<ErrorCallback>,
    error: TranscribeError,
) {
    error!("session failed: {}", error);
    {
        let mut state = state.write();
        if !state.is_terminal() {
            *state = SessionState::Failed;
        }
    }
    if let Some(callback) = error_callback {
        callback(error).await;
    }
}
