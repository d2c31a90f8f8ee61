//! AWS Transcribe streaming provider: SigV4 presigned WebSocket
//! handshake and binary event-stream framing.

mod client;
pub mod eventstream;
pub mod presign;

pub use client::AwsTranscribeAdapter;
pub use eventstream::{EventStreamMessage, decode, encode, encode_audio_event};
pub use presign::PresignedUrlBuilder;
