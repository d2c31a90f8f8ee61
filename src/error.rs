//! Error types shared across the transcription pipeline.

/// Error taxonomy for streaming transcription.
///
/// Every variant is fatal for the session that produced it; transient
/// "no data yet" outcomes are expressed as `Ok(None)` on the read path,
/// never as an error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TranscribeError {
    /// DNS, TLS, or handshake failure while establishing the provider
    /// connection.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Missing or invalid credentials, detected before any network
    /// attempt.
    #[error("auth configuration error: {0}")]
    AuthConfig(String),
    /// Write failure mid-stream.
    #[error("send failed: {0}")]
    Send(String),
    /// Read failure, or a provider-reported exception frame.
    #[error("read failed: {0}")]
    Read(String),
    /// Wire-format violation: bad framing, CRC mismatch, unparseable
    /// payload.
    #[error("wire format error: {0}")]
    Format(String),
    /// Invalid or unsupported configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TranscribeError {
    /// Whether the error was raised before any network traffic.
    pub fn is_pre_network(&self) -> bool {
        matches!(
            self,
            TranscribeError::AuthConfig(_) | TranscribeError::Config(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranscribeError::Connect("tls handshake timed out".to_string());
        assert_eq!(err.to_string(), "connection failed: tls handshake timed out");

        let err = TranscribeError::Format("prelude CRC check failed".to_string());
        assert_eq!(err.to_string(), "wire format error: prelude CRC check failed");
    }

    #[test]
    fn test_pre_network_classification() {
        assert!(TranscribeError::AuthConfig("missing secret key".into()).is_pre_network());
        assert!(TranscribeError::Config("unknown provider".into()).is_pre_network());
        assert!(!TranscribeError::Read("stream closed".into()).is_pre_network());
    }
}
