//! Provider adapters: one implementation of [`ProviderAdapter`] per
//! transcription backend, selected at session construction time by the
//! configuration's provider string.

pub mod aws;
mod base;
pub mod clova;
pub mod deepgram;

use std::sync::Arc;

pub use aws::AwsTranscribeAdapter;
pub use base::{ProviderAdapter, ResultKind, TranscriptionResult};
pub use clova::ClovaAdapter;
pub use deepgram::DeepgramAdapter;

use crate::config::TranscriptionConfig;
use crate::error::TranscribeError;

/// TLS connector pinned to the bundled webpki root store, shared by the
/// WebSocket adapters. Peer verification fails closed: a certificate
/// that does not chain to the bundle aborts the handshake.
pub(crate) fn rustls_connector() -> tokio_tungstenite::Connector {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    tokio_tungstenite::Connector::Rustls(Arc::new(tls))
}

/// The closed set of supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// AWS Transcribe streaming: binary event-stream over WebSocket,
    /// SigV4 presigned handshake.
    Aws,
    /// Deepgram: JSON messages over WebSocket, token header auth.
    Deepgram,
    /// Clova NEST: bidirectional gRPC stream, bearer token auth.
    Clova,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Aws => write!(f, "aws"),
            ProviderKind::Deepgram => write!(f, "deepgram"),
            ProviderKind::Clova => write!(f, "clova"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = TranscribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" | "aws-transcribe" => Ok(ProviderKind::Aws),
            "deepgram" => Ok(ProviderKind::Deepgram),
            "clova" => Ok(ProviderKind::Clova),
            _ => Err(TranscribeError::Config(format!(
                "unsupported provider: {s}. Supported providers: aws, deepgram, clova"
            ))),
        }
    }
}

/// Create the adapter selected by `config.provider`.
///
/// Credential problems surface here, before any network attempt.
pub fn create_adapter(
    config: &TranscriptionConfig,
) -> Result<Arc<dyn ProviderAdapter>, TranscribeError> {
    config.validate()?;
    let kind: ProviderKind = config.provider.parse()?;
    match kind {
        ProviderKind::Aws => Ok(Arc::new(AwsTranscribeAdapter::new(config.clone())?)),
        ProviderKind::Deepgram => Ok(Arc::new(DeepgramAdapter::new(config.clone())?)),
        ProviderKind::Clova => Ok(Arc::new(ClovaAdapter::new(config.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("aws".parse::<ProviderKind>().unwrap(), ProviderKind::Aws);
        assert_eq!("AWS".parse::<ProviderKind>().unwrap(), ProviderKind::Aws);
        assert_eq!(
            "deepgram".parse::<ProviderKind>().unwrap(),
            ProviderKind::Deepgram
        );
        assert_eq!(
            "clova".parse::<ProviderKind>().unwrap(),
            ProviderKind::Clova
        );
        assert!(matches!(
            "siri".parse::<ProviderKind>(),
            Err(TranscribeError::Config(_))
        ));
    }

    #[test]
    fn test_provider_kind_display_round_trip() {
        for kind in [ProviderKind::Aws, ProviderKind::Deepgram, ProviderKind::Clova] {
            assert_eq!(kind.to_string().parse::<ProviderKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_factory_rejects_missing_credentials() {
        let config = TranscriptionConfig {
            provider: "deepgram".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            create_adapter(&config),
            Err(TranscribeError::AuthConfig(_))
        ));
    }

    #[test]
    fn test_factory_selects_by_string() {
        let config = TranscriptionConfig {
            provider: "deepgram".to_string(),
            api_key: "key".to_string(),
            ..Default::default()
        };
        let adapter = create_adapter(&config).unwrap();
        assert!(adapter.provider_info().contains("Deepgram"));

        let config = TranscriptionConfig {
            provider: "aws".to_string(),
            api_key: "key".to_string(),
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        let adapter = create_adapter(&config).unwrap();
        assert!(adapter.provider_info().contains("AWS"));
        assert!(!adapter.needs_results_task());
    }
}
