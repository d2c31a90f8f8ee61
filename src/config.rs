//! Session configuration: provider selection, credentials, audio format.

use std::env;

use serde::{Deserialize, Serialize};

use crate::error::TranscribeError;

/// Target sample rate every provider in this crate streams at.
pub const TRANSCRIPTION_SAMPLE_RATE: u32 = 16000;

/// Immutable per-session configuration.
///
/// Created once from host-supplied credentials when the session starts
/// and read-only for the session's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Provider selection string (e.g. "aws", "deepgram", "clova").
    pub provider: String,
    /// API key (access key id for AWS).
    pub api_key: String,
    /// Secret key; required by providers that sign requests (AWS).
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Provider region (used by AWS endpoint construction).
    pub region: String,
    /// Short language code for transcription (e.g. "en", "ko").
    pub language: String,
    /// Sample rate of the audio sent to the provider, in Hz.
    pub sample_rate: u32,
    /// Number of audio channels sent to the provider.
    pub channels: u16,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            api_key: String::new(),
            secret_key: None,
            region: "us-east-1".to_string(),
            language: "en".to_string(),
            sample_rate: TRANSCRIPTION_SAMPLE_RATE,
            channels: 1,
        }
    }
}

impl TranscriptionConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads `STT_PROVIDER`, `STT_API_KEY`, `STT_SECRET_KEY`, `STT_REGION`
    /// and `STT_LANGUAGE`, falling back to defaults where a variable is
    /// unset. The result is validated before being returned.
    pub fn from_env() -> Result<Self, TranscribeError> {
        let config = Self {
            provider: env::var("STT_PROVIDER").unwrap_or_default(),
            api_key: env::var("STT_API_KEY").unwrap_or_default(),
            secret_key: env::var("STT_SECRET_KEY").ok(),
            region: env::var("STT_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            language: env::var("STT_LANGUAGE").unwrap_or_else(|_| "en".to_string()),
            sample_rate: TRANSCRIPTION_SAMPLE_RATE,
            channels: 1,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate per-provider credential requirements.
    ///
    /// Credential problems surface here, before any network attempt.
    pub fn validate(&self) -> Result<(), TranscribeError> {
        if self.provider.is_empty() {
            return Err(TranscribeError::Config(
                "provider selection is required".to_string(),
            ));
        }
        if self.api_key.is_empty() {
            return Err(TranscribeError::AuthConfig(format!(
                "API key is required for provider '{}'",
                self.provider
            )));
        }
        if self.provider == "aws" && self.secret_key.as_deref().unwrap_or("").is_empty() {
            return Err(TranscribeError::AuthConfig(
                "AWS provider requires both an access key and a secret key".to_string(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(TranscribeError::Config("sample rate must be non-zero".to_string()));
        }
        if self.channels == 0 {
            return Err(TranscribeError::Config("channel count must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config(provider: &str) -> TranscriptionConfig {
        TranscriptionConfig {
            provider: provider.to_string(),
            api_key: "test-key".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_audio_format() {
        let config = TranscriptionConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.language, "en");
    }

    #[test]
    fn test_validate_requires_provider() {
        let config = TranscriptionConfig::default();
        assert!(matches!(config.validate(), Err(TranscribeError::Config(_))));
    }

    #[test]
    fn test_validate_requires_api_key() {
        let mut config = base_config("deepgram");
        config.api_key = String::new();
        assert!(matches!(
            config.validate(),
            Err(TranscribeError::AuthConfig(_))
        ));
    }

    #[test]
    fn test_aws_requires_secret_key() {
        let config = base_config("aws");
        assert!(matches!(
            config.validate(),
            Err(TranscribeError::AuthConfig(_))
        ));

        let mut config = base_config("aws");
        config.secret_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deepgram_needs_no_secret() {
        let config = base_config("deepgram");
        assert!(config.validate().is_ok());
    }
}
