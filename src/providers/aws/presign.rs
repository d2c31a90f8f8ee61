//! SigV4 presigned URL generation for the Transcribe streaming WebSocket
//! handshake.
//!
//! WebSocket upgrades cannot carry custom auth headers, so the signature
//! travels in the query string. The output must match the service-side
//! verifier byte for byte: canonical request, string-to-sign, derived
//! signing key, HMAC chain, lowercase hex signature.
//!
//! The builder is pure; the clock is injected so tests can pin a fixed
//! timestamp.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::{Digest, Sha256};

use crate::error::TranscribeError;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "transcribe";
const METHOD: &str = "GET";
const CANONICAL_URI: &str = "/stream-transcription-websocket";
const SIGNED_HEADERS: &str = "host";
const EXPIRES_SECONDS: &str = "300";

/// RFC 3986 unreserved characters stay literal; everything else is
/// percent-encoded. Space must become `%20`, never `+`.
const QUERY_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn url_encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_ENCODE).to_string()
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Builder for Transcribe streaming presigned URLs.
#[derive(Debug, Clone)]
pub struct PresignedUrlBuilder {
    access_key: String,
    secret_key: String,
    region: String,
}

impl PresignedUrlBuilder {
    /// Create a builder, failing before any network use if a credential
    /// is missing.
    pub fn new(access_key: &str, secret_key: &str, region: &str) -> Result<Self, TranscribeError> {
        if access_key.is_empty() || secret_key.is_empty() {
            return Err(TranscribeError::AuthConfig(
                "presigned URL requires an access key and a secret key".to_string(),
            ));
        }
        if region.is_empty() {
            return Err(TranscribeError::AuthConfig(
                "presigned URL requires a region".to_string(),
            ));
        }
        Ok(Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
            region: region.to_string(),
        })
    }

    fn host(&self) -> String {
        format!("transcribestreaming.{}.amazonaws.com", self.region)
    }

    /// Build the signed `wss://` request URL for the given media
    /// parameters at the injected timestamp.
    pub fn presign(
        &self,
        language_code: &str,
        media_encoding: &str,
        sample_rate: u32,
        now: DateTime<Utc>,
    ) -> String {
        let date = now.format("%Y%m%d").to_string();
        let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let host = self.host();
        let credential_scope = format!("{date}/{}/{SERVICE}/aws4_request", self.region);
        let credential = format!("{}/{credential_scope}", self.access_key);
        let sample_rate = sample_rate.to_string();

        // BTreeMap keeps the canonical query sorted lexicographically by key.
        let params = BTreeMap::from([
            ("X-Amz-Algorithm", ALGORITHM),
            ("X-Amz-Credential", credential.as_str()),
            ("X-Amz-Date", timestamp.as_str()),
            ("X-Amz-Expires", EXPIRES_SECONDS),
            ("X-Amz-SignedHeaders", SIGNED_HEADERS),
            ("language-code", language_code),
            ("media-encoding", media_encoding),
            ("sample-rate", sample_rate.as_str()),
        ]);
        let mut canonical_query = params
            .iter()
            .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let canonical_headers = format!("host:{host}\n");
        let payload_hash = sha256_hex(b"");
        let canonical_request = format!(
            "{METHOD}\n{CANONICAL_URI}\n{canonical_query}\n{canonical_headers}\n{SIGNED_HEADERS}\n{payload_hash}"
        );

        let string_to_sign = format!(
            "{ALGORITHM}\n{timestamp}\n{credential_scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let date_key = hmac_sha256(format!("AWS4{}", self.secret_key).as_bytes(), &date);
        let region_key = hmac_sha256(&date_key, &self.region);
        let service_key = hmac_sha256(&region_key, SERVICE);
        let signing_key = hmac_sha256(&service_key, "aws4_request");
        let signature = hex(&hmac_sha256(&signing_key, &string_to_sign));

        canonical_query.push_str("&X-Amz-Signature=");
        canonical_query.push_str(&signature);

        format!("wss://{host}:8443{CANONICAL_URI}?{canonical_query}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap()
    }

    fn builder() -> PresignedUrlBuilder {
        PresignedUrlBuilder::new("AKIDEXAMPLE", "wJalrXUtnFEMI", "us-east-1").unwrap()
    }

    #[test]
    fn test_missing_credentials_rejected() {
        assert!(matches!(
            PresignedUrlBuilder::new("", "secret", "us-east-1"),
            Err(TranscribeError::AuthConfig(_))
        ));
        assert!(matches!(
            PresignedUrlBuilder::new("key", "", "us-east-1"),
            Err(TranscribeError::AuthConfig(_))
        ));
        assert!(matches!(
            PresignedUrlBuilder::new("key", "secret", ""),
            Err(TranscribeError::AuthConfig(_))
        ));
    }

    #[test]
    fn test_presign_is_deterministic() {
        let a = builder().presign("en-US", "pcm", 16000, fixed_now());
        let b = builder().presign("en-US", "pcm", 16000, fixed_now());
        assert_eq!(a, b);
    }

    #[test]
    fn test_presigned_url_shape() {
        let url = builder().presign("en-US", "pcm", 16000, fixed_now());
        assert!(url.starts_with(
            "wss://transcribestreaming.us-east-1.amazonaws.com:8443/stream-transcription-websocket?"
        ));
        assert!(url.contains("X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Date=20240115T123045Z"));
        assert!(url.contains("X-Amz-Expires=300"));
        assert!(url.contains("X-Amz-SignedHeaders=host"));
        assert!(url.contains("language-code=en-US"));
        assert!(url.contains("media-encoding=pcm"));
        assert!(url.contains("sample-rate=16000"));
        // Credential scope slashes must be percent-encoded in the query.
        assert!(url.contains(
            "X-Amz-Credential=AKIDEXAMPLE%2F20240115%2Fus-east-1%2Ftranscribe%2Faws4_request"
        ));
    }

    #[test]
    fn test_query_keys_sorted() {
        let url = builder().presign("en-US", "pcm", 16000, fixed_now());
        let query = url.split('?').nth(1).unwrap();
        let keys: Vec<&str> = query
            .split('&')
            .map(|pair| pair.split('=').next().unwrap())
            .collect();
        // All keys except the trailing signature are lexicographically sorted.
        let signed = &keys[..keys.len() - 1];
        let mut sorted = signed.to_vec();
        sorted.sort_unstable();
        assert_eq!(signed, sorted.as_slice());
        assert_eq!(*keys.last().unwrap(), "X-Amz-Signature");
    }

    #[test]
    fn test_signature_matches_reference_hmac_chain() {
        let url = builder().presign("en-US", "pcm", 16000, fixed_now());
        let signature = url.split("X-Amz-Signature=").nth(1).unwrap();

        // Independently rebuild the signature from the documented chain.
        let date = "20240115";
        let timestamp = "20240115T123045Z";
        let scope = "20240115/us-east-1/transcribe/aws4_request";
        let canonical_query = format!(
            "X-Amz-Algorithm=AWS4-HMAC-SHA256\
             &X-Amz-Credential=AKIDEXAMPLE%2F20240115%2Fus-east-1%2Ftranscribe%2Faws4_request\
             &X-Amz-Date={timestamp}&X-Amz-Expires=300&X-Amz-SignedHeaders=host\
             &language-code=en-US&media-encoding=pcm&sample-rate=16000"
        );
        let canonical_request = format!(
            "GET\n/stream-transcription-websocket\n{canonical_query}\n\
             host:transcribestreaming.us-east-1.amazonaws.com\n\nhost\n{}",
            sha256_hex(b"")
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{timestamp}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );
        let k_date = hmac_sha256(b"AWS4wJalrXUtnFEMI", date);
        let k_region = hmac_sha256(&k_date, "us-east-1");
        let k_service = hmac_sha256(&k_region, "transcribe");
        let k_signing = hmac_sha256(&k_service, "aws4_request");
        let expected = hex(&hmac_sha256(&k_signing, &string_to_sign));

        assert_eq!(signature, expected);
    }
}
