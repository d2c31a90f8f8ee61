//! Binary event-stream framing used by the AWS Transcribe WebSocket
//! protocol.
//!
//! Wire layout, all integers big-endian:
//!
//! ```text
//! [total_len:u32][headers_len:u32][prelude_crc32:u32]
//! [headers: headers_len bytes][payload][message_crc32:u32]
//! ```
//!
//! Each header is `[name_len:u8][name][type:u8 = 7][value_len:u16][value]`;
//! only string-typed (7) headers appear in this protocol. The prelude CRC
//! covers the first 8 bytes, the message CRC covers everything except the
//! trailing 4. A CRC mismatch is a hard decode failure: it means wire
//! corruption and is never tolerated.

use serde_json::Value;

use crate::error::TranscribeError;

/// Prelude (8) + prelude CRC (4) + message CRC (4).
const FRAME_OVERHEAD: usize = 16;

/// String header value type tag.
const HEADER_TYPE_STRING: u8 = 7;

/// A decoded event-stream message. Produced only by [`decode`]; never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EventStreamMessage {
    /// Headers in wire order.
    pub headers: Vec<(String, String)>,
    /// The UTF-8 JSON payload. Schema validation is the caller's job.
    pub payload: Value,
}

impl EventStreamMessage {
    /// Look up a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn encode_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.push(name.len() as u8);
    out.extend_from_slice(name.as_bytes());
    out.push(HEADER_TYPE_STRING);
    out.extend_from_slice(&(value.len() as u16).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

/// Encode a payload with an explicit header list.
pub fn encode(payload: &[u8], headers: &[(&str, &str)]) -> Vec<u8> {
    let mut header_block = Vec::new();
    for (name, value) in headers {
        encode_header(&mut header_block, name, value);
    }

    let total_len = (header_block.len() + payload.len() + FRAME_OVERHEAD) as u32;
    let headers_len = header_block.len() as u32;

    let mut message = Vec::with_capacity(total_len as usize);
    message.extend_from_slice(&total_len.to_be_bytes());
    message.extend_from_slice(&headers_len.to_be_bytes());
    let prelude_crc = crc32(&message[..8]);
    message.extend_from_slice(&prelude_crc.to_be_bytes());
    message.extend_from_slice(&header_block);
    message.extend_from_slice(payload);
    let message_crc = crc32(&message);
    message.extend_from_slice(&message_crc.to_be_bytes());
    message
}

/// Wrap one PCM payload as an `AudioEvent` frame.
///
/// Always emits exactly the three headers the Transcribe streaming
/// endpoint expects on an audio frame.
pub fn encode_audio_event(payload: &[u8]) -> Vec<u8> {
    encode(
        payload,
        &[
            (":content-type", "application/octet-stream"),
            (":event-type", "AudioEvent"),
            (":message-type", "event"),
        ],
    )
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Decode one event-stream message.
///
/// Fails with [`TranscribeError::Format`] on truncation, CRC mismatch, a
/// malformed header block, or a payload that is not valid JSON.
pub fn decode(message: &[u8]) -> Result<EventStreamMessage, TranscribeError> {
    if message.len() < FRAME_OVERHEAD {
        return Err(TranscribeError::Format(format!(
            "message too short: {} bytes",
            message.len()
        )));
    }

    let total_len = read_u32(message, 0) as usize;
    let headers_len = read_u32(message, 4) as usize;
    let prelude_crc = read_u32(message, 8);

    if crc32(&message[..8]) != prelude_crc {
        return Err(TranscribeError::Format("prelude CRC check failed".to_string()));
    }
    let message_crc = read_u32(message, message.len() - 4);
    if crc32(&message[..message.len() - 4]) != message_crc {
        return Err(TranscribeError::Format("message CRC check failed".to_string()));
    }

    if total_len != message.len() || headers_len > message.len() - FRAME_OVERHEAD {
        return Err(TranscribeError::Format(format!(
            "inconsistent lengths: total {total_len}, headers {headers_len}, actual {}",
            message.len()
        )));
    }

    let header_block = &message[12..12 + headers_len];
    let payload = &message[12 + headers_len..message.len() - 4];

    let mut headers = Vec::new();
    let mut offset = 0;
    while offset < header_block.len() {
        let name_len = header_block[offset] as usize;
        offset += 1;
        if offset + name_len + 3 > header_block.len() {
            return Err(TranscribeError::Format("truncated header name".to_string()));
        }
        let name = String::from_utf8_lossy(&header_block[offset..offset + name_len]).into_owned();
        offset += name_len;
        let value_type = header_block[offset];
        offset += 1;
        if value_type != HEADER_TYPE_STRING {
            return Err(TranscribeError::Format(format!(
                "unsupported header value type {value_type} for '{name}'"
            )));
        }
        let value_len =
            u16::from_be_bytes([header_block[offset], header_block[offset + 1]]) as usize;
        offset += 2;
        if offset + value_len > header_block.len() {
            return Err(TranscribeError::Format("truncated header value".to_string()));
        }
        let value =
            String::from_utf8_lossy(&header_block[offset..offset + value_len]).into_owned();
        offset += value_len;
        headers.push((name, value));
    }

    let payload = serde_json::from_slice(payload)
        .map_err(|e| TranscribeError::Format(format!("payload is not valid JSON: {e}")))?;

    Ok(EventStreamMessage { headers, payload })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip_audio_event() {
        let payload = br#"{"AudioEvent":{"AudioChunk":""}}"#;
        let encoded = encode_audio_event(payload);
        let decoded = decode(&encoded).unwrap();

        assert_eq!(
            decoded.headers,
            vec![
                (":content-type".to_string(), "application/octet-stream".to_string()),
                (":event-type".to_string(), "AudioEvent".to_string()),
                (":message-type".to_string(), "event".to_string()),
            ]
        );
        assert_eq!(decoded.payload, json!({"AudioEvent": {"AudioChunk": ""}}));
    }

    #[test]
    fn test_round_trip_preserves_header_order() {
        let headers = [("zeta", "1"), ("alpha", "2"), ("mid", "three")];
        let encoded = encode(br#"{"ok":true}"#, &headers);
        let decoded = decode(&encoded).unwrap();
        let names: Vec<&str> = decoded.headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(decoded.header("mid"), Some("three"));
    }

    #[test]
    fn test_too_short_message_rejected() {
        let result = decode(&[0u8; 15]);
        assert!(matches!(result, Err(TranscribeError::Format(_))));
    }

    #[test]
    fn test_single_bit_flip_fails_crc() {
        let encoded = encode_audio_event(br#"{"AudioEvent":{}}"#);
        // Flip one bit at every byte position; each must fail decode.
        for i in 0..encoded.len() {
            let mut corrupted = encoded.clone();
            corrupted[i] ^= 0x01;
            let result = decode(&corrupted);
            assert!(
                matches!(result, Err(TranscribeError::Format(_))),
                "bit flip at byte {i} was not detected"
            );
        }
    }

    #[test]
    fn test_non_json_payload_rejected() {
        let encoded = encode(b"not json", &[(":message-type", "event")]);
        let result = decode(&encoded);
        assert!(matches!(result, Err(TranscribeError::Format(_))));
    }

    #[test]
    fn test_prelude_crc_checked_before_lengths() {
        let encoded = encode_audio_event(br#"{}"#);
        let mut corrupted = encoded.clone();
        // Corrupt the declared total length; the prelude CRC must catch it.
        corrupted[0] ^= 0xFF;
        assert!(matches!(
            decode(&corrupted),
            Err(TranscribeError::Format(msg)) if msg.contains("prelude")
        ));
    }
}
