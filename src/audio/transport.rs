use base64::Engine;
use thiserror::Error;

/// Reply audio as it appears on the wire.
///
/// The backend ships synthesized audio either as a hex-digit-pair string
/// (HTTP responses) or as a base64 data URL (stream events). Consumers detect
/// the encoding rather than trusting the transport they arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio(String);

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("data URL is missing a base64 payload")]
    MalformedDataUrl,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("payload is neither a hex string nor a data URL")]
    UnknownEncoding,
}

impl EncodedAudio {
    /// Wrap a wire string without validating it; errors surface on decode
    pub fn from_wire(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Encode bytes as a hex-pair string (HTTP response form)
    pub fn from_bytes_hex(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Encode bytes as a base64 data URL (stream event form)
    pub fn from_bytes_data_url(mime: &str, bytes: &[u8]) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self(format!("data:{};base64,{}", mime, b64))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Detect the transport encoding and decode to raw bytes
    pub fn decode(&self) -> Result<Vec<u8>, TransportError> {
        let payload = self.0.trim();

        if let Some(rest) = payload.strip_prefix("data:") {
            let b64 = rest
                .split_once(',')
                .map(|(_, data)| data)
                .ok_or(TransportError::MalformedDataUrl)?;
            return Ok(base64::engine::general_purpose::STANDARD.decode(b64)?);
        }

        if !payload.is_empty()
            && payload.len() % 2 == 0
            && payload.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Ok(hex::decode(payload)?);
        }

        Err(TransportError::UnknownEncoding)
    }
}

impl From<String> for EncodedAudio {
    fn from(payload: String) -> Self {
        Self::from_wire(payload)
    }
}
