//! Frame codec for device communication.
//!
//! A frame is one JSON object. Message-oriented transports (WebSocket) carry
//! frames as-is; byte streams (TCP, Unix sockets, in-memory pipes) wrap them in
//! a 4-byte length prefix via [`frame_codec`].

use tokio_util::bytes::Bytes;
use tokio_util::codec::LengthDelimitedCodec;

use super::protocol::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Serialize a request into one frame payload.
pub fn encode(request: &Request) -> Result<Bytes, CodecError> {
    let json = serde_json::to_vec(request).map_err(CodecError::Encode)?;
    tracing::trace!(
        request_id = %request.id,
        request_type = request.command.type_tag(),
        json_size_bytes = json.len(),
        "Encoding frame"
    );
    Ok(Bytes::from(json))
}

/// Parse one frame payload into a response.
///
/// Fails on non-JSON input and on objects without `_id`.
pub fn decode(frame: &[u8]) -> Result<Response, CodecError> {
    serde_json::from_slice(frame).map_err(CodecError::Decode)
}

/// Length-delimited framing used on byte-stream transports.
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .new_codec()
}
