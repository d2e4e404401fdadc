//! Error types surfaced to callers of a relay session.

use crate::bridge::codec::CodecError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Identity handshake did not complete; the session was never usable.
    #[error("failed to initialize relay device: {0}")]
    Init(#[source] Box<RelayError>),

    /// No reply within the response timeout, or the session stopped while waiting.
    #[error("request timed out")]
    RequestTimeout,

    /// Device answered with a non-empty `error` field.
    #[error("device error: {0}")]
    Remote(String),

    #[error("writing to a terminated relay device")]
    SessionTerminated,

    /// Outbound channel closed; the transport bridge is gone.
    #[error("transport closed")]
    TransportClosed,

    #[error(transparent)]
    Encode(#[from] CodecError),
}

impl RelayError {
    /// Timeouts may be retried with a fresh request; nothing else is worth retrying.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout)
    }
}
