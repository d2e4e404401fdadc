//! Transport layer for relay sessions.
//!
//! [`pump`] connects any frame stream/sink to a session's channel pair.
//! [`ws`] serves sessions over WebSocket; [`framed`] adapts raw byte streams
//! with length-delimited framing.

pub mod pump;
pub mod ws;

pub use pump::{BoxError, TransportError, framed, pump};
pub use ws::{RelayApp, ServerConfig, Workflow, serve};
