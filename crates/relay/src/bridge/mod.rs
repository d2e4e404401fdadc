//! Wire layer for controller-device communication.
//!
//! # Architecture
//!
//! - **protocol**: Message types (Request/Command, Response, RequestId)
//! - **codec**: JSON frame encoding plus length-delimited framing for byte streams

pub mod codec;
pub mod protocol;
