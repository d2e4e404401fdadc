//! relay: request/response controller for relay devices.
//!
//! A [`RelayDevice`] correlates commands sent to a device with the replies
//! that come back over a duplex message channel. The [`transport`] module
//! moves frames between that channel pair and a real connection.

mod version;

pub mod bridge;
pub mod capability;
pub mod config;
pub mod error;
pub mod pending;
pub mod session;
pub mod transport;

pub use bridge::protocol::{
    Command, DeviceInfoQuery, LedArgs, LedColors, LedEffect, Request, RequestId, Response,
};
pub use config::SessionConfig;
pub use error::RelayError;
pub use session::RelayDevice;
pub use transport::{
    BoxError, RelayApp, ServerConfig, TransportError, Workflow, framed, pump, serve,
};
pub use version::{RELAY_VERSION, VersionInfo};
