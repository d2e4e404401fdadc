//! WebSocket transport via axum.

mod routes;
mod server;

pub use routes::{
    HealthCheckResponse, RelayApp, Workflow, handle_socket, routes, ws_reader, ws_writer,
};
pub use server::{ServerConfig, serve};
