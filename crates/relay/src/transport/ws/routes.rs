//! WebSocket route handlers.
//!
//! Each upgraded connection becomes one relay session: the socket is pumped
//! into a channel pair, a [`RelayDevice`] is connected over that pair, and the
//! configured [`Workflow`] drives it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::session::RelayDevice;
use crate::transport::pump::pump;
use crate::version::VersionInfo;

/// Application logic run against each connected device.
#[async_trait::async_trait]
pub trait Workflow: Send + Sync + 'static {
    async fn run(&self, device: RelayDevice);
}

/// Shared state for all connections.
pub struct RelayApp {
    workflow: Arc<dyn Workflow>,
    session: SessionConfig,
    channel_capacity: usize,
    active_sessions: AtomicUsize,
    version: VersionInfo,
}

impl RelayApp {
    pub fn new(workflow: Arc<dyn Workflow>) -> Self {
        Self {
            workflow,
            session: SessionConfig::default(),
            channel_capacity: 5,
            active_sessions: AtomicUsize::new(0),
            version: VersionInfo::new(),
        }
    }

    pub fn with_session_config(mut self, config: SessionConfig) -> Self {
        self.session = config;
        self
    }

    /// Buffer size of each direction of the per-connection channel pair.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn with_version(mut self, version: VersionInfo) -> Self {
        self.version = version;
        self
    }

    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthCheckResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub version: VersionInfo,
}

async fn health_check(State(app): State<Arc<RelayApp>>) -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "READY",
        active_sessions: app.active_sessions(),
        version: app.version.clone(),
    })
}

async fn upgrade(State(app): State<Arc<RelayApp>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app))
}

/// Run one relay session over an upgraded socket until it ends.
pub async fn handle_socket(socket: WebSocket, app: Arc<RelayApp>) {
    let (out_tx, out_rx) = mpsc::channel(app.channel_capacity);
    let (in_tx, in_rx) = mpsc::channel(app.channel_capacity);
    let stop = CancellationToken::new();

    app.active_sessions.fetch_add(1, Ordering::SeqCst);
    let session = tokio::spawn(run_session(Arc::clone(&app), out_tx, in_rx, stop.clone()));

    let (sink, stream) = socket.split();
    if let Err(e) = pump(ws_reader(stream), ws_writer(sink), in_tx, out_rx, stop.clone()).await {
        tracing::warn!(error = %e, "WebSocket connection failed");
    }

    // Transport is gone; release anything still waiting on this session.
    stop.cancel();
    if let Err(e) = session.await {
        tracing::error!(error = %e, "Session task panicked");
    }
    app.active_sessions.fetch_sub(1, Ordering::SeqCst);
    tracing::debug!("WebSocket connection closed");
}

async fn run_session(
    app: Arc<RelayApp>,
    outbound: mpsc::Sender<Bytes>,
    inbound: mpsc::Receiver<Bytes>,
    stop: CancellationToken,
) {
    let device = match RelayDevice::connect_with_config(
        outbound,
        inbound,
        stop.clone(),
        app.session.clone(),
    )
    .await
    {
        Ok(device) => device,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize relay");
            stop.cancel();
            return;
        }
    };

    app.workflow.run(device.clone()).await;

    // Workflows normally terminate themselves; this closes the connection if not.
    device.terminate().await;
}

/// Adapt a WebSocket message stream into a frame stream.
///
/// Text and binary frames carry payloads; ping/pong are skipped; a close
/// frame ends the stream.
pub fn ws_reader<S, E>(stream: S) -> impl Stream<Item = Result<Bytes, E>>
where
    S: Stream<Item = Result<Message, E>>,
{
    stream
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => {
                    Some(Ok(Bytes::copy_from_slice(text.as_str().as_bytes())))
                }
                Ok(Message::Binary(data)) => Some(Ok(data)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        })
}

/// Adapt a WebSocket message sink into a frame sink. Frames go out as text.
pub fn ws_writer<S, E>(sink: S) -> impl Sink<Bytes, Error = E>
where
    S: Sink<Message, Error = E>,
{
    sink.with(|frame: Bytes| future::ready(Ok::<_, E>(into_message(frame))))
}

fn into_message(frame: Bytes) -> Message {
    match String::from_utf8(frame.to_vec()) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(Bytes::from(e.into_bytes())),
    }
}

pub fn routes(app: Arc<RelayApp>, path: &str) -> Router {
    Router::new()
        .route(path, get(upgrade))
        .route("/health-check", get(health_check))
        .with_state(app)
}
