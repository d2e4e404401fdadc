//! Relay session - correlates requests with replies over an unordered channel pair.
//!
//! Flow:
//! 1. Spawn the dispatch task on the inbound channel
//! 2. Send the identity handshake, wait for the device id
//! 3. Each request: register reply slot, enqueue payload, race reply/timeout/stop
//! 4. Terminate: best-effort terminate request, mark terminated, fire stop
//!
//! The dispatch task is the only consumer of the inbound channel. It routes
//! every decodable frame by `_id` and drops everything else.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::bridge::codec;
use crate::bridge::protocol::{Command, DeviceInfoQuery, Request, RequestId, Response};
use crate::config::SessionConfig;
use crate::error::RelayError;
use crate::pending::PendingRequests;

/// Handle to one relay session.
///
/// Cheap to clone; all clones drive the same session and share its pending
/// table, so requests may be issued concurrently from any of them.
#[derive(Clone)]
pub struct RelayDevice {
    engine: Arc<Engine>,
    id: Arc<str>,
}

struct Engine {
    outbound: mpsc::Sender<Bytes>,
    pending: Arc<PendingRequests>,
    /// Session-wide stop signal, shared with the transport bridge.
    stop: CancellationToken,
    terminated: AtomicBool,
    /// Claimed by the first `terminate` caller.
    teardown_started: AtomicBool,
    /// Fired once teardown has finished.
    torn_down: CancellationToken,
    config: SessionConfig,
}

impl RelayDevice {
    /// Start a session with the default configuration.
    ///
    /// Fails with [`RelayError::Init`] if the identity handshake does not complete.
    pub async fn connect(
        outbound: mpsc::Sender<Bytes>,
        inbound: mpsc::Receiver<Bytes>,
        stop: CancellationToken,
    ) -> Result<Self, RelayError> {
        Self::connect_with_config(outbound, inbound, stop, SessionConfig::default()).await
    }

    pub async fn connect_with_config(
        outbound: mpsc::Sender<Bytes>,
        inbound: mpsc::Receiver<Bytes>,
        stop: CancellationToken,
        config: SessionConfig,
    ) -> Result<Self, RelayError> {
        let pending = PendingRequests::new();

        // Child token: a failed handshake stops dispatch without cancelling
        // the caller's signal. Cancelling `stop` still cancels the child.
        let dispatch_stop = stop.child_token();
        tokio::spawn(run_dispatch(
            inbound,
            Arc::clone(&pending),
            dispatch_stop.clone(),
        ));

        let engine = Arc::new(Engine {
            outbound,
            pending,
            stop,
            terminated: AtomicBool::new(false),
            teardown_started: AtomicBool::new(false),
            torn_down: CancellationToken::new(),
            config,
        });

        tracing::debug!("Requesting device id");
        let id = match engine.request(Command::device_info(DeviceInfoQuery::Id)).await {
            Ok(response) => response.device_id.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Identity handshake failed");
                dispatch_stop.cancel();
                return Err(RelayError::Init(Box::new(e)));
            }
        };

        tracing::info!(device_id = %id, "Relay device connected");

        Ok(Self {
            engine,
            id: Arc::from(id),
        })
    }

    /// Device identifier obtained during the handshake.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.engine.config
    }

    pub fn is_terminated(&self) -> bool {
        self.engine.terminated.load(Ordering::SeqCst)
    }

    /// Number of requests currently waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.engine.pending.len()
    }

    /// Send a command and wait for the matching reply.
    pub(crate) async fn request(&self, command: Command) -> Result<Response, RelayError> {
        self.engine.request(command).await
    }

    /// End the session.
    ///
    /// Teardown runs once no matter how many callers race here; every caller
    /// returns after it has completed. The teardown runs in its own task, so a
    /// caller that gives up early does not abort it. The terminate request is
    /// best-effort.
    pub async fn terminate(&self) {
        let engine = &self.engine;
        if engine
            .teardown_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tokio::spawn(run_teardown(Arc::clone(engine), Arc::clone(&self.id)));
        }
        engine.torn_down.cancelled().await;
    }
}

async fn run_teardown(engine: Arc<Engine>, device_id: Arc<str>) {
    tracing::debug!(%device_id, "Terminating relay device");
    if let Err(e) = engine.request(Command::Terminate).await {
        tracing::warn!(%device_id, error = %e, "Terminate request failed");
    }
    engine.terminated.store(true, Ordering::SeqCst);
    engine.stop.cancel();
    engine.torn_down.cancel();
    tracing::info!(%device_id, "Relay device terminated");
}

impl Engine {
    async fn request(&self, command: Command) -> Result<Response, RelayError> {
        if self.terminated.load(Ordering::SeqCst) {
            return Err(RelayError::SessionTerminated);
        }

        let request_id = RequestId::new();
        let request_type = command.type_tag();
        let payload = codec::encode(&Request::new(request_id.clone(), command))?;

        // Registered before the payload leaves so a fast reply cannot miss it.
        // Dropping the guard on any exit path removes the entry.
        let mut reply = self.pending.register(request_id.clone());

        let exchange = async {
            self.outbound
                .send(payload)
                .await
                .map_err(|_| RelayError::TransportClosed)?;
            tracing::trace!(%request_id, request_type, "Request sent");

            // A discarded slot only happens if the entry vanished underneath
            // us; from the caller's side that is indistinguishable from silence.
            reply.recv().await.ok_or(RelayError::RequestTimeout)
        };

        let response = tokio::select! {
            result = tokio::time::timeout(self.config.response_timeout, exchange) => match result {
                Ok(result) => result?,
                Err(_) => {
                    tracing::debug!(%request_id, request_type, "Request timed out");
                    return Err(RelayError::RequestTimeout);
                }
            },
            _ = self.stop.cancelled() => {
                tracing::debug!(
                    %request_id,
                    request_type,
                    "Session stopped while waiting for reply"
                );
                return Err(RelayError::RequestTimeout);
            }
        };

        if let Some(error) = response.remote_error() {
            tracing::debug!(%request_id, request_type, %error, "Device returned error");
            return Err(RelayError::Remote(error.to_string()));
        }

        Ok(response)
    }
}

/// Inbound loop: decode, look up by id, deliver. Runs until stop or peer disconnect.
async fn run_dispatch(
    mut inbound: mpsc::Receiver<Bytes>,
    pending: Arc<PendingRequests>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => {
                tracing::debug!("Stop signal received");
                break;
            }

            msg = inbound.recv() => {
                let Some(frame) = msg else {
                    tracing::debug!("Inbound channel closed (peer disconnected?)");
                    break;
                };

                let response = match codec::decode(&frame) {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::debug!(
                            error = %e,
                            frame_size_bytes = frame.len(),
                            "Dropping malformed frame"
                        );
                        continue;
                    }
                };

                let request_id = response.id.clone();
                if pending.deliver(response) {
                    tracing::trace!(%request_id, "Reply delivered");
                } else {
                    tracing::debug!(%request_id, "Dropping reply with no pending request");
                }
            }
        }
    }

    tracing::debug!("Dispatch loop exiting");
}
