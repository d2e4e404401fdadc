//! Pending-request table - maps in-flight request ids to their reply slots.
//!
//! Each entry is a oneshot sender. Delivery removes the entry before sending,
//! so a reply is observed at most once: a duplicate or late reply finds no
//! entry and is dropped. The waiting side holds a [`PendingReply`] guard that
//! removes its own entry on drop (timeout, stop, or caller cancellation).

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::bridge::protocol::{RequestId, Response};

/// Concurrent table of requests awaiting a reply.
#[derive(Default)]
pub struct PendingRequests {
    waiters: DashMap<RequestId, oneshot::Sender<Response>>,
}

impl PendingRequests {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a reply slot for `id`. Must happen before the request is sent.
    pub fn register(self: &Arc<Self>, id: RequestId) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        if self.waiters.insert(id.clone(), tx).is_some() {
            tracing::warn!(request_id = %id, "Request id collision, replacing pending entry");
        }
        PendingReply {
            id,
            rx,
            table: Arc::clone(self),
        }
    }

    /// Route a response to its waiter.
    ///
    /// Returns false if no entry exists (unknown, already answered, or timed out).
    /// Never blocks.
    pub fn deliver(&self, response: Response) -> bool {
        let Some((id, tx)) = self.waiters.remove(&response.id) else {
            return false;
        };
        if tx.send(response).is_err() {
            tracing::trace!(request_id = %id, "Waiter dropped before reply delivery");
        }
        true
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.waiters.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Waiting side of one pending request.
///
/// On drop: removes the table entry if it is still this request's entry.
pub struct PendingReply {
    id: RequestId,
    rx: oneshot::Receiver<Response>,
    table: Arc<PendingRequests>,
}

impl PendingReply {
    /// Wait for the reply. `None` if the slot was discarded without a reply.
    pub async fn recv(&mut self) -> Option<Response> {
        (&mut self.rx).await.ok()
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        // Closing first lets us recognise our own sender: a colliding newer
        // entry under the same id still has an open receiver.
        self.rx.close();
        self.table
            .waiters
            .remove_if(&self.id, |_, tx| tx.is_closed());
    }
}
