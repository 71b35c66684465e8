use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::sync::broadcast;

use bubblepop_core::net::messages::ServerMessage;
use bubblepop_core::net::protocol::encode_server_message;

/// Messages produced by world collaborators while the controller handles an
/// event. The round loop flushes them after the controller's own notices so
/// clients see effects in causal order.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    queue: Arc<Mutex<Vec<ServerMessage>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, msg: ServerMessage) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg);
    }

    pub fn drain(&self) -> Vec<ServerMessage> {
        std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Encode `msg` once and hand the bytes to every connected client.
///
/// Having no subscribers is not an error.
pub fn publish(tx: &broadcast::Sender<Bytes>, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(data) => {
            let _ = tx.send(Bytes::from(data));
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode server message"),
    }
}
