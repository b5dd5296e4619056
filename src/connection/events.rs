//! Lifecycle telemetry published by [`super::RemoteConnection`].

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a connection released its resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseCause {
    /// Host shutdown, engine unbind request, or a failed initialization.
    Shutdown,
    /// The engine dropped the connection; nothing remote is left to release.
    RemoteLost,
}

/// Lifecycle event with a timestamp relative to connection creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub timestamp_ms: u64,
    pub kind: ConnectionEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectionEventKind {
    BindRequested,
    Connected,
    AudioGranted,
    Released { cause: ReleaseCause, failures: usize },
    Finished,
}

pub(super) struct EventPublisher {
    tx: broadcast::Sender<ConnectionEvent>,
    start: Instant,
}

impl EventPublisher {
    pub(super) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            start: Instant::now(),
        }
    }

    pub(super) fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.tx.subscribe()
    }

    pub(super) fn publish(&self, kind: ConnectionEventKind) {
        let timestamp_ms = self.start.elapsed().as_millis() as u64;
        let _ = self.tx.send(ConnectionEvent { timestamp_ms, kind });
    }
}
