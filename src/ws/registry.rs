//! Live-connection registry used by the heartbeat.
//!
//! Each connection registers a liveness flag and a control channel. The
//! heartbeat probes every entry; the connection task owns its socket and
//! acts on the control messages it receives.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{RwLock, mpsc};

use crate::domain::ConnectionId;

/// Capacity of each connection's control channel.
const CONTROL_CHANNEL_CAPACITY: usize = 4;

/// Instruction from the heartbeat to a connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Send a transport-level ping.
    Ping,
    /// Close the connection; it missed the previous probe.
    Terminate,
}

/// Registry-side view of one live connection.
#[derive(Debug)]
struct ConnectionHandle {
    alive: Arc<AtomicBool>,
    control: mpsc::Sender<Control>,
}

/// Counts from one heartbeat pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    /// Connections that answered the previous probe and were pinged again.
    pub pinged: usize,
    /// Connections told to terminate.
    pub terminated: usize,
}

/// Set of live connections. Safe to iterate while connections come and go.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. Returns its liveness flag (initially alive) and
    /// the receiving end of its control channel.
    pub async fn register(&self, id: ConnectionId) -> (Arc<AtomicBool>, mpsc::Receiver<Control>) {
        let alive = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        self.connections.write().await.insert(
            id,
            ConnectionHandle {
                alive: Arc::clone(&alive),
                control: tx,
            },
        );
        (alive, rx)
    }

    /// Removes a connection. Unknown ids are ignored.
    pub async fn remove(&self, id: ConnectionId) {
        self.connections.write().await.remove(&id);
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Runs one heartbeat pass.
    ///
    /// A connection whose flag is still cleared from the previous pass is
    /// told to terminate; every other connection has its flag cleared and
    /// is pinged. A full control channel skips the connection for this
    /// pass; a closed one means the task is gone and the entry is removed.
    pub async fn probe_all(&self) -> ProbeSummary {
        let mut summary = ProbeSummary::default();
        let mut gone = Vec::new();
        {
            let connections = self.connections.read().await;
            for (id, handle) in connections.iter() {
                let control = if handle.alive.swap(false, Ordering::AcqRel) {
                    summary.pinged += 1;
                    Control::Ping
                } else {
                    summary.terminated += 1;
                    Control::Terminate
                };
                if let Err(mpsc::error::TrySendError::Closed(_)) = handle.control.try_send(control)
                {
                    gone.push(*id);
                }
            }
        }
        if !gone.is_empty() {
            let mut connections = self.connections.write().await;
            for id in gone {
                connections.remove(&id);
            }
        }
        summary
    }
}
