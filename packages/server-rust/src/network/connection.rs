//! Connection handles for outbound responses.
//!
//! Each peer connection gets a bounded mpsc channel; the receiver end is held
//! by the transport write loop, this module holds the sender end. Writes are
//! fire-and-forget: the processing pipeline hands a response off and never
//! learns whether the transport delivered it.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use quill_core::Response;

/// Unique identifier for a connection, assigned at accept time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

// ---------------------------------------------------------------------------
// ResponseChannel trait
// ---------------------------------------------------------------------------

/// Outbound side of a peer connection, as seen by request processors.
///
/// `write` is a handoff with no delivery acknowledgment; implementations must
/// not block the calling task.
pub trait ResponseChannel: Send + Sync + 'static {
    /// Hand a response to the transport layer. Never blocks, never reports
    /// delivery back to the caller.
    fn write(&self, response: Response);

    /// Peer identity for diagnostics (address or connection label).
    fn peer(&self) -> &str;
}

// ---------------------------------------------------------------------------
// ConnectionHandle
// ---------------------------------------------------------------------------

/// Production [`ResponseChannel`] backed by a bounded mpsc channel.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    peer: String,
    tx: mpsc::Sender<Response>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver the transport write loop consumes.
    #[must_use]
    pub fn new(id: ConnectionId, peer: String, capacity: usize) -> (Self, mpsc::Receiver<Response>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { id, peer, tx }, rx)
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether the transport write loop still holds the receiver.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl ResponseChannel for ConnectionHandle {
    fn write(&self, response: Response) {
        match self.tx.try_send(response) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    conn = self.id.0,
                    peer = %self.peer,
                    "outbound queue full, dropping response"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(
                    conn = self.id.0,
                    peer = %self.peer,
                    "connection closed, dropping response"
                );
            }
        }
    }

    fn peer(&self) -> &str {
        &self.peer
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
