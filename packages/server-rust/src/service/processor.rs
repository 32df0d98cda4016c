//! Per-request processing tasks.
//!
//! The transport layer wraps each decoded request in a processor the moment it
//! comes off the wire; the enqueue timestamp captured at that point makes the
//! recorded latency include queueing delay, not just active processing. The
//! processor is handed to a worker once and discarded after it runs.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use quill_core::{Request, Response, StatusCode};

use super::dispatch::ResponseDispatcher;
use super::version::VersionGate;
use crate::network::ResponseChannel;
use crate::stats::{OpKey, StatsRegistry};

// ---------------------------------------------------------------------------
// StorageBackend
// ---------------------------------------------------------------------------

/// Opaque handle to the node's durable storage subsystem.
///
/// The processing core only holds the handle; the operations on it are
/// defined by the concrete processors (entry append, entry read) that live
/// with the storage layer.
pub trait StorageBackend: Send + Sync + 'static {}

// ---------------------------------------------------------------------------
// RequestProcessor trait
// ---------------------------------------------------------------------------

/// One request's lifecycle, executed by a worker.
///
/// Implementations must check [`ProcessorBase::is_version_compatible`] before
/// any privileged work, and must reach [`ProcessorBase::send_response`]
/// exactly once on every completing path: success, domain failure, or
/// rejected version.
#[async_trait]
pub trait RequestProcessor: Send + 'static {
    /// Stats key this processor's outcome is recorded under.
    fn op_key(&self) -> OpKey;

    /// Peer identity, for fault diagnostics.
    fn peer(&self) -> String;

    /// Run the request to completion. Consumes the processor: a task is never
    /// reused or pooled.
    async fn execute(self: Box<Self>);
}

// ---------------------------------------------------------------------------
// ProcessorBase
// ---------------------------------------------------------------------------

/// Shared state and behavior embedded in every concrete processor.
///
/// Holds the request, the peer channel, the storage handle, and the enqueue
/// timestamp. The timestamp is captured in [`ProcessorBase::new`], before the
/// task is visible to any worker, and never changes afterwards.
pub struct ProcessorBase {
    request: Request,
    channel: Arc<dyn ResponseChannel>,
    backend: Arc<dyn StorageBackend>,
    gate: VersionGate,
    dispatcher: ResponseDispatcher,
    enqueued_at: Instant,
}

impl ProcessorBase {
    /// Capture the enqueue timestamp and store the collaborators verbatim.
    /// No validation happens here; the request was already decoded and the
    /// version check belongs to `execute`.
    #[must_use]
    pub fn new(
        request: Request,
        channel: Arc<dyn ResponseChannel>,
        backend: Arc<dyn StorageBackend>,
        gate: VersionGate,
        stats: Arc<StatsRegistry>,
    ) -> Self {
        Self {
            request,
            channel,
            backend,
            gate,
            dispatcher: ResponseDispatcher::new(stats),
            enqueued_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    #[must_use]
    pub fn peer(&self) -> String {
        self.channel.peer().to_string()
    }

    #[must_use]
    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Whether the request's declared protocol version is supported. Logs the
    /// mismatch but leaves the failure response to the caller.
    #[must_use]
    pub fn is_version_compatible(&self) -> bool {
        self.gate.is_compatible(&self.request)
    }

    /// Conclude the request: write the response, then record the outcome with
    /// the latency elapsed since enqueue. Call exactly once per task.
    pub fn send_response(&self, status: StatusCode, op: OpKey, response: Response) {
        self.dispatcher
            .dispatch(self.channel.as_ref(), status, op, response, self.enqueued_at);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
