//! Response dispatch: the single exit point of a request's useful work.
//!
//! A dispatch writes the response onto the peer's channel and then records the
//! outcome into the stats registry. The write always comes first: the recorded
//! outcome is the server's decision, not network delivery, and the stats
//! update must never sit between the decision and the handoff.

use std::sync::Arc;
use std::time::Instant;

use quill_core::{Response, StatusCode};

use crate::network::ResponseChannel;
use crate::stats::{OpKey, StatsRegistry};

/// Writes responses and records per-operation outcome stats.
#[derive(Clone)]
pub struct ResponseDispatcher {
    stats: Arc<StatsRegistry>,
}

impl ResponseDispatcher {
    #[must_use]
    pub fn new(stats: Arc<StatsRegistry>) -> Self {
        Self { stats }
    }

    /// Conclude one request: hand `response` to the transport and record a
    /// success or failure event with the latency elapsed since `enqueued_at`.
    ///
    /// Must be called at most once per request; concrete processors own that
    /// guarantee on every code path.
    pub fn dispatch(
        &self,
        channel: &dyn ResponseChannel,
        status: StatusCode,
        op: OpKey,
        response: Response,
        enqueued_at: Instant,
    ) {
        channel.write(response);

        let elapsed_micros = u64::try_from(enqueued_at.elapsed().as_micros()).unwrap_or(u64::MAX);
        let op_stats = self.stats.op_stats(op);
        if status.is_ok() {
            op_stats.register_successful_event(elapsed_micros);
        } else {
            op_stats.register_failed_event(elapsed_micros);
        }
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<StatsRegistry> {
        &self.stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
