use std::time::Duration;

use quill_core::{CURRENT_PROTOCOL_VERSION, LOWEST_COMPAT_PROTOCOL_VERSION};

/// Server-level configuration for the request-processing core.
///
/// Controls the accepted protocol version range, worker sizing, and the
/// stats latency window.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unique identifier for this server node.
    pub node_id: String,
    /// Oldest protocol version this node accepts (inclusive).
    pub lowest_compat_protocol_version: u8,
    /// Newest protocol version this node accepts (inclusive).
    pub current_protocol_version: u8,
    /// Number of request-processing workers.
    pub worker_count: usize,
    /// Bounded queue depth per worker.
    pub worker_queue_capacity: usize,
    /// Duration covered by one stats window slot.
    pub stats_slot_duration: Duration,
    /// Number of stats window slots; window = slots x slot duration.
    pub stats_slot_count: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            lowest_compat_protocol_version: LOWEST_COMPAT_PROTOCOL_VERSION,
            current_protocol_version: CURRENT_PROTOCOL_VERSION,
            worker_count: 4,
            worker_queue_capacity: 256,
            stats_slot_duration: Duration::from_secs(10),
            stats_slot_count: 6,
        }
    }
}
