//! Quill server — the request-processing core of a storage-node protocol
//! server: per-request tasks with end-to-end latency tracking, protocol
//! version gating, fault-isolating workers, and per-operation stats.

pub mod network;
pub mod service;
pub mod stats;

pub use network::{ConnectionHandle, ConnectionId, ResponseChannel};
pub use service::{
    safe_execute, ProcessorBase, ProcessorWorker, RequestProcessor, ResponseDispatcher,
    ServerConfig, StorageBackend, SubmitError, VersionGate, WorkerPool,
};
pub use stats::{OpKey, OpStatsLogger, OpStatsSnapshot, StatsRegistry};
