//! Request-processing pipeline.
//!
//! 1. **Config** (`config`): server-level knobs (version range, worker sizing)
//! 2. **Version gate** (`version`): protocol compatibility check
//! 3. **Processor** (`processor`): per-request task base + extension trait
//! 4. **Dispatch** (`dispatch`): response write + outcome stats, in that order
//! 5. **Worker** (`worker`): fault-isolating worker pool

pub mod config;
pub mod dispatch;
pub mod processor;
pub mod version;
pub mod worker;

// Re-export key types for convenient access.
pub use config::ServerConfig;
pub use dispatch::ResponseDispatcher;
pub use processor::{ProcessorBase, RequestProcessor, StorageBackend};
pub use version::VersionGate;
pub use worker::{safe_execute, ProcessorWorker, SubmitError, WorkerPool};
