//! Per-operation counters and latency distributions.
//!
//! 1. **Window** (`window`): sliding-window histogram with an explicit
//!    "insufficient data" sentinel
//! 2. **Registry** (`registry`): `OpKey`-addressed stats entries shared by all
//!    workers

pub mod registry;
pub mod window;

pub use registry::{OpKey, OpStatsLogger, OpStatsSnapshot, StatsRegistry};
pub use window::{WindowSnapshot, WindowedHistogram, LATENCY_PERCENTILES, LATENCY_UNAVAILABLE_MILLIS};
