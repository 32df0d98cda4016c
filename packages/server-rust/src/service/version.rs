//! Protocol version gating.
//!
//! Every request declares the protocol version it was encoded under; the gate
//! checks it against the server's configured inclusive range before a
//! processor does any privileged work. The gate only reports incompatibility,
//! it never rejects on the caller's behalf: the processor decides which
//! failure response to send.

use quill_core::Request;

use super::config::ServerConfig;

/// Inclusive protocol version range accepted by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGate {
    lowest: u8,
    current: u8,
}

impl VersionGate {
    #[must_use]
    pub fn new(lowest: u8, current: u8) -> Self {
        debug_assert!(lowest <= current);
        Self { lowest, current }
    }

    #[must_use]
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(
            config.lowest_compat_protocol_version,
            config.current_protocol_version,
        )
    }

    /// True iff the request's declared version is inside the supported range.
    ///
    /// On an incompatible version this emits one diagnostic log entry naming
    /// the expected range and the offending version, and returns `false`.
    #[must_use]
    pub fn is_compatible(&self, request: &Request) -> bool {
        let version = request.protocol_version;
        if version < self.lowest || version > self.current {
            tracing::error!(
                expected_min = self.lowest,
                expected_max = self.current,
                got = version,
                "invalid protocol version"
            );
            return false;
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
