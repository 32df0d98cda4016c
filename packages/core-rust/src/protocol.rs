//! Storage-node protocol values: version bounds, operation codes, status
//! codes, and the request/response messages exchanged with peers.
//!
//! The wire encoding itself lives in the codec layer; these are the decoded
//! forms the server operates on. A `Request` is immutable once decoded.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol version bounds
// ---------------------------------------------------------------------------

/// Oldest protocol version this node still accepts.
pub const LOWEST_COMPAT_PROTOCOL_VERSION: u8 = 1;

/// Protocol version this node speaks natively.
pub const CURRENT_PROTOCOL_VERSION: u8 = 3;

// ---------------------------------------------------------------------------
// OpCode
// ---------------------------------------------------------------------------

/// Operation requested by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpCode {
    /// Append an entry to a ledger.
    AddEntry,
    /// Read an entry back from a ledger.
    ReadEntry,
}

impl OpCode {
    /// Numeric code carried on the wire.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            OpCode::AddEntry => 1,
            OpCode::ReadEntry => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusCode
// ---------------------------------------------------------------------------

/// Outcome of a request, reported back to the peer.
///
/// `Ok` is the single reserved success value; every other variant names a
/// specific failure reason defined by the operation that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    /// Request completed successfully.
    Ok,
    /// No such ledger on this node.
    NoLedger,
    /// Ledger exists but the requested entry does not.
    NoEntry,
    /// Request was malformed or inconsistent.
    BadRequest,
    /// Storage I/O failure while serving the request.
    Io,
    /// Request's protocol version is outside the supported range.
    BadVersion,
}

impl StatusCode {
    /// Numeric code carried on the wire.
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::NoLedger => 1,
            StatusCode::NoEntry => 2,
            StatusCode::BadRequest => 100,
            StatusCode::Io => 101,
            StatusCode::BadVersion => 103,
        }
    }

    /// Whether this is the reserved success value.
    #[must_use]
    pub fn is_ok(self) -> bool {
        matches!(self, StatusCode::Ok)
    }
}

// ---------------------------------------------------------------------------
// Request / Response
// ---------------------------------------------------------------------------

/// A decoded inbound request. Immutable after construction: the decoder builds
/// it once and the processing pipeline only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version the peer declared for this request.
    pub protocol_version: u8,
    /// Operation the peer is asking for.
    pub op: OpCode,
    /// Target ledger.
    pub ledger_id: u64,
    /// Target entry within the ledger.
    pub entry_id: u64,
    /// Operation-specific payload (entry body for appends, empty for reads).
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Request {
    #[must_use]
    pub fn new(
        protocol_version: u8,
        op: OpCode,
        ledger_id: u64,
        entry_id: u64,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            protocol_version,
            op,
            ledger_id,
            entry_id,
            payload,
        }
    }
}

/// Outbound response for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version the response is encoded under (echoes the request's).
    pub protocol_version: u8,
    /// Operation this response answers.
    pub op: OpCode,
    /// Outcome of the request.
    pub status: StatusCode,
    /// Ledger the request addressed.
    pub ledger_id: u64,
    /// Entry the request addressed.
    pub entry_id: u64,
    /// Operation-specific payload (entry body for reads, empty otherwise).
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl Response {
    /// Build a response answering `request` with the given status and payload.
    #[must_use]
    pub fn for_request(request: &Request, status: StatusCode, payload: Vec<u8>) -> Self {
        Self {
            protocol_version: request.protocol_version,
            op: request.op,
            status,
            ledger_id: request.ledger_id,
            entry_id: request.entry_id,
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
