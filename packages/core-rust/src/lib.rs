//! Quill core — protocol value types shared by the server and client SDKs.

pub mod protocol;

pub use protocol::{
    OpCode, Request, Response, StatusCode, CURRENT_PROTOCOL_VERSION,
    LOWEST_COMPAT_PROTOCOL_VERSION,
};
