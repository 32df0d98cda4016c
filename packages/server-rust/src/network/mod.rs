//! Network-facing types: connection identities and outbound response channels.

pub mod connection;

pub use connection::{ConnectionHandle, ConnectionId, ResponseChannel};
