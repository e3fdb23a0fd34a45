//! JSON-RPC 2.0 protocol layer
//!
//! The typed wire data model ([`types`]) and the codec between text
//! frames and typed messages ([`codec`]), including the mapping from
//! every decode-failure class to its protocol-compliant error reply.

pub mod codec;
pub mod types;

pub use codec::{DecodeError, decode, encode};
pub use types::{Call, ErrorData, Id, JSONRPC_VERSION, Message, Response, error_codes};
