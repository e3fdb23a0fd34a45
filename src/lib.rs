//! Transport-agnostic JSON-RPC 2.0 engine
//!
//! One process acting as client and server at the same time over a
//! single externally supplied bidirectional text channel (WebSocket,
//! line-framed TCP, stdio - anything that moves text frames).
//!
//! The crate has two layers:
//!
//! - [`protocol`]: the message codec. Parses a text frame into a typed
//!   [`protocol::Message`] (requests, notifications, responses, batches,
//!   bare errors) and serializes messages back to canonical JSON-RPC 2.0
//!   text. Every decode failure maps to a ready-to-send error reply.
//! - [`engine`]: the per-connection state machine. Dispatches inbound
//!   requests to registered handlers, correlates outbound calls to their
//!   responses under concurrency, timeouts and channel failure, and
//!   drives the caller-supplied [`Transport`] for everything outbound.
//!
//! The host owns the socket: it implements [`Transport`] for the send
//! side and feeds inbound frames through the [`RpcHandle`].
//!
//! ```ignore
//! use jsonrpc_duplex::{RpcBuilder, BatchCall};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let (engine, handle) = RpcBuilder::new()
//!     .method("ping", |_params| Ok(json!("pong")))
//!     .notification("heartbeat", |_params| {})
//!     .bind(transport);
//! tokio::spawn(engine.run());
//!
//! // transport driver: handle.feed_text(frame) for each inbound frame
//!
//! let answer = handle
//!     .call("add", Some(json!([1, 2])), Duration::from_secs(5))
//!     .await?;
//! ```

pub mod engine;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use engine::{
    BatchCall, BatchResults, CallError, CallOutcome, Engine, HandlerError, Next, RequestError,
    RpcBuilder, RpcHandle, StopReason,
};
pub use protocol::{Call, DecodeError, ErrorData, Id, Message, Response, error_codes};
pub use transport::Transport;
