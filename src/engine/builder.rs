//! Handler registration and engine construction
//!
//! An [`RpcBuilder`] collects the request and notification handlers,
//! then binds them to a transport, producing the engine and the handle
//! application code talks to. Handler tables are immutable after bind.

use crate::engine::handle::RpcHandle;
use crate::engine::state::Engine;
use crate::protocol::types::ErrorData;
use crate::transport::Transport;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Type alias for request handlers to reduce signature noise
pub type RequestHandler = Box<dyn Fn(Option<Value>) -> Result<Value, HandlerError> + Send + Sync>;

/// Type alias for notification handlers: nothing to return, nothing to
/// fail observably
pub type NotificationHandler = Box<dyn Fn(Option<Value>) + Send + Sync>;

/// Ways a request handler can fail.
///
/// `InvalidParams` and `Internal` map to their reserved codes;
/// `Custom` is surfaced to the peer verbatim.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid params")]
    InvalidParams,

    #[error("internal error")]
    Internal,

    #[error("{0}")]
    Custom(ErrorData),
}

impl HandlerError {
    /// The wire payload for this failure.
    pub(crate) fn into_error_data(self) -> ErrorData {
        match self {
            HandlerError::InvalidParams => ErrorData::invalid_params(),
            HandlerError::Internal => ErrorData::internal_error(),
            HandlerError::Custom(error) => error,
        }
    }
}

/// Builder collecting handler registrations for one connection.
///
/// ```ignore
/// let (engine, handle) = RpcBuilder::new()
///     .method("ping", |_params| Ok(json!("pong")))
///     .notification("heartbeat", |_params| {})
///     .bind(transport);
/// tokio::spawn(engine.run());
/// ```
#[derive(Default)]
pub struct RpcBuilder {
    methods: HashMap<String, RequestHandler>,
    notifications: HashMap<String, NotificationHandler>,
}

impl RpcBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request handler. A later registration under the same
    /// name replaces the earlier one.
    pub fn method<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Box::new(handler));
        self
    }

    /// Register a notification handler.
    pub fn notification<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<Value>) + Send + Sync + 'static,
    {
        self.notifications.insert(name.into(), Box::new(handler));
        self
    }

    /// Bind the registered handlers to a transport.
    ///
    /// Returns the engine (to be driven by the host, typically
    /// `tokio::spawn(engine.run())`) and the handle application code
    /// uses to issue calls and feed inbound frames.
    pub fn bind<T: Transport>(self, transport: T) -> (Engine<T>, RpcHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let engine = Engine::new(transport, self.methods, self.notifications, events_rx);
        (engine, RpcHandle::new(events_tx))
    }
}
