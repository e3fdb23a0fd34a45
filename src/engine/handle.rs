//! Application handle for one connection
//!
//! An [`RpcHandle`] is the caller side of the engine mailbox: it issues
//! calls, notifications and batches, and it is also how the transport
//! driver feeds inbound frames into the engine. Handles are cheap to
//! clone; every clone talks to the same engine.
//!
//! Waiter reaping is caller-driven: after a call or batch completes,
//! win or lose, the handle enqueues the matching remove command so late
//! responses are logged and discarded instead of leaking entries.

use crate::engine::command::{BatchResults, Command, Event};
use crate::protocol::types::{Call, ErrorData, Id};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use uuid::Uuid;

/// Why a call produced no response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The timeout elapsed before the matching response arrived
    #[error("request timed out")]
    Timeout,

    /// The engine is gone (closed, or stopped on a dead transport)
    #[error("engine stopped")]
    EngineStopped,
}

/// Everything that can go wrong with a single request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The peer answered with an error response
    #[error("peer returned an error: {0}")]
    Returned(ErrorData),

    /// The result arrived but did not decode to the requested type.
    /// Surfaced only to this caller, never to the peer.
    #[error("failed to decode result: {0}")]
    Decode(#[source] serde_json::Error),

    /// No response: timeout or engine death
    #[error(transparent)]
    Call(#[from] CallError),
}

/// One element of an outbound batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchCall {
    /// A request; when `id` is `None` a fresh UUID-v4 string id is
    /// generated at send time.
    Request {
        id: Option<Id>,
        method: String,
        params: Option<Value>,
    },
    /// A notification; contributes nothing to the correlation id-set.
    Notification {
        method: String,
        params: Option<Value>,
    },
}

impl BatchCall {
    /// A request with a generated id.
    pub fn request(method: impl Into<String>, params: Option<Value>) -> Self {
        BatchCall::Request {
            id: None,
            method: method.into(),
            params,
        }
    }

    /// A request with a caller-assigned id.
    pub fn request_with_id(id: impl Into<Id>, method: impl Into<String>, params: Option<Value>) -> Self {
        BatchCall::Request {
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// A notification.
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        BatchCall::Notification {
            method: method.into(),
            params,
        }
    }
}

/// Handle to a running engine.
#[derive(Debug, Clone)]
pub struct RpcHandle {
    events: mpsc::UnboundedSender<Event>,
}

impl RpcHandle {
    pub(crate) fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self { events }
    }

    /// Feed one inbound text frame to the engine.
    pub fn feed_text(&self, frame: impl Into<String>) -> Result<(), CallError> {
        self.events
            .send(Event::Text(frame.into()))
            .map_err(|_| CallError::EngineStopped)
    }

    /// Feed one inbound binary frame to the engine (it will be rejected
    /// on the wire with a parse error).
    pub fn feed_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<(), CallError> {
        self.events
            .send(Event::Binary(bytes.into()))
            .map_err(|_| CallError::EngineStopped)
    }

    fn command(&self, command: Command) -> Result<(), CallError> {
        self.events
            .send(Event::Command(command))
            .map_err(|_| CallError::EngineStopped)
    }

    /// Send a request under a fresh UUID-v4 string id and wait for the
    /// matching response.
    pub async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        self.call_with_id(generated_id(), method, params, timeout).await
    }

    /// Send a request under a caller-assigned id and wait for the
    /// matching response.
    ///
    /// Ids must be unique among in-flight calls; a reused id replaces
    /// the earlier waiter (which then times out).
    pub async fn call_with_id(
        &self,
        id: impl Into<Id>,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RequestError> {
        let id = id.into();
        let (reply, rx) = oneshot::channel();
        self.command(Command::Request {
            id: id.clone(),
            method: method.to_string(),
            params,
            reply,
        })?;

        let outcome = time::timeout(timeout, rx).await;
        // reap the waiter entry, win or lose
        let _ = self.command(Command::RemoveWaiting { id });

        match outcome {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(RequestError::Returned(error)),
            Ok(Err(_closed)) => Err(CallError::EngineStopped.into()),
            Err(_elapsed) => Err(CallError::Timeout.into()),
        }
    }

    /// [`RpcHandle::call`], decoding the result into `R`.
    pub async fn call_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<R, RequestError> {
        let result = self.call(method, params, timeout).await?;
        serde_json::from_value(result).map_err(RequestError::Decode)
    }

    /// Send a notification. Fire-and-forget: no id, no waiter, no
    /// response.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), CallError> {
        self.command(Command::Notification {
            method: method.to_string(),
            params,
        })
    }

    /// Send a batch of requests and notifications as one frame and wait
    /// for the matching response array.
    ///
    /// The reply maps each request id to its outcome, in wire order. A
    /// batch containing no requests resolves to empty results as soon as
    /// the frame is sent.
    pub async fn call_batch(
        &self,
        items: Vec<BatchCall>,
        timeout: Duration,
    ) -> Result<BatchResults, CallError> {
        let mut calls = Vec::with_capacity(items.len());
        let mut ids = BTreeSet::new();
        for item in items {
            match item {
                BatchCall::Request { id, method, params } => {
                    let id = id.unwrap_or_else(generated_id);
                    ids.insert(id.clone());
                    calls.push(Call::Request { id, method, params });
                }
                BatchCall::Notification { method, params } => {
                    calls.push(Call::Notification { method, params });
                }
            }
        }

        let (reply, rx) = oneshot::channel();
        self.command(Command::Batch {
            calls,
            ids: ids.clone(),
            reply,
        })?;

        let outcome = time::timeout(timeout, rx).await;
        let _ = self.command(Command::RemoveWaitingBatch { ids });

        match outcome {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(_closed)) => Err(CallError::EngineStopped),
            Err(_elapsed) => Err(CallError::Timeout),
        }
    }

    /// Stop the engine normally.
    pub fn close(&self) -> Result<(), CallError> {
        self.command(Command::Close)
    }

    /// Whether the engine has stopped.
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

fn generated_id() -> Id {
    Id::String(Uuid::new_v4().to_string())
}

// ============================================================================
// Tests
// ============================================================================
