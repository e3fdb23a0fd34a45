//! The per-connection engine
//!
//! A single-owner actor: the engine owns the handler tables and both
//! pending-correlation maps, and consumes one merged mailbox of inbound
//! frames and application commands. Every mutation happens on the engine
//! task, so there are no locks and no ordering surprises beyond mailbox
//! order.
//!
//! Each `handle_*` method returns a [`Next`] directive so hosts can also
//! drive the engine directly instead of spawning [`Engine::run`].

use crate::engine::builder::{NotificationHandler, RequestHandler};
use crate::engine::command::{BatchResults, CallOutcome, Command, Event};
use crate::protocol::codec;
use crate::protocol::types::{Call, ErrorData, Id, Message, Response, error_codes};
use crate::transport::Transport;
use serde_json::{Value, json};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace, warn};

/// Next-state directive returned by every engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Keep consuming events
    Continue,
    /// Stop the engine
    Stop(StopReason),
}

/// Why the engine stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Normal stop via a close command (or all handles dropped)
    Closed,
    /// A transport send failed; the connection is presumed dead
    SocketClosed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Closed => write!(f, "closed"),
            StopReason::SocketClosed => write!(f, "Socket Closed"),
        }
    }
}

/// Engine state for one connection.
///
/// Waiter slots hold `None` between response delivery and the caller's
/// remove command: delivery takes the one-shot but leaves the entry, so
/// reaping stays caller-driven and a late or duplicate response is
/// logged instead of being routed to a stale caller.
pub struct Engine<T: Transport> {
    transport: T,
    methods: HashMap<String, RequestHandler>,
    notifications: HashMap<String, NotificationHandler>,
    waiting: HashMap<Id, Option<oneshot::Sender<CallOutcome>>>,
    waiting_batches: HashMap<BTreeSet<Id>, Option<oneshot::Sender<BatchResults>>>,
    events: mpsc::UnboundedReceiver<Event>,
}

impl<T: Transport> Engine<T> {
    pub(crate) fn new(
        transport: T,
        methods: HashMap<String, RequestHandler>,
        notifications: HashMap<String, NotificationHandler>,
        events: mpsc::UnboundedReceiver<Event>,
    ) -> Self {
        Self {
            transport,
            methods,
            notifications,
            waiting: HashMap::new(),
            waiting_batches: HashMap::new(),
            events,
        }
    }

    /// Drain the mailbox until a stop directive.
    ///
    /// Returns `StopReason::Closed` when every handle has been dropped
    /// without an explicit close.
    pub async fn run(mut self) -> StopReason {
        while let Some(event) = self.events.recv().await {
            if let Next::Stop(reason) = self.handle_event(event).await {
                debug!("engine stopped: {}", reason);
                return reason;
            }
        }
        trace!("all handles dropped, engine stopped");
        StopReason::Closed
    }

    /// Process one mailbox event.
    pub async fn handle_event(&mut self, event: Event) -> Next {
        match event {
            Event::Text(text) => self.handle_text(&text).await,
            Event::Binary(bytes) => self.handle_binary(&bytes).await,
            Event::Command(command) => self.handle_command(command).await,
        }
    }

    /// Process one inbound text frame.
    pub async fn handle_text(&mut self, text: &str) -> Next {
        trace!("inbound frame: {} bytes", text.len());
        let message = match codec::decode(text) {
            Ok(message) => message,
            Err(err) => {
                debug!("inbound frame failed to decode: {}", err);
                return self.send(&err.to_reply()).await;
            }
        };

        match message {
            Message::Call(call) => self.dispatch_call(call).await,
            Message::Response(response) => {
                self.resolve_response(response);
                Next::Continue
            }
            Message::Error(error) => {
                warn!("peer sent bare error: {}", error);
                Next::Continue
            }
            Message::CallBatch(calls) => self.dispatch_call_batch(calls).await,
            Message::ResponseBatch(responses) => {
                self.resolve_response_batch(responses);
                Next::Continue
            }
        }
    }

    /// Reject an inbound binary frame. Binary payloads are not parseable
    /// as JSON-RPC 2.0; no state is touched.
    pub async fn handle_binary(&mut self, bytes: &[u8]) -> Next {
        debug!("rejecting binary frame of {} bytes", bytes.len());
        let error = ErrorData::with_data(
            error_codes::PARSE_ERROR,
            "Parse error",
            json!("binary frames are unsupported"),
        );
        self.send(&Message::Response(Response::error(None, error))).await
    }

    /// Process one application command.
    pub async fn handle_command(&mut self, command: Command) -> Next {
        match command {
            Command::Request {
                id,
                method,
                params,
                reply,
            } => {
                let message = Message::Call(Call::Request {
                    id: id.clone(),
                    method,
                    params,
                });
                let next = self.send(&message).await;
                if next == Next::Continue && self.waiting.insert(id.clone(), Some(reply)).is_some() {
                    warn!("pending call with duplicate id replaced: {}", id);
                }
                next
            }
            Command::Notification { method, params } => {
                self.send(&Message::Call(Call::Notification { method, params })).await
            }
            Command::Batch { calls, ids, reply } => {
                let next = self.send(&Message::CallBatch(calls)).await;
                if next == Next::Continue {
                    if ids.is_empty() {
                        // nothing to correlate; resolve immediately
                        let _ = reply.send(BatchResults::default());
                    } else if self.waiting_batches.insert(ids.clone(), Some(reply)).is_some() {
                        warn!("pending batch with duplicate id-set replaced: {:?}", ids);
                    }
                }
                next
            }
            Command::RemoveWaiting { id } => {
                if self.waiting.remove(&id).is_none() {
                    debug!("remove for unknown pending call: {}", id);
                }
                Next::Continue
            }
            Command::RemoveWaitingBatch { ids } => {
                if self.waiting_batches.remove(&ids).is_none() {
                    debug!("remove for unknown pending batch: {:?}", ids);
                }
                Next::Continue
            }
            Command::Close => Next::Stop(StopReason::Closed),
        }
    }

    async fn dispatch_call(&mut self, call: Call) -> Next {
        match call {
            Call::Request { id, method, params } => {
                let response = self.invoke_method(id, &method, params);
                self.send(&Message::Response(response)).await
            }
            Call::Notification { method, params } => {
                self.invoke_notification(&method, params);
                Next::Continue
            }
        }
    }

    /// Process an inbound batch in order. Only requests contribute
    /// responses; a batch of nothing but notifications produces no
    /// frame at all.
    async fn dispatch_call_batch(&mut self, calls: Vec<Call>) -> Next {
        let mut responses = Vec::new();
        for call in calls {
            match call {
                Call::Request { id, method, params } => {
                    responses.push(self.invoke_method(id, &method, params));
                }
                Call::Notification { method, params } => {
                    self.invoke_notification(&method, params);
                }
            }
        }
        if responses.is_empty() {
            return Next::Continue;
        }
        self.send(&Message::ResponseBatch(responses)).await
    }

    fn invoke_method(&self, id: Id, method: &str, params: Option<Value>) -> Response {
        match self.methods.get(method) {
            Some(handler) => match handler(params) {
                Ok(result) => Response::success(id, result),
                Err(err) => Response::error(Some(id), err.into_error_data()),
            },
            None => {
                debug!("no handler for request method: {}", method);
                Response::error(Some(id), ErrorData::method_not_found(method))
            }
        }
    }

    fn invoke_notification(&self, method: &str, params: Option<Value>) {
        match self.notifications.get(method) {
            Some(handler) => handler(params),
            None => warn!("no handler for notification: {}", method),
        }
    }

    fn resolve_response(&mut self, response: Response) {
        let (id, outcome) = match response {
            Response::Success { id, result } => (id, Ok(result)),
            Response::Error {
                id: Some(id),
                error,
            } => (id, Err(error)),
            Response::Error { id: None, error } => {
                warn!("peer sent error response without an id: {}", error);
                return;
            }
        };
        match self.waiting.get_mut(&id) {
            Some(slot) => match slot.take() {
                // a dropped receiver means the caller already gave up
                Some(reply) => {
                    let _ = reply.send(outcome);
                }
                None => warn!("duplicate response for already-resolved call: {}", id),
            },
            None => warn!("no pending call matches response id: {}", id),
        }
    }

    fn resolve_response_batch(&mut self, responses: Vec<Response>) {
        let mut entries: Vec<(Id, CallOutcome)> = Vec::with_capacity(responses.len());
        for response in responses {
            match response {
                Response::Success { id, result } => entries.push((id, Ok(result))),
                Response::Error {
                    id: Some(id),
                    error,
                } => entries.push((id, Err(error))),
                Response::Error { id: None, error } => {
                    warn!("batch response element without an id: {}", error);
                }
            }
        }
        let ids: BTreeSet<Id> = entries.iter().map(|(id, _)| id.clone()).collect();
        match self.waiting_batches.get_mut(&ids) {
            Some(slot) => match slot.take() {
                Some(reply) => {
                    let _ = reply.send(BatchResults::new(entries));
                }
                None => warn!("duplicate response batch for already-resolved id-set: {:?}", ids),
            },
            None => warn!("no pending batch matches response id-set: {:?}", ids),
        }
    }

    async fn send(&mut self, message: &Message) -> Next {
        let frame = codec::encode(message);
        trace!("outbound frame: {}", frame);
        match self.transport.send(&frame).await {
            Ok(()) => Next::Continue,
            Err(err) => {
                error!("transport send failed: {}", err);
                Next::Stop(StopReason::SocketClosed)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
