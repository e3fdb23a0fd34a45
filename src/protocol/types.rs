//! JSON-RPC 2.0 wire data model
//!
//! Typed representations of everything that can appear on the wire:
//! request ids, error payloads, request-side and response-side messages,
//! and the top-level message envelope (singletons and batches).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

/// JSON-RPC 2.0 version identifier carried by every encoded object
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Error Codes (as per JSON-RPC specification)
/// https://www.jsonrpc.org/specification#error_object
pub mod error_codes {
    /// Parse error - Invalid JSON was received by the server.
    pub const PARSE_ERROR: i32 = -32700;

    /// Invalid Request - The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i32 = -32600;

    /// Method not found - The method does not exist / is not available.
    pub const METHOD_NOT_FOUND: i32 = -32601;

    /// Invalid params - Invalid method parameter(s).
    pub const INVALID_PARAMS: i32 = -32602;

    /// Internal error - Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;

    /// Server error range start - Reserved for implementation-defined server-errors.
    pub const SERVER_ERROR_START: i32 = -32099;

    /// Server error range end - Reserved for implementation-defined server-errors.
    pub const SERVER_ERROR_END: i32 = -32000;
}

// ============================================================================
// Request Ids
// ============================================================================

/// A request identifier: a signed integer or a string.
///
/// Ids key the engine's pending-call map, and sorted sets of ids key the
/// pending-batch map, hence `Eq + Hash + Ord`. JSON null, floats, booleans
/// and objects are never valid ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    /// An integer id
    Int(i64),
    /// A string id
    String(String),
}

impl Id {
    /// Extract an id from a JSON value. Anything but an integer or a
    /// string yields `None`.
    pub fn from_value(value: &Value) -> Option<Id> {
        match value {
            Value::Number(n) => n.as_i64().map(Id::Int),
            Value::String(s) => Some(Id::String(s.clone())),
            _ => None,
        }
    }

    /// The JSON form of this id.
    pub fn to_value(&self) -> Value {
        match self {
            Id::Int(i) => json!(i),
            Id::String(s) => json!(s),
        }
    }
}

impl From<i64> for Id {
    fn from(v: i64) -> Self {
        Id::Int(v)
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::String(s.to_string())
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::String(s)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Int(i) => write!(f, "{i}"),
            Id::String(s) => write!(f, "{s}"),
        }
    }
}

// ============================================================================
// Error Payloads
// ============================================================================

/// The `error` member of a response.
///
/// Conformant peers send the structured triple; some send a bare string,
/// which is tolerated on decode. Encoding always emits the structured
/// form: a `Text` payload is wrapped as an internal error.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorData {
    /// Structured error object
    Object {
        /// Error code
        code: i32,
        /// Short error description
        message: String,
        /// Optional additional data
        data: Option<Value>,
    },
    /// Bare string error (non-conformant, input only)
    Text(String),
}

impl ErrorData {
    /// Create a structured error with no additional data.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        ErrorData::Object {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create a structured error carrying additional data.
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        ErrorData::Object {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// The standard "Method not found" error, with the unknown method
    /// name as `data`.
    pub fn method_not_found(method: &str) -> Self {
        Self::with_data(error_codes::METHOD_NOT_FOUND, "Method not found", json!(method))
    }

    /// The standard "Invalid params" error.
    pub fn invalid_params() -> Self {
        Self::new(error_codes::INVALID_PARAMS, "Invalid params")
    }

    /// The standard "Internal error" error.
    pub fn internal_error() -> Self {
        Self::new(error_codes::INTERNAL_ERROR, "Internal error")
    }

    /// Decode an error payload: the structured triple preferentially,
    /// falling back to a bare string.
    pub fn from_value(value: &Value) -> Option<ErrorData> {
        if let Value::Object(obj) = value {
            let code = obj.get("code")?.as_i64()?;
            let message = obj.get("message")?.as_str()?;
            return Some(ErrorData::Object {
                code: i32::try_from(code).ok()?,
                message: message.to_string(),
                data: obj.get("data").cloned(),
            });
        }
        value.as_str().map(|s| ErrorData::Text(s.to_string()))
    }

    /// The JSON form of this payload, always the structured object.
    pub fn to_value(&self) -> Value {
        match self {
            ErrorData::Object {
                code,
                message,
                data: Some(data),
            } => json!({ "code": code, "message": message, "data": data }),
            ErrorData::Object {
                code,
                message,
                data: None,
            } => json!({ "code": code, "message": message }),
            ErrorData::Text(message) => {
                json!({ "code": error_codes::INTERNAL_ERROR, "message": message })
            }
        }
    }
}

impl fmt::Display for ErrorData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorData::Object { code, message, .. } => write!(f, "{message} ({code})"),
            ErrorData::Text(message) => write!(f, "{message}"),
        }
    }
}

// ============================================================================
// Request-side and Response-side Messages
// ============================================================================

/// A request-side message: an invocation expecting a response, or a
/// fire-and-forget notification.
///
/// `params` is an opaque JSON value, preserved as-is in both directions.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// An invocation identified by a unique id; the peer must respond.
    Request {
        /// Correlation id
        id: Id,
        /// Method name
        method: String,
        /// Optional parameters
        params: Option<Value>,
    },
    /// An invocation with no id and no response.
    Notification {
        /// Method name
        method: String,
        /// Optional parameters
        params: Option<Value>,
    },
}

impl Call {
    /// The method name of either variant.
    pub fn method(&self) -> &str {
        match self {
            Call::Request { method, .. } | Call::Notification { method, .. } => method,
        }
    }

    /// The correlation id, if this is a request.
    pub fn id(&self) -> Option<&Id> {
        match self {
            Call::Request { id, .. } => Some(id),
            Call::Notification { .. } => None,
        }
    }
}

/// A response-side message.
///
/// The id on the error arm may be absent: a peer that could not identify
/// the request it is failing replies with `"id": null`. Such responses
/// are diagnostic only and are never routed to a waiter.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Successful result for the request with the given id.
    Success {
        /// Correlation id
        id: Id,
        /// Opaque result value
        result: Value,
    },
    /// Error outcome; `id` is `None` when the peer could not identify
    /// the request.
    Error {
        /// Correlation id, absent when unidentifiable
        id: Option<Id>,
        /// Error payload
        error: ErrorData,
    },
}

impl Response {
    /// Build a success response.
    pub fn success(id: Id, result: Value) -> Self {
        Response::Success { id, result }
    }

    /// Build an error response.
    pub fn error(id: Option<Id>, error: ErrorData) -> Self {
        Response::Error { id, error }
    }

    /// The correlation id, if the wire carried one.
    pub fn id(&self) -> Option<&Id> {
        match self {
            Response::Success { id, .. } => Some(id),
            Response::Error { id, .. } => id.as_ref(),
        }
    }
}

// ============================================================================
// Message Envelope
// ============================================================================

/// Every shape a single inbound or outbound frame can take.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A single request or notification
    Call(Call),
    /// A single response
    Response(Response),
    /// A bare top-level error object with no id (server-initiated parse
    /// diagnostic)
    Error(ErrorData),
    /// A non-empty array of requests/notifications
    CallBatch(Vec<Call>),
    /// A non-empty array of responses
    ResponseBatch(Vec<Response>),
}

// ============================================================================
// Tests
// ============================================================================
