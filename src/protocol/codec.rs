//! Wire codec: text frames to typed messages and back
//!
//! The decoder accepts any of the five top-level shapes a peer can send
//! (single request/notification, single response, arrays of either, bare
//! error object) and degrades gracefully: every failure maps to a
//! protocol-compliant, ready-to-send error reply.

use crate::protocol::types::{
    Call, ErrorData, Id, JSONRPC_VERSION, Message, Response, error_codes,
};
use serde_json::{Map, Value, json};

// ============================================================================
// Decode Failures
// ============================================================================

/// Why a frame could not be decoded.
///
/// Each variant carries enough to build the reply mandated for it; see
/// [`DecodeError::to_reply`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    /// Valid JSON that matches none of the JSON-RPC shapes
    #[error("Invalid Request")]
    InvalidRequest,

    /// Byte-level JSON parse error
    #[error("Parse error: unexpected byte {0:?}")]
    UnexpectedByte(char),

    /// Input ended before the JSON document did
    #[error("Parse error: unexpected end of input")]
    UnexpectedEndOfInput,

    /// Invalid escape or unicode sequence inside a JSON string
    #[error("Parse error: unexpected sequence {0:?}")]
    UnexpectedSequence(String),
}

impl DecodeError {
    /// The error payload mandated for this failure class.
    pub fn to_error_data(&self) -> ErrorData {
        match self {
            DecodeError::InvalidRequest => {
                ErrorData::new(error_codes::INVALID_REQUEST, "Invalid Request")
            }
            DecodeError::UnexpectedByte(byte) => ErrorData::with_data(
                error_codes::PARSE_ERROR,
                "Parse error",
                json!(format!("Unexpected Byte: \"{byte}\"")),
            ),
            DecodeError::UnexpectedEndOfInput => ErrorData::with_data(
                error_codes::PARSE_ERROR,
                "Parse error",
                json!("Unexpected End of Input"),
            ),
            DecodeError::UnexpectedSequence(seq) => ErrorData::with_data(
                error_codes::PARSE_ERROR,
                "Parse error",
                json!(format!("Unexpected Sequence: \"{seq}\"")),
            ),
        }
    }

    /// Ready-to-send reply for a frame that failed to decode. The peer
    /// request could not be identified, so the reply carries a null id.
    pub fn to_reply(&self) -> Message {
        Message::Response(Response::error(None, self.to_error_data()))
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Parse a text frame into a typed [`Message`].
pub fn decode(text: &str) -> Result<Message, DecodeError> {
    let value: Value =
        serde_json::from_str(text).map_err(|err| classify_syntax_error(&err, text))?;
    decode_value(&value)
}

/// Discriminate a parsed JSON value.
///
/// Singletons are tried response-first (a response never carries
/// `method`, so an object holding both id+result and method is a
/// response); arrays are tried calls-first. Anything left over is an
/// invalid request.
fn decode_value(value: &Value) -> Result<Message, DecodeError> {
    match value {
        Value::Object(obj) => {
            if let Some(response) = response_from_object(obj) {
                return Ok(Message::Response(response));
            }
            if let Some(call) = call_from_object(obj) {
                return Ok(Message::Call(call));
            }
            if !obj.contains_key("id")
                && let Some(error) = obj.get("error").and_then(ErrorData::from_value)
            {
                return Ok(Message::Error(error));
            }
            Err(DecodeError::InvalidRequest)
        }
        Value::Array(items) => decode_array(items),
        _ => Err(DecodeError::InvalidRequest),
    }
}

fn decode_array(items: &[Value]) -> Result<Message, DecodeError> {
    if items.is_empty() {
        return Err(DecodeError::InvalidRequest);
    }
    let calls: Option<Vec<Call>> = items
        .iter()
        .map(|item| item.as_object().and_then(call_from_object))
        .collect();
    if let Some(calls) = calls {
        return Ok(Message::CallBatch(calls));
    }
    let responses: Option<Vec<Response>> = items
        .iter()
        .map(|item| item.as_object().and_then(response_from_object))
        .collect();
    match responses {
        Some(responses) => Ok(Message::ResponseBatch(responses)),
        // mixed element kinds, or elements of no known shape
        None => Err(DecodeError::InvalidRequest),
    }
}

/// A request when `id` is present (and an integer or string), otherwise
/// a notification. A present-but-null id is not a valid request id.
fn call_from_object(obj: &Map<String, Value>) -> Option<Call> {
    let method = obj.get("method")?.as_str()?.to_string();
    let params = obj.get("params").cloned();
    match obj.get("id") {
        Some(id) => Some(Call::Request {
            id: Id::from_value(id)?,
            method,
            params,
        }),
        None => Some(Call::Notification { method, params }),
    }
}

/// An object with `id` and either `result` or `error`. The error arm
/// tolerates a null id (the peer could not identify the request); the
/// success arm does not.
fn response_from_object(obj: &Map<String, Value>) -> Option<Response> {
    let id = obj.get("id")?;
    if let Some(error) = obj.get("error") {
        let id = match id {
            Value::Null => None,
            other => Some(Id::from_value(other)?),
        };
        return Some(Response::Error {
            id,
            error: ErrorData::from_value(error)?,
        });
    }
    let result = obj.get("result")?.clone();
    Some(Response::Success {
        id: Id::from_value(id)?,
        result,
    })
}

// ============================================================================
// Syntax-error Classification
// ============================================================================

/// Sort a `serde_json` failure into the three parse-error classes.
fn classify_syntax_error(err: &serde_json::Error, input: &str) -> DecodeError {
    if err.is_eof() {
        return DecodeError::UnexpectedEndOfInput;
    }
    let offset = byte_offset(input, err.line(), err.column());
    let description = err.to_string();
    if description.contains("escape") || description.contains("surrogate") {
        return DecodeError::UnexpectedSequence(sequence_at(input, offset));
    }
    match char_at(input, offset) {
        Some(byte) => DecodeError::UnexpectedByte(byte),
        None => DecodeError::UnexpectedEndOfInput,
    }
}

/// Translate serde_json's one-based line/column into a byte offset.
fn byte_offset(input: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (index, text) in input.split('\n').enumerate() {
        if index + 1 == line {
            return offset + column.saturating_sub(1);
        }
        offset += text.len() + 1;
    }
    input.len()
}

fn char_at(input: &str, offset: usize) -> Option<char> {
    input.get(offset..)?.chars().next()
}

/// The offending fragment around an invalid escape: from the opening
/// backslash (when one precedes the error position) through the char the
/// parser stopped on.
fn sequence_at(input: &str, offset: usize) -> String {
    let Some(head) = input.get(..offset) else {
        return String::new();
    };
    let start = head.rfind('\\').unwrap_or(offset);
    let end = input
        .get(offset..)
        .and_then(|tail| tail.chars().next())
        .map(|c| offset + c.len_utf8())
        .unwrap_or(input.len());
    input.get(start..end).unwrap_or_default().to_string()
}

// ============================================================================
// Encoding
// ============================================================================

/// Serialize a [`Message`] to its canonical wire text. Every emitted
/// object carries `"jsonrpc": "2.0"`; an error response with no id
/// carries `"id": null`.
pub fn encode(message: &Message) -> String {
    to_value(message).to_string()
}

/// The JSON form of a [`Message`].
pub fn to_value(message: &Message) -> Value {
    match message {
        Message::Call(call) => call_value(call),
        Message::Response(response) => response_value(response),
        Message::Error(error) => json!({
            "jsonrpc": JSONRPC_VERSION,
            "error": error.to_value(),
        }),
        Message::CallBatch(calls) => Value::Array(calls.iter().map(call_value).collect()),
        Message::ResponseBatch(responses) => {
            Value::Array(responses.iter().map(response_value).collect())
        }
    }
}

fn call_value(call: &Call) -> Value {
    let mut obj = match call {
        Call::Request { id, method, .. } => json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id.to_value(),
            "method": method,
        }),
        Call::Notification { method, .. } => json!({
            "jsonrpc": JSONRPC_VERSION,
            "method": method,
        }),
    };
    let (Call::Request { params, .. } | Call::Notification { params, .. }) = call;
    if let Some(params) = params {
        obj["params"] = params.clone();
    }
    obj
}

fn response_value(response: &Response) -> Value {
    match response {
        Response::Success { id, result } => json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id.to_value(),
            "result": result,
        }),
        Response::Error { id, error } => json!({
            "jsonrpc": JSONRPC_VERSION,
            "id": id.as_ref().map(Id::to_value).unwrap_or(Value::Null),
            "error": error.to_value(),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: impl Into<Id>, method: &str, params: Option<Value>) -> Call {
        Call::Request {
            id: id.into(),
            method: method.to_string(),
            params,
        }
    }

    fn notification(method: &str, params: Option<Value>) -> Call {
        Call::Notification {
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn decodes_single_request() {
        let message = decode(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert_eq!(message, Message::Call(request(1, "ping", None)));
    }

    #[test]
    fn decodes_notification_with_params() {
        let message = decode(r#"{"jsonrpc":"2.0","method":"log","params":{"level":"info"}}"#)
            .unwrap();
        assert_eq!(
            message,
            Message::Call(notification("log", Some(json!({"level": "info"}))))
        );
    }

    #[test]
    fn decodes_success_response() {
        let message = decode(r#"{"jsonrpc":"2.0","id":"U","result":42}"#).unwrap();
        assert_eq!(
            message,
            Message::Response(Response::success(Id::from("U"), json!(42)))
        );
    }

    #[test]
    fn decodes_error_response_with_null_id() {
        let message =
            decode(r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32600,"message":"Invalid Request"}}"#)
                .unwrap();
        assert_eq!(
            message,
            Message::Response(Response::error(
                None,
                ErrorData::new(-32600, "Invalid Request")
            ))
        );
    }

    #[test]
    fn decodes_bare_error_object() {
        let message = decode(r#"{"jsonrpc":"2.0","error":{"code":-32700,"message":"Parse error"}}"#)
            .unwrap();
        assert_eq!(
            message,
            Message::Error(ErrorData::new(-32700, "Parse error"))
        );
    }

    #[test]
    fn decodes_bare_string_error_payload() {
        let message = decode(r#"{"error":"something broke"}"#).unwrap();
        assert_eq!(
            message,
            Message::Error(ErrorData::Text("something broke".to_string()))
        );
    }

    #[test]
    fn response_wins_over_request_shape() {
        // carries both a method and id+result: responses never carry a
        // method, requests never carry a result, response is tried first
        let message = decode(r#"{"id":1,"method":"m","result":2}"#).unwrap();
        assert!(matches!(message, Message::Response(_)));
    }

    #[test]
    fn decodes_call_batch() {
        let message = decode(
            r#"[{"jsonrpc":"2.0","id":1,"method":"a"},{"jsonrpc":"2.0","method":"b"}]"#,
        )
        .unwrap();
        assert_eq!(
            message,
            Message::CallBatch(vec![request(1, "a", None), notification("b", None)])
        );
    }

    #[test]
    fn decodes_response_batch() {
        let message = decode(
            r#"[{"jsonrpc":"2.0","id":2,"result":"B"},{"jsonrpc":"2.0","id":1,"error":{"code":7,"message":"x"}}]"#,
        )
        .unwrap();
        assert_eq!(
            message,
            Message::ResponseBatch(vec![
                Response::success(Id::Int(2), json!("B")),
                Response::error(Some(Id::Int(1)), ErrorData::new(7, "x")),
            ])
        );
    }

    #[test]
    fn rejects_structural_mismatches() {
        assert_eq!(
            decode(r#"{"nonsense":"data"}"#),
            Err(DecodeError::InvalidRequest)
        );
        assert_eq!(decode("[]"), Err(DecodeError::InvalidRequest));
        assert_eq!(decode("42"), Err(DecodeError::InvalidRequest));
        assert_eq!(decode(r#""hello""#), Err(DecodeError::InvalidRequest));
        // request with a null id is neither request nor notification
        assert_eq!(
            decode(r#"{"id":null,"method":"m"}"#),
            Err(DecodeError::InvalidRequest)
        );
        // float and boolean ids are invalid everywhere
        assert_eq!(
            decode(r#"{"id":1.5,"method":"m"}"#),
            Err(DecodeError::InvalidRequest)
        );
        assert_eq!(
            decode(r#"{"id":true,"result":1}"#),
            Err(DecodeError::InvalidRequest)
        );
    }

    #[test]
    fn rejects_mixed_batches() {
        assert_eq!(
            decode(r#"[{"id":1,"result":1},{"method":"m"}]"#),
            Err(DecodeError::InvalidRequest)
        );
    }

    #[test]
    fn classifies_truncated_input() {
        assert_eq!(decode(r#"{"jsonrpc": "#), Err(DecodeError::UnexpectedEndOfInput));
        assert_eq!(decode(""), Err(DecodeError::UnexpectedEndOfInput));
    }

    #[test]
    fn classifies_unexpected_bytes() {
        assert_eq!(decode("{nonsense}"), Err(DecodeError::UnexpectedByte('n')));
        assert_eq!(decode("hello"), Err(DecodeError::UnexpectedByte('h')));
    }

    #[test]
    fn classifies_invalid_escape_sequences() {
        match decode(r#"{"a":"\x"}"#) {
            Err(DecodeError::UnexpectedSequence(seq)) => {
                assert!(seq.starts_with('\\'), "fragment was {seq:?}")
            }
            other => panic!("expected sequence error, got {other:?}"),
        }
    }

    #[test]
    fn decode_failure_replies_match_the_mapping() {
        let reply = DecodeError::InvalidRequest.to_reply();
        assert_eq!(
            to_value(&reply),
            json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": { "code": -32600, "message": "Invalid Request" }
            })
        );

        let reply = DecodeError::UnexpectedByte('n').to_error_data();
        assert_eq!(
            reply,
            ErrorData::with_data(-32700, "Parse error", json!("Unexpected Byte: \"n\""))
        );

        let reply = DecodeError::UnexpectedEndOfInput.to_error_data();
        assert_eq!(
            reply,
            ErrorData::with_data(-32700, "Parse error", json!("Unexpected End of Input"))
        );

        let reply = DecodeError::UnexpectedSequence("\\x".to_string()).to_error_data();
        assert_eq!(
            reply,
            ErrorData::with_data(-32700, "Parse error", json!("Unexpected Sequence: \"\\x\""))
        );
    }

    #[test]
    fn encodes_canonical_framing() {
        let encoded = encode(&Message::Call(request(1, "ping", None)));
        assert_eq!(
            serde_json::from_str::<Value>(&encoded).unwrap(),
            json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" })
        );

        let encoded = encode(&Message::Response(Response::error(
            None,
            ErrorData::new(-32600, "Invalid Request"),
        )));
        assert_eq!(
            serde_json::from_str::<Value>(&encoded).unwrap(),
            json!({
                "jsonrpc": "2.0",
                "id": null,
                "error": { "code": -32600, "message": "Invalid Request" }
            })
        );

        let encoded = encode(&Message::CallBatch(vec![
            request("a", "sum", Some(json!([1, 2]))),
            notification("log", None),
        ]));
        assert_eq!(
            serde_json::from_str::<Value>(&encoded).unwrap(),
            json!([
                { "jsonrpc": "2.0", "id": "a", "method": "sum", "params": [1, 2] },
                { "jsonrpc": "2.0", "method": "log" }
            ])
        );
    }

    #[test]
    fn round_trips_well_formed_messages() {
        let messages = vec![
            Message::Call(request(7, "add", Some(json!({"a": 1, "b": 2})))),
            Message::Call(request("uuid-ish", "get", None)),
            Message::Call(notification("tick", Some(json!([])))),
            Message::Response(Response::success(Id::Int(7), json!(null))),
            Message::Response(Response::error(
                Some(Id::from("x")),
                ErrorData::with_data(-32601, "Method not found", json!("nope")),
            )),
            Message::Response(Response::error(None, ErrorData::new(-32600, "Invalid Request"))),
            Message::Error(ErrorData::new(-32700, "Parse error")),
            Message::CallBatch(vec![
                request(1, "a", None),
                notification("b", None),
                request(2, "c", Some(json!("payload"))),
            ]),
            Message::ResponseBatch(vec![
                Response::success(Id::Int(1), json!([1, 2, 3])),
                Response::error(Some(Id::Int(2)), ErrorData::new(5, "boom")),
            ]),
        ];
        for message in messages {
            assert_eq!(decode(&encode(&message)), Ok(message));
        }
    }
}
