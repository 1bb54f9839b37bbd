//! JSON-RPC style request parsing and reply bodies.
//!
//! Command frames carry a JSON object with a `method` string and an optional
//! `params` object. Replies are `{"result": ...}` on success or
//! `{"error": {"code": ..., "message": ...}}` on failure, using the standard
//! JSON-RPC error codes.

use serde::Serialize;
use serde_json::{json, Value};

/// Invalid JSON was received.
pub const PARSE_ERROR: i32 = -32700;
/// The JSON is not a valid request object.
pub const INVALID_REQUEST: i32 = -32600;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i32 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i32 = -32602;
/// Internal error while executing the method.
pub const INTERNAL_ERROR: i32 = -32603;

/// A structured command error, serialized into the reply body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RpcError {
    /// JSON-RPC error code.
    pub code: i32,
    /// Human-readable message.
    pub message: String,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A parsed command request.
#[derive(Debug)]
pub struct Request {
    /// Method name, possibly empty.
    pub method: String,
    /// The `params` value, if present.
    pub params: Option<Value>,
}

/// Parse a command body into a request.
///
/// Malformed JSON and JSON without a string `method` member are reported as
/// distinct errors so the peer can tell a framing problem from a protocol
/// one.
pub fn parse_request(body: &str) -> Result<Request, RpcError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| RpcError::new(PARSE_ERROR, "Message not proper JSON"))?;

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::new(INVALID_REQUEST, "Missing 'method'"))?
        .to_string();

    let params = value.get("params").cloned();

    Ok(Request { method, params })
}

/// Build a success reply body. A handler with no payload reports `0`.
pub fn success_body(result: Option<Value>) -> String {
    json!({ "result": result.unwrap_or(json!(0)) }).to_string()
}

/// Build an error reply body.
pub fn error_body(error: &RpcError) -> String {
    json!({ "error": error }).to_string()
}
