//! JSON-RPC 2.0 framing and MCP 2025-06-18 constants (C7).
//!
//! Grounded on `original_source/src/mcp/jsonrpc.py`: the four message shapes, the standard and
//! MCP-specific error codes, the method name constants, and the `JSONRPCHandler` static
//! constructors (reproduced here as free functions, the Rust idiom for a stateless helper
//! struct).

use crate::error::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2025-06-18";

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const CANCELLED: &str = "notifications/cancelled";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub error: JsonRpcErrorObject,
}

/// One JSON-RPC request/notification as parsed from an incoming message.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// One outgoing message; notifications never produce a `Response` variant.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OutgoingMessage {
    Response(JsonRpcResponse),
    Error(JsonRpcErrorResponse),
}

pub fn make_response(id: Value, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id,
        result,
    }
}

pub fn make_error(id: Value, error: &RpcError, data: Option<Value>) -> JsonRpcErrorResponse {
    JsonRpcErrorResponse {
        jsonrpc: "2.0".to_string(),
        id,
        error: JsonRpcErrorObject {
            code: error.code(),
            message: error.to_string(),
            data,
        },
    }
}

pub fn make_notification(method: &str, params: Value) -> JsonRpcNotification {
    JsonRpcNotification {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params: Some(params),
    }
}

/// Parse one raw JSON value into a request or notification. A message with an `id` is a
/// request; one without is a notification — matching the reference `JSONRPCHandler.parse_message`.
pub fn parse_message(value: Value) -> Result<IncomingMessage, RpcError> {
    let obj = value.as_object().ok_or(RpcError::InvalidRequest)?;
    if obj.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(RpcError::InvalidRequest);
    }
    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .ok_or(RpcError::InvalidRequest)?
        .to_string();
    let params = obj.get("params").cloned();

    if let Some(id) = obj.get("id") {
        Ok(IncomingMessage::Request(JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: id.clone(),
            method,
            params,
        }))
    } else {
        Ok(IncomingMessage::Notification(JsonRpcNotification {
            jsonrpc: "2.0".to_string(),
            method,
            params,
        }))
    }
}

pub fn is_batch(value: &Value) -> bool {
    value.is_array()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_with_id_parses_as_request() {
        let msg = parse_message(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" })).unwrap();
        assert!(matches!(msg, IncomingMessage::Request(_)));
    }

    #[test]
    fn message_without_id_parses_as_notification() {
        let msg = parse_message(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })).unwrap();
        assert!(matches!(msg, IncomingMessage::Notification(_)));
    }

    #[test]
    fn wrong_version_is_invalid_request() {
        let err = parse_message(json!({ "jsonrpc": "1.0", "id": 1, "method": "ping" })).unwrap_err();
        assert!(matches!(err, RpcError::InvalidRequest));
    }

    #[test]
    fn error_code_matches_mcp_taxonomy() {
        let err = make_error(json!(1), &RpcError::ToolNotFound("x".into()), None);
        assert_eq!(err.error.code, -32001);
    }
}
