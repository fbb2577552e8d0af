//! MCP 2025 JSON-RPC server (C7): method dispatch, pagination, capability handshake, and
//! `tools/call` result shaping.
//!
//! Grounded on `original_source/src/mcp/mcp2025_server.py`: the dispatch table, the cursor-based
//! pagination (`start` index embedded in the cursor string, page size 50), the
//! `_convert_tool_parameters_to_schema`-derived `tools/list` entries, and the `tools/call`
//! content-array construction (`message`/`data`/`image`/`audio`/`resource`/`resource_link`
//! branches, `isError` as a result-level flag rather than a JSON-RPC error).

use crate::error::{RpcError, ToolError};
use crate::mcp::jsonrpc::{self, methods, IncomingMessage, OutgoingMessage};
use crate::mcp::notifications::NotificationHub;
use crate::tool::ToolRegistry;
use serde_json::{json, Value};
use std::sync::Arc;

const PAGE_SIZE: usize = 50;

pub struct McpServer {
    pub registry: Arc<ToolRegistry>,
    pub notifications: Arc<NotificationHub>,
}

impl McpServer {
    pub fn new(registry: Arc<ToolRegistry>, notifications: Arc<NotificationHub>) -> Self {
        Self { registry, notifications }
    }

    /// Process one raw JSON body — a single message or a batch array — and return the response
    /// body to send back (`None` when every element was a notification).
    pub async fn handle_raw(&self, body: Value) -> Option<Value> {
        if jsonrpc::is_batch(&body) {
            let items = body.as_array().cloned().unwrap_or_default();
            let mut responses = Vec::new();
            for item in items {
                if let Some(out) = self.handle_one(item).await {
                    responses.push(out);
                }
            }
            if responses.is_empty() {
                None
            } else {
                Some(Value::Array(responses))
            }
        } else {
            self.handle_one(body).await
        }
    }

    async fn handle_one(&self, value: Value) -> Option<Value> {
        let parsed = match jsonrpc::parse_message(value) {
            Ok(m) => m,
            Err(_) => {
                let err = jsonrpc::make_error(Value::Null, &RpcError::ParseError, None);
                return Some(serde_json::to_value(OutgoingMessage::Error(err)).unwrap());
            }
        };

        match parsed {
            IncomingMessage::Notification(n) => {
                self.handle_notification(&n.method, n.params);
                None
            }
            IncomingMessage::Request(r) => {
                let id = r.id.clone();
                let result = self.dispatch(&r.method, r.params).await;
                let out = match result {
                    Ok(value) => OutgoingMessage::Response(jsonrpc::make_response(id, value)),
                    Err(e) => OutgoingMessage::Error(jsonrpc::make_error(id, &e, None)),
                };
                Some(serde_json::to_value(out).unwrap())
            }
        }
    }

    fn handle_notification(&self, method: &str, _params: Option<Value>) {
        match method {
            methods::INITIALIZED => log::info!("client signaled initialized"),
            methods::CANCELLED => log::info!("client cancelled a request"),
            other => log::debug!("ignoring unknown notification method={}", other),
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            methods::INITIALIZE => Ok(self.handle_initialize(params)),
            methods::PING => Ok(json!({
                "timestamp": chrono::Utc::now().timestamp(),
                "server": "aigateway",
            })),
            methods::TOOLS_LIST => self.handle_tools_list(params).await,
            methods::TOOLS_CALL => self.handle_tools_call(params).await,
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Value {
        if let Some(p) = &params {
            if p["protocolVersion"].as_str() != Some(jsonrpc::PROTOCOL_VERSION) {
                log::warn!(
                    "client requested protocolVersion={:?}, server speaks {}",
                    p["protocolVersion"],
                    jsonrpc::PROTOCOL_VERSION
                );
            }
        }
        json!({
            "protocolVersion": jsonrpc::PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": true },
                "logging": {},
            },
            "serverInfo": { "name": "aigateway", "version": env!("CARGO_PKG_VERSION") },
        })
    }

    async fn handle_tools_list(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let cursor = params.as_ref().and_then(|p| p["cursor"].as_str()).map(str::to_string);
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| RpcError::InvalidParams("Invalid cursor format".to_string()))?,
            None => 0,
        };

        let all = self.registry.list().await;
        let end = (start + PAGE_SIZE).min(all.len());
        let page = if start >= all.len() { Vec::new() } else { all[start..end].to_vec() };

        let tools: Vec<Value> = page
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "inputSchema": t.input_schema(),
                    "category": t.category,
                    "version": t.version,
                })
            })
            .collect();

        let next_cursor = if end < all.len() { Some(end.to_string()) } else { None };
        Ok(json!({ "tools": tools, "nextCursor": next_cursor }))
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params = params.ok_or_else(|| RpcError::InvalidParams("missing params".to_string()))?;
        let name = params["name"]
            .as_str()
            .ok_or_else(|| RpcError::InvalidParams("missing name".to_string()))?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        let execution = self.registry.execute(name, arguments).await.map_err(|e| match e {
            ToolError::NotFound(_) => RpcError::ToolNotFound(e.to_string()),
            ToolError::MissingRequired(_)
            | ToolError::UnknownParameter(_)
            | ToolError::TypeMismatch { .. }
            | ToolError::NotInEnum { .. }
            | ToolError::OutOfRange { .. } => RpcError::InvalidParams(e.to_string()),
            ToolError::HandlerFailed(_) => RpcError::Internal(e.to_string()),
        })?;

        if execution.success {
            let content = build_content(&execution.result.unwrap_or(Value::Null));
            Ok(json!({ "content": content.items, "isError": false, "structuredContent": content.structured }))
        } else {
            let message = execution.error.unwrap_or_else(|| "unknown error".to_string());
            Ok(json!({ "content": [{ "type": "text", "text": message }], "isError": true }))
        }
    }
}

struct ContentBuild {
    items: Vec<Value>,
    structured: Value,
}

/// Map a tool handler's result document onto the MCP multi-type content array, per §4.7.1.
fn build_content(result: &Value) -> ContentBuild {
    let mut items = Vec::new();
    let mut structured = Value::Null;

    if let Some(message) = result.get("message").and_then(Value::as_str) {
        items.push(json!({ "type": "text", "text": message }));
    }
    if let Some(data) = result.get("data") {
        match data {
            Value::String(s) => items.push(json!({ "type": "text", "text": s })),
            Value::Object(_) | Value::Array(_) => {
                items.push(json!({ "type": "text", "text": data.to_string() }));
                structured = data.clone();
            }
            other => items.push(json!({ "type": "text", "text": other.to_string() })),
        }
    }
    if let Some(image) = result.get("image") {
        items.push(json!({
            "type": "image",
            "data": image["data"],
            "mimeType": image.get("mimeType").cloned().unwrap_or(json!("image/png")),
        }));
    }
    if let Some(audio) = result.get("audio") {
        items.push(json!({
            "type": "audio",
            "data": audio["data"],
            "mimeType": audio.get("mimeType").cloned().unwrap_or(json!("audio/wav")),
        }));
    }
    if let Some(resource) = result.get("resource") {
        items.push(json!({ "type": "resource", "resource": resource }));
    }
    if let Some(link) = result.get("resource_link") {
        items.push(json!({
            "type": "resource_link",
            "uri": link["uri"],
            "name": link.get("name"),
            "description": link.get("description"),
            "mimeType": link.get("mimeType"),
        }));
    }

    if items.is_empty() {
        // No recognized field in the result document; surface it verbatim as text so nothing
        // silently disappears.
        items.push(json!({ "type": "text", "text": result.to_string() }));
    }

    ContentBuild { items, structured }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::ToolHandler;
    use async_trait::async_trait;
    use crate::error::ToolError;
    use crate::tool::schema::Tool;

    struct PingTool;

    #[async_trait]
    impl ToolHandler for PingTool {
        fn definition(&self) -> Tool {
            Tool::new("ping", "no-op", vec![])
        }
        async fn execute(&self, _arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({ "message": "pong" }))
        }
    }

    fn make_server() -> McpServer {
        let registry = Arc::new(ToolRegistry::new());
        McpServer::new(registry, Arc::new(NotificationHub::new()))
    }

    #[tokio::test]
    async fn initialize_reports_protocol_version_and_capabilities() {
        let server = make_server();
        let out = server
            .handle_raw(json!({
                "jsonrpc": "2.0", "id": 1, "method": "initialize",
                "params": { "protocolVersion": "2025-06-18", "capabilities": {}, "clientInfo": { "name": "t", "version": "0" } }
            }))
            .await
            .unwrap();
        assert_eq!(out["result"]["protocolVersion"], "2025-06-18");
        assert_eq!(out["result"]["capabilities"]["tools"]["listChanged"], true);
    }

    #[tokio::test]
    async fn tools_list_and_call_round_trip() {
        let server = make_server();
        server.registry.register(Arc::new(PingTool)).await;

        let list = server
            .handle_raw(json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" }))
            .await
            .unwrap();
        let tools = list["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert!(list["result"]["nextCursor"].is_null());

        let call = server
            .handle_raw(json!({ "jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": { "name": "ping", "arguments": {} } }))
            .await
            .unwrap();
        assert_eq!(call["result"]["isError"], false);
        assert_eq!(call["result"]["content"][0]["text"], "pong");
    }

    #[tokio::test]
    async fn invalid_cursor_is_invalid_params() {
        let server = make_server();
        let out = server
            .handle_raw(json!({ "jsonrpc": "2.0", "id": 4, "method": "tools/list", "params": { "cursor": "not-a-number" } }))
            .await
            .unwrap();
        assert_eq!(out["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let server = make_server();
        let out = server
            .handle_raw(json!({ "jsonrpc": "2.0", "id": 5, "method": "bogus" }))
            .await
            .unwrap();
        assert_eq!(out["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let server = make_server();
        let out = server
            .handle_raw(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await;
        assert!(out.is_none());
    }

    #[tokio::test]
    async fn batch_elides_notification_responses() {
        let server = make_server();
        server.registry.register(Arc::new(PingTool)).await;
        let out = server
            .handle_raw(json!([
                { "jsonrpc": "2.0", "id": 1, "method": "ping" },
                { "jsonrpc": "2.0", "method": "notifications/initialized" },
            ]))
            .await
            .unwrap();
        assert_eq!(out.as_array().unwrap().len(), 1);
    }
}
