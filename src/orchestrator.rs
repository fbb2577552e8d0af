//! Chat orchestrator (C8): drives one end-to-end chat turn across the adapter, the stream
//! merger, in-process MCP tool execution, and a tool-result continuation turn.
//!
//! No direct teacher/original_source equivalent exists — `original_source/src/router/
//! request_router.py` is a stub that simulates responses rather than performing a real tool
//! loop. The shape here generalizes the teacher's `agent.rs` tool-call-then-continue pattern
//! (discover tool calls, execute, feed results back, continue) onto the adapters and registry
//! built for this gateway, per `SPEC_FULL.md` §4.8.

use crate::adapter::stream_merger::{parse_arguments, CompletedToolCall, StreamMerger};
use crate::adapter::{AdapterRequest, AdapterResponse, ChatMessage, ProviderAdapter};
use crate::configuration::ConfigurationAuthority;
use crate::mcp::server::McpServer;
use crate::tool::ToolRegistry;
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One chunk of orchestrator output, in the order the client chat transport contract (§6)
/// expects: zero-or-more `Content`, then exactly one of `Complete`/`Error`.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    Content(String),
    ToolInvoked { name: String, result_summary: String },
    Complete,
    Error(String),
}

pub struct ChatOrchestrator {
    pub configuration: Arc<ConfigurationAuthority>,
    pub registry: Arc<ToolRegistry>,
    pub mcp: Arc<McpServer>,
    pub adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
}

impl ChatOrchestrator {
    pub fn new(
        configuration: Arc<ConfigurationAuthority>,
        registry: Arc<ToolRegistry>,
        mcp: Arc<McpServer>,
        adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>>,
    ) -> Self {
        Self { configuration, registry, mcp, adapters }
    }

    /// Run one chat turn for `user_message`, emitting events as the turn progresses (§4.8).
    pub async fn run_turn(&self, user_message: &str) -> Vec<TurnEvent> {
        let (active_provider, model_config) = self.configuration.active_provider_config().await;
        let Some(adapter) = self.adapters.get(active_provider.as_str()) else {
            return vec![TurnEvent::Error(format!("no adapter registered for provider `{}`", active_provider))];
        };

        let tools = self.registry.list().await;
        let mut messages = vec![ChatMessage::user(user_message)];

        let (mut events, assistant_content, completed_calls) = self
            .stream_adapter_turn(adapter.as_ref(), &messages, &model_config, tools.clone())
            .await;

        if completed_calls.is_empty() {
            events.push(TurnEvent::Complete);
            return events;
        }

        let mut assistant_msg = ChatMessage::assistant(assistant_content);
        assistant_msg.tool_calls = completed_calls.clone();
        messages.push(assistant_msg);

        for call in &completed_calls {
            let arguments = parse_arguments(&call.arguments);
            let request = json!({
                "jsonrpc": "2.0",
                "id": uuid::Uuid::new_v4().to_string(),
                "method": "tools/call",
                "params": { "name": call.name, "arguments": arguments },
            });
            let summary = match self.mcp.handle_raw(request).await {
                Some(response) => summarize_tool_result(&response),
                None => "ok".to_string(),
            };
            events.push(TurnEvent::ToolInvoked { name: call.name.clone(), result_summary: summary.clone() });
            messages.push(ChatMessage::tool(call.id.clone(), summary));
        }

        // Continuation turn: tools explicitly disabled to prevent recursive tool loops (§4.8 step 7).
        let (continuation_events, _content, _calls) = self
            .stream_adapter_turn(adapter.as_ref(), &messages, &model_config, vec![])
            .await;
        events.extend(continuation_events);
        events.push(TurnEvent::Complete);
        events
    }

    async fn stream_adapter_turn(
        &self,
        adapter: &dyn ProviderAdapter,
        messages: &[ChatMessage],
        model_config: &crate::configuration::ModelConfig,
        tools: Vec<crate::tool::schema::Tool>,
    ) -> (Vec<TurnEvent>, String, Vec<CompletedToolCall>) {
        let request = AdapterRequest {
            messages: messages.to_vec(),
            system_prompt: Some(model_config.system_prompt.clone()),
            temperature: Some(model_config.temperature),
            max_tokens: model_config.max_tokens,
            tools,
        };

        let mut stream = adapter.chat_completion(request).await;
        let mut events = Vec::new();
        let mut content = String::new();
        let mut merger = StreamMerger::new();
        let mut completed = Vec::new();

        while let Some(response) = stream.next().await {
            match response {
                AdapterResponse::ContentDelta(delta) => {
                    content.push_str(&delta);
                    events.push(TurnEvent::Content(delta));
                }
                AdapterResponse::ToolCallFragments(fragments) => {
                    for fragment in fragments {
                        if let Some(call) = merger.push(fragment) {
                            completed.push(call);
                        }
                    }
                }
                AdapterResponse::Completion { .. } => {
                    completed.extend(merger.finish_turn());
                    break;
                }
                AdapterResponse::Error { message, .. } => {
                    events.push(TurnEvent::Error(message));
                    break;
                }
            }
        }

        (events, content, completed)
    }
}

/// Reduce a `tools/call` JSON-RPC response to the one-line summary fed back to the model as the
/// tool message's content, per §4.8 step 5 — surfaces every `content` item, not just `message`.
fn summarize_tool_result(response: &Value) -> String {
    if let Some(error) = response.get("error") {
        let message = error.get("message").and_then(Value::as_str).unwrap_or("tool execution error");
        return format!("Tool execution failed: {}", message);
    }

    let result = &response["result"];
    let texts: Vec<String> = result["content"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str).map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let summary = if texts.is_empty() { "ok".to_string() } else { texts.join(" ") };

    if result["isError"].as_bool().unwrap_or(false) {
        format!("Tool execution failed: {}", summary)
    } else {
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterStream;
    use crate::config_tools::AiConfigureTool;
    use crate::mcp::NotificationHub;
    use async_stream::stream;
    use async_trait::async_trait;

    struct ScriptedAdapter {
        name: &'static str,
        turn: std::sync::atomic::AtomicU32,
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedAdapter {
        fn provider_name(&self) -> &'static str {
            self.name
        }

        async fn chat_completion(&self, request: AdapterRequest) -> AdapterStream {
            let first_turn = self.turn.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0;
            let has_tools = !request.tools.is_empty();
            Box::pin(stream! {
                if first_turn && has_tools {
                    yield AdapterResponse::ToolCallFragments(vec![crate::adapter::stream_merger::ToolCallFragment {
                        id: Some("call_1".into()),
                        index: None,
                        name: Some("ai_configure".into()),
                        arguments_delta: Some("{\"parameter\":\"temperature\",\"value\":\"0.9\"}".into()),
                        terminal: true,
                    }]);
                    yield AdapterResponse::Completion { finish_reason: "tool_calls".to_string(), usage: None };
                } else {
                    yield AdapterResponse::ContentDelta("temperature is now 0.9".to_string());
                    yield AdapterResponse::Completion { finish_reason: "stop".to_string(), usage: None };
                }
            })
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    async fn build_orchestrator(dir: &tempfile::TempDir) -> ChatOrchestrator {
        let path = dir.path().join("config.yaml");
        let notifications = Arc::new(NotificationHub::new());
        let configuration = Arc::new(
            ConfigurationAuthority::load(path, notifications.clone() as Arc<dyn crate::configuration::ChangeNotifier>)
                .await
                .unwrap(),
        );
        let registry = Arc::new(ToolRegistry::new());
        registry.register(Arc::new(AiConfigureTool::new(configuration.clone()))).await;
        let mcp = Arc::new(McpServer::new(registry.clone(), notifications));

        let mut adapters: HashMap<&'static str, Arc<dyn ProviderAdapter>> = HashMap::new();
        adapters.insert(
            "openai",
            Arc::new(ScriptedAdapter { name: "openai", turn: std::sync::atomic::AtomicU32::new(0) }),
        );

        ChatOrchestrator::new(configuration, registry, mcp, adapters)
    }

    #[tokio::test]
    async fn turn_with_tool_call_executes_tool_then_continues() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = build_orchestrator(&dir).await;

        let events = orchestrator.run_turn("set temperature to 0.9").await;

        let invoked = events.iter().any(|e| matches!(e, TurnEvent::ToolInvoked { name, .. } if name == "ai_configure"));
        assert!(invoked, "expected ai_configure to be invoked: {:?}", events);
        assert!(matches!(events.last(), Some(TurnEvent::Complete)));

        let (_, model) = orchestrator.configuration.active_provider_config().await;
        assert_eq!(model.temperature, 0.9);
    }
}
