//! Anthropic Messages API adapter. Grounded on
//! `original_source/src/adapters/anthropic_adapter.py`: the system prompt travels in a distinct
//! top-level `system` field (not a `messages` entry); `content_block_start` of type `tool_use`
//! starts a call; `content_block_delta` of type `input_json_delta` accumulates arguments, of
//! type `text_delta` yields content; the stream's `message_stop` event is the completion signal.

use crate::adapter::stream_merger::{StreamMerger, ToolCallFragment};
use crate::adapter::{AdapterRequest, AdapterResponse, AdapterStream, ChatMessage, ProviderAdapter, Role, Usage};
use crate::error::AdapterErrorKind;
use crate::tool::schema;
use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

pub struct AnthropicAdapter {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &AdapterRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(message_to_json)
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
            "stream": true,
        });
        if let Some(system) = &request.system_prompt {
            body["system"] = json!(system);
        }
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if !request.tools.is_empty() {
            body["tools"] = schema::to_anthropic(&request.tools);
        }
        body
    }
}

fn message_to_json(m: &ChatMessage) -> Value {
    match m.role {
        Role::Tool => json!({
            "role": "user",
            "content": [{
                "type": "tool_result",
                "tool_use_id": m.tool_call_id,
                "content": m.content,
            }]
        }),
        Role::Assistant if !m.tool_calls.is_empty() => {
            let mut content = Vec::new();
            if !m.content.is_empty() {
                content.push(json!({ "type": "text", "text": m.content }));
            }
            for call in &m.tool_calls {
                content.push(json!({
                    "type": "tool_use",
                    "id": call.id,
                    "name": call.name,
                    "input": crate::adapter::stream_merger::parse_arguments(&call.arguments),
                }));
            }
            json!({ "role": "assistant", "content": content })
        }
        _ => json!({ "role": if m.role == Role::User { "user" } else { "assistant" }, "content": m.content }),
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    async fn chat_completion(&self, request: AdapterRequest) -> AdapterStream {
        let body = self.build_body(&request);
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        Box::pin(stream! {
            let resp = client
                .post("https://api.anthropic.com/v1/messages")
                .header("x-api-key", &api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&body)
                .send()
                .await;

            let resp = match resp {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    let kind = match r.status().as_u16() {
                        429 => AdapterErrorKind::RateLimit,
                        _ => AdapterErrorKind::ApiError(format!("http {}", r.status())),
                    };
                    yield AdapterResponse::Error { kind, message: "upstream returned an error status".to_string() };
                    return;
                }
                Err(e) if e.is_timeout() => {
                    yield AdapterResponse::Error { kind: AdapterErrorKind::Timeout, message: e.to_string() };
                    return;
                }
                Err(e) => {
                    yield AdapterResponse::Error { kind: AdapterErrorKind::ApiError(e.to_string()), message: e.to_string() };
                    return;
                }
            };

            let mut merger = StreamMerger::new();
            let mut byte_stream = resp.bytes_stream();
            let mut buffer = String::new();
            let mut active_tool_use_id: Option<String> = None;

            while let Some(chunk) = byte_stream.next().await {
                let Ok(chunk) = chunk else { break };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    let Ok(event) = serde_json::from_str::<Value>(data) else { continue };
                    match event["type"].as_str().unwrap_or_default() {
                        "content_block_start" => {
                            if event["content_block"]["type"] == "tool_use" {
                                let id = event["content_block"]["id"].as_str().unwrap_or_default().to_string();
                                active_tool_use_id = Some(id.clone());
                                merger.push(ToolCallFragment {
                                    id: Some(id),
                                    name: event["content_block"]["name"].as_str().map(String::from),
                                    arguments_delta: Some(String::new()),
                                    terminal: false,
                                    index: None,
                                });
                            }
                        }
                        "content_block_delta" => {
                            match event["delta"]["type"].as_str().unwrap_or_default() {
                                "text_delta" => {
                                    if let Some(text) = event["delta"]["text"].as_str() {
                                        yield AdapterResponse::ContentDelta(text.to_string());
                                    }
                                }
                                "input_json_delta" => {
                                    if let Some(partial) = event["delta"]["partial_json"].as_str() {
                                        merger.push(ToolCallFragment {
                                            id: active_tool_use_id.clone(),
                                            arguments_delta: Some(partial.to_string()),
                                            terminal: false,
                                            name: None,
                                            index: None,
                                        });
                                    }
                                }
                                _ => {}
                            }
                        }
                        "content_block_stop" => {
                            if let Some(id) = active_tool_use_id.take() {
                                if let Some(call) = merger.push(ToolCallFragment {
                                    id: Some(id),
                                    terminal: true,
                                    name: None,
                                    arguments_delta: None,
                                    index: None,
                                }) {
                                    yield AdapterResponse::ToolCallFragments(vec![ToolCallFragment {
                                        id: Some(call.id),
                                        name: Some(call.name),
                                        arguments_delta: Some(call.arguments),
                                        terminal: true,
                                        index: None,
                                    }]);
                                }
                            }
                        }
                        "message_delta" => {
                            if let Some(usage) = event.get("usage") {
                                let _ = usage;
                            }
                        }
                        "message_stop" => {
                            yield AdapterResponse::Completion { finish_reason: "stop".to_string(), usage: None };
                            return;
                        }
                        _ => {}
                    }
                }
            }
        })
    }

    async fn health_check(&self) -> bool {
        let body = json!({
            "model": self.model,
            "max_tokens": 1,
            "messages": [{ "role": "user", "content": "ping" }],
        });
        self.client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterRequest;

    #[test]
    fn build_body_routes_system_prompt_to_distinct_field() {
        let adapter = AnthropicAdapter::new("key".into(), "claude-3-5-sonnet-20241022".into());
        let request = AdapterRequest {
            messages: vec![ChatMessage::user("hi")],
            system_prompt: Some("be nice".into()),
            temperature: None,
            max_tokens: None,
            tools: vec![],
        };
        let body = adapter.build_body(&request);
        assert_eq!(body["system"], "be nice");
        assert!(body["messages"].as_array().unwrap().iter().all(|m| m["role"] != "system"));
    }

    #[test]
    fn tool_use_translation_uses_input_schema_key() {
        let adapter = AnthropicAdapter::new("key".into(), "claude-3-5-sonnet-20241022".into());
        let tool = schema::Tool::new("ping", "no-op", vec![]);
        let request = AdapterRequest {
            messages: vec![ChatMessage::user("hi")],
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            tools: vec![tool],
        };
        let body = adapter.build_body(&request);
        assert!(body["tools"][0]["input_schema"].is_object());
    }
}
