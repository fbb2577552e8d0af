//! OpenAI-compatible chat-completions adapter, also used for OpenRouter (same wire format,
//! different base URL and API key). Grounded on `original_source/src/adapters/openai_adapter.py`:
//! content deltas forwarded immediately, tool-call fragments accumulated by `id` (continuation
//! deltas carry `id: null`), completion triggered by a non-null `choice.finish_reason`.

use crate::adapter::stream_merger::{StreamMerger, ToolCallFragment};
use crate::adapter::{AdapterRequest, AdapterResponse, AdapterStream, ChatMessage, ProviderAdapter, Role, Usage};
use crate::error::AdapterErrorKind;
use crate::tool::schema;
use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

pub struct OpenAiCompatibleAdapter {
    provider_name: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleAdapter {
    pub fn openai(api_key: String, model: String) -> Self {
        Self {
            provider_name: "openai",
            base_url: "https://api.openai.com/v1".to_string(),
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn openrouter(api_key: String, model: String) -> Self {
        Self {
            provider_name: "openrouter",
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &AdapterRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        for m in &request.messages {
            messages.push(message_to_json(m));
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(mt) = request.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if !request.tools.is_empty() {
            body["tools"] = schema::to_openai(&request.tools);
            body["tool_choice"] = json!("auto");
        }
        body
    }
}

fn message_to_json(m: &ChatMessage) -> Value {
    let role = match m.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };
    let mut obj = json!({ "role": role, "content": m.content });
    if let Some(id) = &m.tool_call_id {
        obj["tool_call_id"] = json!(id);
    }
    if !m.tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(
            m.tool_calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments },
                    })
                })
                .collect(),
        );
    }
    obj
}

#[async_trait]
impl ProviderAdapter for OpenAiCompatibleAdapter {
    fn provider_name(&self) -> &'static str {
        self.provider_name
    }

    async fn chat_completion(&self, request: AdapterRequest) -> AdapterStream {
        let body = self.build_body(&request);
        let url = format!("{}/chat/completions", self.base_url);
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        Box::pin(stream! {
            let resp = client
                .post(&url)
                .bearer_auth(&api_key)
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

            while let Some(chunk) = byte_stream.next().await {
                let Ok(chunk) = chunk else { break };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    if data == "[DONE]" {
                        let completed = merger.finish_turn();
                        if !completed.is_empty() {
                            yield AdapterResponse::ToolCallFragments(
                                completed.into_iter().map(|c| ToolCallFragment {
                                    id: Some(c.id),
                                    name: Some(c.name),
                                    arguments_delta: Some(c.arguments),
                                    terminal: true,
                                    index: None,
                                }).collect()
                            );
                        }
                        yield AdapterResponse::Completion { finish_reason: "stop".to_string(), usage: None };
                        return;
                    }
                    let Ok(parsed) = serde_json::from_str::<Value>(data) else { continue };
                    let choice = &parsed["choices"][0];
                    if let Some(content) = choice["delta"]["content"].as_str() {
                        if !content.is_empty() {
                            yield AdapterResponse::ContentDelta(content.to_string());
                        }
                    }
                    if let Some(tool_calls) = choice["delta"]["tool_calls"].as_array() {
                        for tc in tool_calls {
                            merger.push(ToolCallFragment {
                                id: tc["id"].as_str().map(String::from),
                                index: tc["index"].as_u64().map(|n| n as u32),
                                name: tc["function"]["name"].as_str().map(String::from),
                                arguments_delta: tc["function"]["arguments"].as_str().map(String::from),
                                terminal: false,
                            });
                        }
                    }
                    if let Some(reason) = choice["finish_reason"].as_str() {
                        let completed = merger.finish_turn();
                        if !completed.is_empty() {
                            yield AdapterResponse::ToolCallFragments(
                                completed.into_iter().map(|c| ToolCallFragment {
                                    id: Some(c.id),
                                    name: Some(c.name),
                                    arguments_delta: Some(c.arguments),
                                    terminal: true,
                                    index: None,
                                }).collect()
                            );
                        }
                        let usage = parsed.get("usage").map(|u| Usage {
                            input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
                            output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
                        });
                        yield AdapterResponse::Completion { finish_reason: reason.to_string(), usage };
                        return;
                    }
                }
            }
        })
    }

    async fn health_check(&self) -> bool {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "ping" }],
            "max_tokens": 1,
        });
        self.client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
    fn build_body_attaches_tools_and_tool_choice() {
        let adapter = OpenAiCompatibleAdapter::openai("key".into(), "gpt-4o-mini".into());
        let tool = schema::Tool::new("ping", "no-op", vec![]);
        let request = AdapterRequest {
            messages: vec![ChatMessage::user("hi")],
            system_prompt: Some("be nice".into()),
            temperature: Some(0.5),
            max_tokens: Some(100),
            tools: vec![tool],
        };
        let body = adapter.build_body(&request);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["temperature"], 0.5);
    }
}
