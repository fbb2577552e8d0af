//! Gemini `generateContent` adapter. Unlike the teacher's `clients/gemini.rs` (which wraps an
//! OpenAI-compatible endpoint), this speaks Gemini's real `contents`/`systemInstruction`/
//! `generationConfig` wire shape — confirmed genuine via that same teacher file's
//! `ImageGenerationClient::generate_image`, which already uses this shape for images. Each
//! streamed Gemini chunk is a complete JSON object (no field is ever split across chunks), so
//! every fragment here is self-terminal per `SPEC_FULL.md` §4.2.

use crate::adapter::stream_merger::ToolCallFragment;
use crate::adapter::{AdapterRequest, AdapterResponse, AdapterStream, ChatMessage, ProviderAdapter, Role, Usage};
use crate::error::AdapterErrorKind;
use crate::tool::schema;
use async_stream::stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};

pub struct GeminiAdapter {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiAdapter {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &AdapterRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(message_to_content)
            .collect();

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(t));
        }
        if let Some(mt) = request.max_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(mt));
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": Value::Object(generation_config),
        });
        if let Some(system) = &request.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        if !request.tools.is_empty() {
            body["tools"] = json!([schema::to_gemini(&request.tools)]);
        }
        body
    }
}

fn message_to_content(m: &ChatMessage) -> Value {
    let role = match m.role {
        Role::User | Role::Tool => "user",
        _ => "model",
    };
    if m.role == Role::Tool {
        return json!({
            "role": "function",
            "parts": [{ "functionResponse": { "name": m.tool_call_id, "response": { "content": m.content } } }],
        });
    }
    if !m.tool_calls.is_empty() {
        let parts: Vec<Value> = m
            .tool_calls
            .iter()
            .map(|c| {
                json!({ "functionCall": { "name": c.name, "args": crate::adapter::stream_merger::parse_arguments(&c.arguments) } })
            })
            .collect();
        return json!({ "role": "model", "parts": parts });
    }
    json!({ "role": role, "parts": [{ "text": m.content }] })
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn provider_name(&self) -> &'static str {
        "gemini"
    }

    async fn chat_completion(&self, request: AdapterRequest) -> AdapterStream {
        let body = self.build_body(&request);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.model, self.api_key
        );
        let client = self.client.clone();

        Box::pin(stream! {
            let resp = client.post(&url).json(&body).send().await;
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

            let mut byte_stream = resp.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let Ok(chunk) = chunk else { break };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else { continue };
                    let Ok(parsed) = serde_json::from_str::<Value>(data) else { continue };
                    let candidate = &parsed["candidates"][0];
                    if let Some(parts) = candidate["content"]["parts"].as_array() {
                        for part in parts {
                            if let Some(text) = part["text"].as_str() {
                                if !text.is_empty() {
                                    yield AdapterResponse::ContentDelta(text.to_string());
                                }
                            }
                            if let Some(call) = part.get("functionCall") {
                                yield AdapterResponse::ToolCallFragments(vec![ToolCallFragment {
                                    id: None,
                                    index: Some(0),
                                    name: call["name"].as_str().map(String::from),
                                    arguments_delta: Some(call["args"].to_string()),
                                    terminal: true,
                                }]);
                            }
                        }
                    }
                    if let Some(reason) = candidate["finishReason"].as_str() {
                        let usage = parsed.get("usageMetadata").map(|u| Usage {
                            input_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
                            output_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
                        });
                        yield AdapterResponse::Completion { finish_reason: reason.to_lowercase(), usage };
                        return;
                    }
                }
            }
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = json!({ "contents": [{ "role": "user", "parts": [{ "text": "ping" }] }] });
        self.client
            .post(&url)
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
    fn build_body_routes_system_prompt_to_system_instruction() {
        let adapter = GeminiAdapter::new("key".into(), "gemini-1.5-flash".into());
        let request = AdapterRequest {
            messages: vec![ChatMessage::user("hi")],
            system_prompt: Some("be nice".into()),
            temperature: Some(0.3),
            max_tokens: None,
            tools: vec![],
        };
        let body = adapter.build_body(&request);
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be nice");
        assert!(body["contents"].as_array().unwrap().iter().all(|c| c["role"] != "system"));
        assert_eq!(body["generationConfig"]["temperature"], 0.3);
    }

    #[test]
    fn tools_wrapped_in_function_declarations_array() {
        let adapter = GeminiAdapter::new("key".into(), "gemini-1.5-flash".into());
        let tool = schema::Tool::new("ping", "no-op", vec![]);
        let request = AdapterRequest {
            messages: vec![ChatMessage::user("hi")],
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            tools: vec![tool],
        };
        let body = adapter.build_body(&request);
        assert!(body["tools"][0]["functionDeclarations"].is_array());
    }
}
