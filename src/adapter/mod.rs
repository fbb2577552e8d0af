//! Provider adapter set (C3): a uniform streaming interface over four heterogeneous upstream
//! APIs, plus the stream merger (C2) shared by all of them.
//!
//! The redesigned tagged-enum `AdapterResponse` replaces the reference `adapters/base.py`'s flat
//! `AdapterResponse(content, finish_reason, metadata, tool_calls)` struct per `SPEC_FULL.md` §9 —
//! deliberately not copying that shape.

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod stream_merger;

use crate::error::AdapterErrorKind;
use crate::tool::schema::Tool;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One message in a provider-agnostic chat transcript.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Set only on `role: Tool` messages, correlating to a prior assistant tool call.
    pub tool_call_id: Option<String>,
    /// Set only on `role: Assistant` messages that requested tool calls.
    pub tool_calls: Vec<crate::adapter::stream_merger::CompletedToolCall>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into(), tool_call_id: None, tool_calls: vec![] }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), tool_call_id: None, tool_calls: vec![] }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into(), tool_call_id: None, tool_calls: vec![] }
    }
    pub fn tool(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_call_id: Some(call_id.into()),
            tool_calls: vec![],
        }
    }
}

/// A request to a provider adapter (§3 `AdapterRequest`).
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub tools: Vec<Tool>,
}

/// One streamed element of an adapter's response (§3 `AdapterResponse`, redesigned as a tagged
/// enum per §9).
#[derive(Debug, Clone)]
pub enum AdapterResponse {
    ContentDelta(String),
    ToolCallFragments(Vec<stream_merger::ToolCallFragment>),
    Completion { finish_reason: String, usage: Option<Usage> },
    Error { kind: AdapterErrorKind, message: String },
}

#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

pub type AdapterStream = BoxStream<'static, AdapterResponse>;

/// Implemented by each of the four provider adapters.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn provider_name(&self) -> &'static str;
    fn supports_function_calling(&self) -> bool {
        true
    }
    fn supports_streaming(&self) -> bool {
        true
    }
    async fn chat_completion(&self, request: AdapterRequest) -> AdapterStream;
    async fn health_check(&self) -> bool;
}
