//! Stream merger (C2): reassembles provider-streamed tool-call fragments into completed calls.
//!
//! Grounded on `original_source/src/adapters/openai_adapter.py` (fragments keyed by `id`, with
//! continuation deltas dropping the id — the accumulator must keep appending to the single
//! in-progress entry in that case) and `original_source/src/adapters/anthropic_adapter.py`
//! (`content_block_start`/`message_stop` as explicit start/terminal markers). Gemini fragments
//! are always self-complete (§4.2).

use serde_json::Value;
use std::collections::BTreeMap;

/// One incremental fragment of a tool call as emitted by a provider stream.
#[derive(Debug, Clone, Default)]
pub struct ToolCallFragment {
    pub id: Option<String>,
    pub index: Option<u32>,
    pub name: Option<String>,
    pub arguments_delta: Option<String>,
    /// True when the provider marks this fragment as the final one for its call (Anthropic,
    /// Gemini). OpenAI/OpenRouter signal completion at the stream level instead — see
    /// [`StreamMerger::finish_turn`].
    pub terminal: bool,
}

#[derive(Debug, Clone)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Default)]
struct ScratchEntry {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Per-turn accumulator. One instance is used for the lifetime of a single chat-completion
/// stream and then discarded.
#[derive(Default)]
pub struct StreamMerger {
    scratch: BTreeMap<String, ScratchEntry>,
    order: Vec<String>,
    last_key: Option<String>,
    next_synthetic: u32,
}

impl StreamMerger {
    pub fn new() -> Self {
        Self::default()
    }

    fn key_for(&mut self, fragment: &ToolCallFragment) -> String {
        if let Some(id) = &fragment.id {
            return id.clone();
        }
        if let Some(index) = fragment.index {
            return format!("idx_{}", index);
        }
        if let Some(key) = &self.last_key {
            if self.scratch.contains_key(key) {
                return key.clone();
            }
        }
        let key = format!("tool_call_{}", self.next_synthetic);
        self.next_synthetic += 1;
        key
    }

    /// Feed one fragment. Returns a [`CompletedToolCall`] immediately if this fragment carries
    /// its own terminal marker (Anthropic, Gemini); otherwise accumulates silently.
    pub fn push(&mut self, fragment: ToolCallFragment) -> Option<CompletedToolCall> {
        let key = self.key_for(&fragment);
        self.last_key = Some(key.clone());
        if !self.scratch.contains_key(&key) {
            self.order.push(key.clone());
        }
        let entry = self.scratch.entry(key.clone()).or_default();
        if let Some(id) = fragment.id {
            entry.id = Some(id);
        }
        if let Some(name) = fragment.name {
            entry.name = Some(name);
        }
        if let Some(delta) = fragment.arguments_delta {
            entry.arguments.push_str(&delta);
        }

        if fragment.terminal {
            self.finalize_one(&key)
        } else {
            None
        }
    }

    fn finalize_one(&mut self, key: &str) -> Option<CompletedToolCall> {
        let entry = self.scratch.remove(key)?;
        self.order.retain(|k| k != key);
        Some(CompletedToolCall {
            id: entry.id.unwrap_or_else(|| key.to_string()),
            name: entry.name.unwrap_or_else(|| "unknown_function".to_string()),
            arguments: entry.arguments,
        })
    }

    /// Finalize every remaining in-progress call. Call this on a non-null stream-level
    /// `finish_reason` (OpenAI/OpenRouter) or at stream end. Once called, this merger must not
    /// be fed further fragments for the same turn (§9 Open Question 2).
    pub fn finish_turn(&mut self) -> Vec<CompletedToolCall> {
        let keys = self.order.clone();
        let mut out = Vec::new();
        for key in keys {
            if let Some(call) = self.finalize_one(&key) {
                out.push(call);
            }
        }
        out
    }
}

/// Parse a JSON string of tool arguments; unparseable strings are wrapped per §4.8's policy.
pub fn parse_arguments(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::json!({ "request": raw }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_style_fragments_drop_id_on_continuation() {
        let mut merger = StreamMerger::new();
        merger.push(ToolCallFragment {
            id: Some("call_1".into()),
            name: Some("ai_configure".into()),
            arguments_delta: Some("{\"para".into()),
            ..Default::default()
        });
        merger.push(ToolCallFragment {
            arguments_delta: Some("meter\":\"x\"}".into()),
            ..Default::default()
        });
        let completed = merger.finish_turn();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "call_1");
        assert_eq!(completed[0].arguments, "{\"parameter\":\"x\"}");
    }

    #[test]
    fn anthropic_style_terminal_flag_completes_immediately() {
        let mut merger = StreamMerger::new();
        merger.push(ToolCallFragment {
            id: Some("toolu_1".into()),
            name: Some("ai_configure".into()),
            arguments_delta: Some("{}".into()),
            ..Default::default()
        });
        let done = merger.push(ToolCallFragment {
            id: Some("toolu_1".into()),
            terminal: true,
            ..Default::default()
        });
        assert!(done.is_some());
        assert_eq!(merger.finish_turn().len(), 0);
    }

    #[test]
    fn gemini_style_fragment_is_self_complete() {
        let mut merger = StreamMerger::new();
        let done = merger.push(ToolCallFragment {
            index: Some(0),
            name: Some("ai_configure".into()),
            arguments_delta: Some("{\"x\":1}".into()),
            terminal: true,
            ..Default::default()
        });
        assert!(done.is_some());
        assert_eq!(done.unwrap().name, "ai_configure");
    }

    #[test]
    fn missing_name_falls_back_to_unknown_function() {
        let mut merger = StreamMerger::new();
        merger.push(ToolCallFragment {
            id: Some("call_2".into()),
            arguments_delta: Some("{}".into()),
            ..Default::default()
        });
        let completed = merger.finish_turn();
        assert_eq!(completed[0].name, "unknown_function");
    }

    #[test]
    fn two_concurrent_calls_keyed_by_index_do_not_cross_contaminate() {
        let mut merger = StreamMerger::new();
        merger.push(ToolCallFragment {
            index: Some(0),
            id: Some("call_a".into()),
            name: Some("a".into()),
            arguments_delta: Some("1".into()),
            ..Default::default()
        });
        merger.push(ToolCallFragment {
            index: Some(1),
            id: Some("call_b".into()),
            name: Some("b".into()),
            arguments_delta: Some("2".into()),
            ..Default::default()
        });
        let completed = merger.finish_turn();
        assert_eq!(completed.len(), 2);
    }
}
