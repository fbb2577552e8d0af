//! A vendor-neutral AI gateway exposing a uniform tool and configuration surface over a chat
//! channel and an MCP 2025-06-18 JSON-RPC control channel, driving OpenAI, Anthropic, Gemini and
//! OpenRouter behind one conversational loop.
//!
//! See `SPEC_FULL.md` for the full component breakdown (C1-C9) and `DESIGN.md` for the grounding
//! ledger this crate was built from.

pub mod adapter;
pub mod config;
pub mod config_tools;
pub mod configuration;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod orchestrator;
pub mod tool;

pub use configuration::ConfigurationAuthority;
pub use mcp::McpServer;
pub use orchestrator::ChatOrchestrator;
pub use tool::ToolRegistry;
