//! MCP 2025-06-18 JSON-RPC control channel: framing (C7a), dispatch/pagination (C7b), and
//! notification fan-out (C9).

pub mod jsonrpc;
pub mod notifications;
pub mod server;

pub use notifications::NotificationHub;
pub use server::McpServer;
