//! Canonical tool schema, provider translation (C1), and the tool registry (C5).

pub mod registry;
pub mod schema;

pub use registry::{ToolExecution, ToolHandler, ToolRegistry};
pub use schema::{Tool, ToolParameter, ToolParameterType};
