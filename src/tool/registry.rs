//! Tool registry (C5): named tools with validated dispatch to handlers.
//!
//! Grounded on `original_source/src/mcp/tool_registry.py`'s `ToolRegistry`/`ToolHandler`: the
//! validation order (required-present, then unknown-rejected, then per-type, then enum) and the
//! `ToolExecution` timing wrapper are reproduced as-is; `async-trait` stands in for the Python
//! `ABC`+`async def` pattern the same way the teacher's `tool_protocol.rs` uses it.

use crate::configuration::{ChangeNotifier, NullNotifier};
use crate::error::ToolError;
use crate::logging::TimedLogger;
use crate::mcp::jsonrpc::methods;
use crate::tool::schema::{Tool, ToolParameter, ToolParameterType};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Implemented by each concrete tool (C6's six config tools, and any caller-registered tool).
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The canonical definition advertised via `tools/list`.
    fn definition(&self) -> Tool;

    /// Execute with pre-validated arguments; the registry guarantees `arguments` satisfies the
    /// definition's schema before this is called.
    async fn execute(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Outcome of a registry-mediated execution, including measured wall time.
#[derive(Debug, Clone)]
pub struct ToolExecution {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub execution_time_ms: u128,
}

struct Entry {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Ordered, name-keyed collection of tools with their handlers.
pub struct ToolRegistry {
    entries: RwLock<Vec<Entry>>,
    version: std::sync::atomic::AtomicU64,
    notifier: Arc<dyn ChangeNotifier>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// A registry with no wired notifier; `register`/`unregister` still bump `version` but no
    /// `notifications/tools/list_changed` is sent anywhere. Use [`Self::with_notifier`] to wire
    /// one up (C9).
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(NullNotifier))
    }

    pub fn with_notifier(notifier: Arc<dyn ChangeNotifier>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            version: std::sync::atomic::AtomicU64::new(0),
            notifier,
        }
    }

    /// Current `tools_version`, bumped on every register/unregister.
    pub fn version(&self) -> u64 {
        self.version.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Register a tool, replacing any existing entry of the same name. Returns `true` if this
    /// replaced an existing tool.
    pub async fn register(&self, handler: Arc<dyn ToolHandler>) -> bool {
        let tool = handler.definition();
        let mut entries = self.entries.write().await;
        let replaced = if let Some(pos) = entries.iter().position(|e| e.tool.name == tool.name) {
            entries[pos] = Entry { tool, handler };
            true
        } else {
            entries.push(Entry { tool, handler });
            false
        };
        drop(entries);
        let version = self.version.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        self.notifier.notify(methods::TOOLS_LIST_CHANGED, json!({ "version": version }));
        replaced
    }

    /// Remove a tool by name. Returns `true` if a tool was removed.
    pub async fn unregister(&self, name: &str) -> bool {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| e.tool.name != name);
        let removed = entries.len() != before;
        drop(entries);
        if removed {
            let version = self.version.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            self.notifier.notify(methods::TOOLS_LIST_CHANGED, json!({ "version": version }));
        }
        removed
    }

    /// All registered tools, in registration order.
    pub async fn list(&self) -> Vec<Tool> {
        self.entries.read().await.iter().map(|e| e.tool.clone()).collect()
    }

    pub async fn get(&self, name: &str) -> Option<Tool> {
        self.entries
            .read()
            .await
            .iter()
            .find(|e| e.tool.name == name)
            .map(|e| e.tool.clone())
    }

    /// Validate `arguments` against the named tool's schema, then dispatch to its handler.
    pub async fn execute(&self, name: &str, arguments: Value) -> Result<ToolExecution, ToolError> {
        let (tool, handler) = {
            let entries = self.entries.read().await;
            let entry = entries
                .iter()
                .find(|e| e.tool.name == name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            (entry.tool.clone(), entry.handler.clone())
        };

        validate_arguments(&tool.parameters, &arguments)?;

        let timer = TimedLogger::new("tool_execute", name.to_string());
        let outcome = handler.execute(arguments).await;
        let execution_time_ms = timer.elapsed_ms();
        drop(timer);

        Ok(match outcome {
            Ok(result) => ToolExecution {
                success: true,
                result: Some(result),
                error: None,
                execution_time_ms,
            },
            Err(e) => ToolExecution {
                success: false,
                result: None,
                error: Some(e.to_string()),
                execution_time_ms,
            },
        })
    }
}

/// Validation order: required-present, unknown-rejected, per-type, then enum — matching
/// `_validate_arguments`/`_validate_parameter_type` exactly.
fn validate_arguments(params: &[ToolParameter], arguments: &Value) -> Result<(), ToolError> {
    let obj = arguments.as_object().cloned().unwrap_or_default();
    let by_name: HashMap<&str, &ToolParameter> = params.iter().map(|p| (p.name.as_str(), p)).collect();

    for param in params {
        if param.required && !obj.contains_key(&param.name) {
            return Err(ToolError::MissingRequired(param.name.clone()));
        }
    }

    for key in obj.keys() {
        if !by_name.contains_key(key.as_str()) {
            return Err(ToolError::UnknownParameter(key.clone()));
        }
    }

    for (key, value) in &obj {
        let param = by_name[key.as_str()];
        validate_value(param, value)?;
    }

    Ok(())
}

fn validate_value(param: &ToolParameter, value: &Value) -> Result<(), ToolError> {
    match param.param_type {
        ToolParameterType::String => {
            let Some(s) = value.as_str() else {
                return Err(type_mismatch(param, "string", value));
            };
            if let Some(pattern) = &param.pattern {
                let matches = Regex::new(pattern)
                    .map_err(|_| ToolError::TypeMismatch {
                        parameter: param.name.clone(),
                        expected: "valid regex pattern",
                        got: pattern.clone(),
                    })?
                    .is_match(s);
                if !matches {
                    return Err(ToolError::NotInEnum {
                        parameter: param.name.clone(),
                        value: s.to_string(),
                        allowed: vec![format!("pattern:{}", pattern)],
                    });
                }
            }
        }
        ToolParameterType::Integer => {
            if !value.is_i64() && !value.is_u64() {
                return Err(type_mismatch(param, "integer", value));
            }
            check_range(param, value.as_f64().unwrap_or_default())?;
        }
        ToolParameterType::Number => {
            let Some(n) = value.as_f64() else {
                return Err(type_mismatch(param, "number", value));
            };
            check_range(param, n)?;
        }
        ToolParameterType::Boolean => {
            if !value.is_boolean() {
                return Err(type_mismatch(param, "boolean", value));
            }
        }
        ToolParameterType::Array => {
            let Some(items) = value.as_array() else {
                return Err(type_mismatch(param, "array", value));
            };
            if let Some(item_schema) = &param.items {
                for item in items {
                    validate_value(item_schema, item)?;
                }
            }
        }
        ToolParameterType::Object => {
            if !value.is_object() {
                return Err(type_mismatch(param, "object", value));
            }
        }
    }

    if let Some(allowed) = &param.enum_values {
        if !allowed.contains(value) {
            return Err(ToolError::NotInEnum {
                parameter: param.name.clone(),
                value: value.to_string(),
                allowed: allowed.iter().map(|v| v.to_string()).collect(),
            });
        }
    }

    Ok(())
}

fn check_range(param: &ToolParameter, n: f64) -> Result<(), ToolError> {
    if let Some(min) = param.minimum {
        if n < min {
            return Err(ToolError::OutOfRange {
                parameter: param.name.clone(),
                value: n,
                min: Some(min),
                max: param.maximum,
            });
        }
    }
    if let Some(max) = param.maximum {
        if n > max {
            return Err(ToolError::OutOfRange {
                parameter: param.name.clone(),
                value: n,
                min: param.minimum,
                max: Some(max),
            });
        }
    }
    Ok(())
}

fn type_mismatch(param: &ToolParameter, expected: &'static str, got: &Value) -> ToolError {
    ToolError::TypeMismatch {
        parameter: param.name.clone(),
        expected,
        got: got.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::schema::ToolParameterType;
    use serde_json::json;

    struct EchoHandler;

    #[async_trait]
    impl ToolHandler for EchoHandler {
        fn definition(&self) -> Tool {
            Tool::new(
                "echo",
                "echoes input",
                vec![
                    ToolParameter::new("message", ToolParameterType::String, "text").required(),
                    ToolParameter::new("count", ToolParameterType::Integer, "repeat count")
                        .with_range(Some(1.0), Some(5.0)),
                ],
            )
        }

        async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
            Ok(json!({ "message": arguments["message"] }))
        }
    }

    #[tokio::test]
    async fn register_then_list_then_execute() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoHandler)).await;
        assert_eq!(registry.list().await.len(), 1);

        let exec = registry
            .execute("echo", json!({ "message": "hi", "count": 2 }))
            .await
            .unwrap();
        assert!(exec.success);
        assert_eq!(exec.result.unwrap()["message"], "hi");
    }

    #[tokio::test]
    async fn missing_required_parameter_rejected_before_handler_runs() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoHandler)).await;
        let err = registry.execute("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingRequired(p) if p == "message"));
    }

    #[tokio::test]
    async fn unknown_parameter_rejected() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoHandler)).await;
        let err = registry
            .execute("echo", json!({ "message": "hi", "bogus": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownParameter(p) if p == "bogus"));
    }

    #[tokio::test]
    async fn out_of_range_rejected() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoHandler)).await;
        let err = registry
            .execute("echo", json!({ "message": "hi", "count": 10 }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutOfRange { .. }));
    }

    #[tokio::test]
    async fn unregister_bumps_version_and_removes_tool() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoHandler)).await;
        let v1 = registry.version();
        assert!(registry.unregister("echo").await);
        assert!(registry.version() > v1);
        assert!(registry.get("echo").await.is_none());
    }
}
