//! The six built-in configuration tools (C6), each a thin `ToolHandler` over the configuration
//! authority (C4). Grounded on `original_source/src/mcp/tools/{ai_config_tool,
//! switch_provider_tool, reset_config_tool, show_config_tool, list_models_tool,
//! parameter_info_tool}.py`: the two-phase confirm gate, the `value="default"` special case,
//! and the no-op/no-change short circuits are reproduced as described in those files and in
//! `SPEC_FULL.md` §4.6.

use crate::configuration::{parameter_constraints, popular_models, ConfigurationAuthority, ModelConfig, KNOWN_PROVIDERS};
use crate::error::ToolError;
use crate::tool::schema::{Tool, ToolParameter, ToolParameterType};
use crate::tool::ToolHandler;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

fn provider_enum() -> Vec<Value> {
    KNOWN_PROVIDERS.iter().map(|p| Value::String(p.to_string())).collect()
}

/// Read `parameter`'s current value off an already-fetched `ModelConfig`, mirroring the field
/// mapping `ConfigurationAuthority::set_parameter` writes through.
fn extract_parameter_value(model: &ModelConfig, parameter: &str) -> Value {
    match parameter {
        "model" => Value::String(model.model.clone()),
        "temperature" => json!(model.temperature),
        "max_tokens" | "max_output_tokens" | "max_completion_tokens" => {
            model.max_tokens.map(Value::from).unwrap_or(Value::Null)
        }
        "system_prompt" => Value::String(model.system_prompt.clone()),
        other => model.extra.get(other).cloned().unwrap_or(Value::Null),
    }
}

/// Render a provider's current model record the way `show_current_config`/`ai_configure` report
/// it back to the caller.
fn render_current_config(provider: &str, model: &ModelConfig) -> Value {
    json!({
        "provider": provider,
        "model": model.model,
        "temperature": model.temperature,
        "max_tokens": model.max_tokens,
        "system_prompt": model.system_prompt,
    })
}

/// `ai_configure`: set a single parameter on a provider (defaulting to the active one).
pub struct AiConfigureTool {
    authority: Arc<ConfigurationAuthority>,
}

impl AiConfigureTool {
    pub fn new(authority: Arc<ConfigurationAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl ToolHandler for AiConfigureTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "ai_configure",
            "Set a configuration parameter for an AI provider.",
            vec![
                ToolParameter::new("provider", ToolParameterType::String, "target provider; defaults to the active one")
                    .with_enum(provider_enum()),
                ToolParameter::new("parameter", ToolParameterType::String, "parameter name to set").required(),
                ToolParameter::new(
                    "value",
                    ToolParameterType::String,
                    "new value, or \"default\" to reset this parameter",
                )
                .required(),
            ],
        )
        .with_category("configuration")
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let (active, _) = self.authority.active_provider_config().await;
        let provider = arguments["provider"].as_str().unwrap_or(&active).to_string();
        let parameter = arguments["parameter"]
            .as_str()
            .ok_or_else(|| ToolError::MissingRequired("parameter".into()))?;
        let value = arguments["value"]
            .as_str()
            .ok_or_else(|| ToolError::MissingRequired("value".into()))?;

        let old = self.authority.provider_config(&provider).await;
        let old_value = old.as_ref().map(|m| extract_parameter_value(m, parameter)).unwrap_or(Value::Null);

        if parameter == "model" {
            let available = popular_models(&provider);
            if !available.is_empty() && !available.contains(&value) {
                return Ok(json!({
                    "status": "error",
                    "message": format!("unknown model `{}` for provider `{}`", value, provider),
                }));
            }
        }

        match self.authority.set_parameter(&provider, parameter, value).await {
            Ok(new_value) => {
                let current = self.authority.provider_config(&provider).await;
                let current_config = current.as_ref().map(|m| render_current_config(&provider, m)).unwrap_or(Value::Null);
                Ok(json!({
                    "status": "success",
                    "message": format!("{}.{} set to {}", provider, parameter, new_value),
                    "provider": provider,
                    "parameter": parameter,
                    "old_value": old_value,
                    "new_value": new_value,
                    "current_config": current_config,
                }))
            }
            Err(e) => Ok(json!({ "status": "error", "message": e.to_string() })),
        }
    }
}

/// `show_current_config`: read-only rendering of the active provider's configuration.
pub struct ShowCurrentConfigTool {
    authority: Arc<ConfigurationAuthority>,
}

impl ShowCurrentConfigTool {
    pub fn new(authority: Arc<ConfigurationAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl ToolHandler for ShowCurrentConfigTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "show_current_config",
            "Show the currently active provider's configuration.",
            vec![
                ToolParameter::new("verbose", ToolParameterType::Boolean, "include full detail").with_default(json!(false)),
                ToolParameter::new("format", ToolParameterType::String, "rendering format")
                    .with_enum(vec!["detailed".into(), "compact".into(), "json".into()])
                    .with_default(json!("detailed")),
            ],
        )
        .with_category("configuration")
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let (active, model) = self.authority.active_provider_config().await;
        let format = arguments["format"].as_str().unwrap_or("detailed");
        let summary = json!({
            "provider": active,
            "model": model.model,
            "temperature": model.temperature,
            "max_tokens": model.max_tokens,
            "system_prompt": model.system_prompt,
        });
        match format {
            "json" => Ok(json!({ "data": summary })),
            "compact" => Ok(json!({ "message": format!("{}/{} @ t={}", active, model.model, model.temperature) })),
            _ => Ok(json!({ "message": format!("Active provider: {}", active), "data": summary })),
        }
    }
}

/// `list_available_models`: read-only catalog of known model identifiers per provider.
pub struct ListAvailableModelsTool;

#[async_trait]
impl ToolHandler for ListAvailableModelsTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "list_available_models",
            "List known model identifiers, optionally scoped to one provider.",
            vec![
                ToolParameter::new("provider", ToolParameterType::String, "provider to scope to").with_enum(provider_enum()),
                ToolParameter::new("format", ToolParameterType::String, "rendering format")
                    .with_enum(vec!["grouped".into(), "flat".into(), "json".into()])
                    .with_default(json!("grouped")),
            ],
        )
        .with_category("configuration")
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let scope = arguments["provider"].as_str();
        let providers: Vec<&str> = match scope {
            Some(p) => vec![p],
            None => KNOWN_PROVIDERS.to_vec(),
        };
        let grouped: serde_json::Map<String, Value> = providers
            .iter()
            .map(|p| (p.to_string(), json!(popular_models(p))))
            .collect();
        Ok(json!({ "data": Value::Object(grouped) }))
    }
}

/// `switch_provider`: two-phase confirm gate for changing the active provider (and optionally
/// its model in the same call).
pub struct SwitchProviderTool {
    authority: Arc<ConfigurationAuthority>,
}

impl SwitchProviderTool {
    pub fn new(authority: Arc<ConfigurationAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl ToolHandler for SwitchProviderTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "switch_provider",
            "Switch the active AI provider, optionally setting its model in the same call.",
            vec![
                ToolParameter::new("provider", ToolParameterType::String, "provider to switch to")
                    .required()
                    .with_enum(provider_enum()),
                ToolParameter::new("confirm", ToolParameterType::Boolean, "set true to apply the switch").with_default(json!(false)),
                ToolParameter::new("model", ToolParameterType::String, "optional model to set on the new provider"),
            ],
        )
        .with_category("configuration")
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let target = arguments["provider"]
            .as_str()
            .ok_or_else(|| ToolError::MissingRequired("provider".into()))?;
        let confirm = arguments["confirm"].as_bool().unwrap_or(false);
        let model_override = arguments["model"].as_str();

        let (active, current_model) = self.authority.active_provider_config().await;
        if target == active && model_override.is_none() {
            return Ok(json!({ "status": "no_change", "message": format!("already on provider `{}`", active) }));
        }

        if !confirm {
            return Ok(json!({
                "status": "confirmation_required",
                "message": format!(
                    "🔄 switch from `{}` ({}) to `{}`{}? call again with confirm=true to apply.",
                    active,
                    current_model.model,
                    target,
                    model_override.map(|m| format!(" using model `{}`", m)).unwrap_or_default(),
                ),
            }));
        }

        if let Err(e) = self.authority.switch_active(target).await {
            return Ok(json!({ "status": "error", "message": e.to_string() }));
        }
        if let Some(model) = model_override {
            if let Err(e) = self.authority.set_parameter(target, "model", model).await {
                return Ok(json!({ "status": "partial_success", "message": e.to_string() }));
            }
        }
        Ok(json!({ "status": "success", "message": format!("✅ switched to `{}`", target) }))
    }
}

/// `get_parameter_info`: read-only introspection of constraints and current values.
pub struct ParameterInfoTool {
    authority: Arc<ConfigurationAuthority>,
}

impl ParameterInfoTool {
    pub fn new(authority: Arc<ConfigurationAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl ToolHandler for ParameterInfoTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "get_parameter_info",
            "Describe the constraints and current value of one or all provider parameters.",
            vec![
                ToolParameter::new("parameter", ToolParameterType::String, "single parameter to describe"),
                ToolParameter::new("provider", ToolParameterType::String, "provider to scope to; defaults to active")
                    .with_enum(provider_enum()),
                ToolParameter::new("compare", ToolParameterType::Boolean, "compare across all providers").with_default(json!(false)),
            ],
        )
        .with_category("configuration")
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let (active, _) = self.authority.active_provider_config().await;
        let filter = arguments["parameter"].as_str();
        let compare = arguments["compare"].as_bool().unwrap_or(false);

        let providers: Vec<String> = if compare {
            KNOWN_PROVIDERS.iter().map(|s| s.to_string()).collect()
        } else {
            vec![arguments["provider"].as_str().unwrap_or(&active).to_string()]
        };

        let mut all_info = serde_json::Map::new();
        for provider in &providers {
            let Some(model) = self.authority.provider_config(provider).await else {
                all_info.insert(provider.clone(), json!({}));
                continue;
            };
            let constraints = parameter_constraints(provider, &model.model);
            let rendered: serde_json::Map<String, Value> = constraints
                .iter()
                .filter(|(name, _)| filter.map(|f| f == name.as_str()).unwrap_or(true))
                .map(|(name, c)| {
                    (
                        name.clone(),
                        json!({
                            "type": format!("{:?}", c.param_type),
                            "minimum": c.min,
                            "maximum": c.max,
                            "enum": c.enum_values,
                            "default": c.default,
                            "current_value": extract_parameter_value(&model, name),
                        }),
                    )
                })
                .collect();
            all_info.insert(provider.clone(), Value::Object(rendered));
        }

        if compare {
            Ok(json!({ "data": Value::Object(all_info), "compared_providers": providers }))
        } else {
            let data = all_info.remove(&providers[0]).unwrap_or_else(|| json!({}));
            Ok(json!({ "data": data }))
        }
    }
}

/// `reset_config`: two-phase confirm gate for restoring parameters to their defaults.
pub struct ResetConfigTool {
    authority: Arc<ConfigurationAuthority>,
}

impl ResetConfigTool {
    pub fn new(authority: Arc<ConfigurationAuthority>) -> Self {
        Self { authority }
    }
}

#[async_trait]
impl ToolHandler for ResetConfigTool {
    fn definition(&self) -> Tool {
        Tool::new(
            "reset_config",
            "Reset one, several, or all provider parameters to their defaults.",
            vec![
                ToolParameter::new("provider", ToolParameterType::String, "provider to reset, or \"all\"")
                    .with_enum({
                        let mut v = provider_enum();
                        v.push(Value::String("all".into()));
                        v
                    }),
                ToolParameter::new("confirm", ToolParameterType::Boolean, "set true to apply the reset").with_default(json!(false)),
                ToolParameter::new(
                    "parameters",
                    ToolParameterType::Array,
                    "specific parameter names to reset; omit to reset all",
                )
                .with_items(ToolParameter::new("item", ToolParameterType::String, "parameter name")),
            ],
        )
        .with_category("configuration")
    }

    async fn execute(&self, arguments: Value) -> Result<Value, ToolError> {
        let (active, _) = self.authority.active_provider_config().await;
        let provider_arg = arguments["provider"].as_str().unwrap_or(&active);
        let targets: Vec<String> = if provider_arg == "all" {
            KNOWN_PROVIDERS.iter().map(|s| s.to_string()).collect()
        } else {
            vec![provider_arg.to_string()]
        };
        let confirm = arguments["confirm"].as_bool().unwrap_or(false);
        let names: Vec<String> = arguments["parameters"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        // Preview: compute what would change without mutating, by diffing against defaults.
        let mut preview = Vec::new();
        for provider in &targets {
            let model = self.authority.provider_config(provider).await;
            let Some(model) = model else { continue };
            let constraints = parameter_constraints(provider, &model.model);
            let scope: Vec<&String> = if names.is_empty() {
                constraints.keys().collect()
            } else {
                names.iter().collect()
            };
            for name in scope {
                if let Some(c) = constraints.get(name) {
                    let current = match name.as_str() {
                        "temperature" => json!(model.temperature),
                        "max_tokens" | "max_output_tokens" | "max_completion_tokens" => {
                            model.max_tokens.map(Value::from).unwrap_or(Value::Null)
                        }
                        other => model.extra.get(other).cloned().unwrap_or(Value::Null),
                    };
                    if current != c.default {
                        preview.push((provider.clone(), name.clone(), c.default.clone()));
                    }
                }
            }
        }

        if preview.is_empty() {
            return Ok(json!({ "status": "no_change", "message": "all targeted parameters already match defaults" }));
        }

        if !confirm {
            let listing: Vec<String> = preview
                .iter()
                .map(|(p, n, d)| format!("🔄 {}.{} -> {}", p, n, d))
                .collect();
            return Ok(json!({
                "status": "confirmation_required",
                "message": format!("⚠️ the following would reset:\n{}", listing.join("\n")),
            }));
        }

        let mut failures = Vec::new();
        for provider in &targets {
            let scope = if names.is_empty() { vec![] } else { names.clone() };
            if let Err(e) = self.authority.reset(provider, &scope).await {
                failures.push(format!("{}: {}", provider, e));
            }
        }

        if failures.is_empty() {
            Ok(json!({ "status": "success", "message": "✅ reset applied" }))
        } else {
            Ok(json!({ "status": "partial_success", "message": failures.join("; ") }))
        }
    }
}
