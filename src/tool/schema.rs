//! Canonical, vendor-neutral tool schema (C1) and the pure translator functions that turn it
//! into each provider's wire format.
//!
//! Grounded on `original_source/src/mcp/tool_registry.py` (the `Tool`/`ToolParameter` shapes and
//! `_convert_tool_parameters_to_schema`) and `original_source/src/adapters/tool_translator.py`
//! (the four `mcp_to_*` conversions, reproduced here field-for-field).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ToolParameterType {
    fn as_json_schema_str(&self) -> &'static str {
        match self {
            ToolParameterType::String => "string",
            ToolParameterType::Integer => "integer",
            ToolParameterType::Number => "number",
            ToolParameterType::Boolean => "boolean",
            ToolParameterType::Array => "array",
            ToolParameterType::Object => "object",
        }
    }
}

/// One parameter of a tool's input schema. Supports recursive `array`/`object` nesting the same
/// way the reference `ToolParameter` model does.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// For `array` parameters, the schema of each item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ToolParameter>>,
    /// For `object` parameters, nested named properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, ToolParameter>>,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, param_type: ToolParameterType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
            enum_values: None,
            minimum: None,
            maximum: None,
            pattern: None,
            default: None,
            items: None,
            properties: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.minimum = min;
        self.maximum = max;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_items(mut self, items: ToolParameter) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    /// Render this parameter as one `properties` entry of a JSON-Schema object, per
    /// `_convert_tool_parameters_to_schema`.
    fn to_schema_property(&self) -> Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "type".to_string(),
            Value::String(self.param_type.as_json_schema_str().to_string()),
        );
        obj.insert("description".to_string(), Value::String(self.description.clone()));
        if let Some(values) = &self.enum_values {
            obj.insert("enum".to_string(), Value::Array(values.clone()));
        }
        if let Some(min) = self.minimum {
            obj.insert("minimum".to_string(), json!(min));
        }
        if let Some(max) = self.maximum {
            obj.insert("maximum".to_string(), json!(max));
        }
        if let Some(pattern) = &self.pattern {
            obj.insert("pattern".to_string(), Value::String(pattern.clone()));
        }
        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }
        if self.param_type == ToolParameterType::Array {
            if let Some(items) = &self.items {
                obj.insert("items".to_string(), items.to_schema_property());
            }
        }
        if self.param_type == ToolParameterType::Object {
            if let Some(properties) = &self.properties {
                let props: serde_json::Map<String, Value> = properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_schema_property()))
                    .collect();
                obj.insert("properties".to_string(), Value::Object(props));
            }
        }
        Value::Object(obj)
    }
}

/// The canonical, vendor-neutral tool description (C1 / §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl Tool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Vec<ToolParameter>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            category: default_category(),
            version: default_version(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Build the `inputSchema` JSON-Schema fragment from this tool's declarative parameter list.
    /// Mirrors `_convert_tool_parameters_to_schema`: a tool with no parameters still yields
    /// `{type: "object", properties: {}, required: []}`.
    pub fn input_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for param in &self.parameters {
            properties.insert(param.name.clone(), param.to_schema_property());
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        })
    }
}

/// Convert canonical tools to the OpenAI/OpenRouter function-calling wire format.
pub fn to_openai(tools: &[Tool]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema(),
                    }
                })
            })
            .collect(),
    )
}

/// Convert canonical tools to the Anthropic tools wire format.
pub fn to_anthropic(tools: &[Tool]) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema(),
                })
            })
            .collect(),
    )
}

/// Convert canonical tools to the Gemini `functionDeclarations` wire format.
pub fn to_gemini(tools: &[Tool]) -> Value {
    json!({
        "functionDeclarations": tools.iter().map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "parameters": t.input_schema(),
            })
        }).collect::<Vec<_>>()
    })
}

/// OpenRouter is OpenAI-compatible for tool declarations; delegates unchanged.
pub fn to_openrouter(tools: &[Tool]) -> Value {
    to_openai(tools)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tool() -> Tool {
        Tool::new(
            "ai_configure",
            "Set a provider parameter",
            vec![
                ToolParameter::new("parameter", ToolParameterType::String, "parameter name").required(),
                ToolParameter::new("value", ToolParameterType::String, "new value").required(),
            ],
        )
    }

    #[test]
    fn input_schema_marks_required_params() {
        let schema = sample_tool().input_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
        assert!(schema["properties"]["parameter"]["type"] == "string");
    }

    #[test]
    fn empty_parameters_yield_empty_object_schema() {
        let tool = Tool::new("ping", "no-op", vec![]);
        let schema = tool.input_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"].as_object().unwrap().len(), 0);
        assert_eq!(schema["required"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn openai_translation_matches_function_calling_shape() {
        let out = to_openai(&[sample_tool()]);
        let entry = &out[0];
        assert_eq!(entry["type"], "function");
        assert_eq!(entry["function"]["name"], "ai_configure");
        assert!(entry["function"]["parameters"].is_object());
    }

    #[test]
    fn anthropic_translation_uses_input_schema_key() {
        let out = to_anthropic(&[sample_tool()]);
        assert_eq!(out[0]["name"], "ai_configure");
        assert!(out[0]["input_schema"].is_object());
        assert!(out[0].get("parameters").is_none());
    }

    #[test]
    fn gemini_translation_wraps_in_function_declarations() {
        let out = to_gemini(&[sample_tool()]);
        let decls = out["functionDeclarations"].as_array().unwrap();
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0]["name"], "ai_configure");
    }

    #[test]
    fn openrouter_matches_openai_exactly() {
        let tools = vec![sample_tool()];
        assert_eq!(to_openrouter(&tools), to_openai(&tools));
    }
}
