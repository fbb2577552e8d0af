//! Configuration authority (C4): the single source of truth for provider/model/parameter state.
//!
//! Grounded on `original_source/src/common/runtime_config.py` for the persisted document shape
//! and defaults, and on the parameter-constraint tables described in `SPEC_FULL.md` §4.4.1
//! (sourced from the sibling `parameter_schemas.py` referenced by the tool handlers). Mutations
//! persist-then-notify; notifications are never emitted on a failed mutation (§4.4 invariant,
//! §8 property 3).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Implemented by whatever delivers `configuration/*` notifications (C9). Kept as a trait here
/// so C4 does not depend on the MCP transport layer.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, method: &str, params: Value);
}

/// A notifier that drops everything; used where no subscribers exist yet (tests, tool-only use).
pub struct NullNotifier;
impl ChangeNotifier for NullNotifier {
    fn notify(&self, _method: &str, _params: Value) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: String,
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub system_prompt: String,
    /// Any parameters beyond the common four (top_p, seed, stop_sequences, ...), kept generic
    /// so the constraint tables in `constraints.rs`-equivalent code below can grow without a
    /// document migration.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSection {
    pub active: String,
    pub models: BTreeMap<String, ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSection {
    pub strict_mode: bool,
    pub config_reload_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationDocument {
    pub provider: ProviderSection,
    pub runtime: RuntimeSection,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

impl Default for ConfigurationDocument {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "openai".to_string(),
            ModelConfig {
                model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: None,
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                extra: BTreeMap::new(),
            },
        );
        models.insert(
            "anthropic".to_string(),
            ModelConfig {
                model: "claude-3-5-sonnet-20241022".to_string(),
                temperature: 0.7,
                max_tokens: Some(4096),
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                extra: BTreeMap::new(),
            },
        );
        models.insert(
            "gemini".to_string(),
            ModelConfig {
                model: "gemini-1.5-flash".to_string(),
                temperature: 0.7,
                max_tokens: Some(4096),
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                extra: BTreeMap::new(),
            },
        );
        models.insert(
            "openrouter".to_string(),
            ModelConfig {
                model: "anthropic/claude-3-sonnet".to_string(),
                temperature: 0.7,
                max_tokens: Some(4096),
                system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
                extra: BTreeMap::new(),
            },
        );
        Self {
            provider: ProviderSection {
                active: "openai".to_string(),
                models,
            },
            runtime: RuntimeSection {
                strict_mode: true,
                config_reload_interval: 5,
            },
        }
    }
}

/// Type of a parameter's value for coercion/validation purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Number,
    Integer,
    String,
    StringArray,
    /// An arbitrary JSON object, e.g. Gemini's `safety_settings`.
    Json,
}

#[derive(Debug, Clone)]
pub struct ParameterConstraint {
    pub param_type: ParamType,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub enum_values: Option<Vec<String>>,
    pub default: Value,
}

/// Resolve the constraint table for a (provider, model) pair. OpenRouter routes by matching the
/// model string against known vendor prefixes; anything unrecognized (any provider) falls back
/// to the conservative schema — matching `SPEC_FULL.md` §4.4.1 exactly.
pub fn parameter_constraints(provider: &str, model: &str) -> BTreeMap<String, ParameterConstraint> {
    let effective_provider = if provider == "openrouter" {
        if model.starts_with("anthropic/") {
            "anthropic"
        } else if model.starts_with("openai/") {
            "openai"
        } else if model.starts_with("google/") {
            "gemini"
        } else {
            "conservative"
        }
    } else {
        provider
    };

    let mut table = BTreeMap::new();
    match effective_provider {
        "openai" if model.starts_with("o1-") => {
            table.insert(
                "max_completion_tokens".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(32768.0),
                    enum_values: None,
                    default: Value::from(4096),
                },
            );
        }
        "openai" => {
            table.insert(num("temperature", Some(0.0), Some(2.0), 1.0));
            table.insert(
                "max_tokens".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(4096.0),
                    enum_values: None,
                    default: Value::Null,
                },
            );
            table.insert(num("top_p", Some(0.0), Some(1.0), 1.0));
            table.insert(num("frequency_penalty", Some(-2.0), Some(2.0), 0.0));
            table.insert(num("presence_penalty", Some(-2.0), Some(2.0), 0.0));
            table.insert(
                "seed".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: None,
                    max: None,
                    enum_values: None,
                    default: Value::Null,
                },
            );
            table.insert(
                "response_format".to_string(),
                ParameterConstraint {
                    param_type: ParamType::String,
                    min: None,
                    max: None,
                    enum_values: Some(vec!["text".into(), "json_object".into(), "json_schema".into()]),
                    default: Value::String("text".into()),
                },
            );
            table.insert(
                "stop".to_string(),
                ParameterConstraint {
                    param_type: ParamType::StringArray,
                    min: None,
                    max: Some(4.0),
                    enum_values: None,
                    default: Value::Array(vec![]),
                },
            );
        }
        "anthropic" => {
            table.insert(num("temperature", Some(0.0), Some(1.0), 1.0));
            table.insert(
                "max_tokens".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(4096.0),
                    enum_values: None,
                    default: Value::from(4096),
                },
            );
            table.insert(num("top_p", Some(0.0), Some(1.0), 1.0));
            table.insert(
                "top_k".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(200.0),
                    enum_values: None,
                    default: Value::from(5),
                },
            );
            table.insert(
                "stop_sequences".to_string(),
                ParameterConstraint {
                    param_type: ParamType::StringArray,
                    min: None,
                    max: Some(4.0),
                    enum_values: None,
                    default: Value::Array(vec![]),
                },
            );
        }
        "gemini" => {
            table.insert(num("temperature", Some(0.0), Some(1.0), 1.0));
            table.insert(
                "max_output_tokens".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(8192.0),
                    enum_values: None,
                    default: Value::from(2048),
                },
            );
            table.insert(num("top_p", Some(0.0), Some(1.0), 1.0));
            table.insert(
                "top_k".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(40.0),
                    enum_values: None,
                    default: Value::from(3),
                },
            );
            table.insert(
                "candidate_count".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(8.0),
                    enum_values: None,
                    default: Value::from(1),
                },
            );
            table.insert(
                "response_mime_type".to_string(),
                ParameterConstraint {
                    param_type: ParamType::String,
                    min: None,
                    max: None,
                    enum_values: Some(vec!["text/plain".into(), "application/json".into()]),
                    default: Value::String("text/plain".into()),
                },
            );
            table.insert(
                "stop_sequences".to_string(),
                ParameterConstraint {
                    param_type: ParamType::StringArray,
                    min: None,
                    max: None,
                    enum_values: None,
                    default: Value::Array(vec![]),
                },
            );
            table.insert(
                "safety_settings".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Json,
                    min: None,
                    max: None,
                    enum_values: None,
                    default: Value::Object(serde_json::Map::new()),
                },
            );
        }
        _ => {
            table.insert(num("temperature", Some(0.0), Some(1.0), 0.7));
            table.insert(
                "max_tokens".to_string(),
                ParameterConstraint {
                    param_type: ParamType::Integer,
                    min: Some(1.0),
                    max: Some(2048.0),
                    enum_values: None,
                    default: Value::from(2048),
                },
            );
        }
    }
    table
}

fn num(name: &str, min: Option<f64>, max: Option<f64>, default: f64) -> (String, ParameterConstraint) {
    (
        name.to_string(),
        ParameterConstraint {
            param_type: ParamType::Number,
            min,
            max,
            enum_values: None,
            default: serde_json::json!(default),
        },
    )
}

pub const KNOWN_PROVIDERS: [&str; 4] = ["openai", "anthropic", "gemini", "openrouter"];

pub fn popular_models(provider: &str) -> &'static [&'static str] {
    match provider {
        "openai" => &["gpt-4o-mini", "gpt-4o", "o1-preview", "o1-mini"],
        "anthropic" => &["claude-3-5-sonnet-20241022", "claude-3-5-haiku-20241022"],
        "gemini" => &["gemini-1.5-flash", "gemini-1.5-pro"],
        "openrouter" => &["anthropic/claude-3-sonnet", "openai/gpt-4o", "google/gemini-1.5-pro"],
        _ => &[],
    }
}

/// The running C4 authority: in-memory cache over the persisted document, guarded by a single
/// async lock, with a pluggable notifier for post-mutation broadcasts.
pub struct ConfigurationAuthority {
    path: PathBuf,
    cache: RwLock<ConfigurationDocument>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl ConfigurationAuthority {
    /// Load from `path` if present, else materialize and persist the default document — mirrors
    /// `_ensure_config_file`.
    pub async fn load(path: PathBuf, notifier: Arc<dyn ChangeNotifier>) -> Result<Self, ConfigError> {
        let doc = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_yaml::from_str(&text)
                .map_err(|e| ConfigError::Persistence(format!("failed to parse {:?}: {}", path, e)))?,
            Err(_) => {
                let doc = ConfigurationDocument::default();
                Self::write(&path, &doc).await?;
                doc
            }
        };
        Ok(Self {
            path,
            cache: RwLock::new(doc),
            notifier,
        })
    }

    async fn write(path: &PathBuf, doc: &ConfigurationDocument) -> Result<(), ConfigError> {
        let text = serde_yaml::to_string(doc)
            .map_err(|e| ConfigError::Persistence(format!("failed to serialize configuration: {}", e)))?;
        tokio::fs::write(path, text)
            .await
            .map_err(|e| ConfigError::Persistence(format!("failed to write {:?}: {}", path, e)))
    }

    /// Flattened view of the active provider's record.
    pub async fn active_provider_config(&self) -> (String, ModelConfig) {
        let doc = self.cache.read().await;
        let active = doc.provider.active.clone();
        let model = doc.provider.models.get(&active).cloned().unwrap_or_else(|| ModelConfig {
            model: String::new(),
            temperature: 0.7,
            max_tokens: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            extra: BTreeMap::new(),
        });
        (active, model)
    }

    pub async fn provider_config(&self, provider: &str) -> Option<ModelConfig> {
        self.cache.read().await.provider.models.get(provider).cloned()
    }

    pub async fn document_snapshot(&self) -> ConfigurationDocument {
        self.cache.read().await.clone()
    }

    fn validate_provider(provider: &str) -> Result<(), ConfigError> {
        if KNOWN_PROVIDERS.contains(&provider) {
            Ok(())
        } else {
            Err(ConfigError::UnknownProvider(provider.to_string()))
        }
    }

    /// Coerce and validate `raw` against `provider`'s current-model constraint for `parameter`,
    /// persist, and notify `configuration/changed` — matching `set_provider_parameter`.
    pub async fn set_parameter(&self, provider: &str, parameter: &str, raw: &str) -> Result<Value, ConfigError> {
        Self::validate_provider(provider)?;
        let current_model = {
            let doc = self.cache.read().await;
            doc.provider
                .models
                .get(provider)
                .map(|m| m.model.clone())
                .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))?
        };

        if parameter == "model" {
            let coerced = Value::String(raw.to_string());
            let mut doc = self.cache.write().await;
            if let Some(m) = doc.provider.models.get_mut(provider) {
                m.model = raw.to_string();
            }
            Self::write(&self.path, &doc).await?;
            drop(doc);
            self.notifier.notify(
                "configuration/changed",
                serde_json::json!({ "provider": provider, "parameter": "model", "value": raw }),
            );
            return Ok(coerced);
        }

        let constraints = parameter_constraints(provider, &current_model);
        let constraint = constraints
            .get(parameter)
            .ok_or_else(|| ConfigError::UnknownParameter {
                provider: provider.to_string(),
                parameter: parameter.to_string(),
            })?;

        let value = if raw == "default" {
            constraint.default.clone()
        } else {
            coerce(raw, constraint.param_type)?
        };

        validate_constraint(parameter, &value, constraint)?;

        {
            let mut doc = self.cache.write().await;
            if let Some(m) = doc.provider.models.get_mut(provider) {
                match parameter {
                    "temperature" => {
                        if let Some(n) = value.as_f64() {
                            m.temperature = n;
                        }
                    }
                    "max_tokens" | "max_output_tokens" | "max_completion_tokens" => {
                        m.max_tokens = value.as_u64().map(|n| n as u32);
                    }
                    "system_prompt" => {
                        if let Some(s) = value.as_str() {
                            m.system_prompt = s.to_string();
                        }
                    }
                    other => {
                        m.extra.insert(other.to_string(), value.clone());
                    }
                }
            }
            Self::write(&self.path, &doc).await?;
        }

        self.notifier.notify(
            "configuration/changed",
            serde_json::json!({ "provider": provider, "parameter": parameter, "value": value }),
        );
        Ok(value)
    }

    /// Switch the active provider, persist, notify `configuration/provider_switched`.
    pub async fn switch_active(&self, provider: &str) -> Result<(), ConfigError> {
        Self::validate_provider(provider)?;
        {
            let mut doc = self.cache.write().await;
            doc.provider.active = provider.to_string();
            Self::write(&self.path, &doc).await?;
        }
        self.notifier.notify(
            "configuration/provider_switched",
            serde_json::json!({ "provider": provider }),
        );
        Ok(())
    }

    /// Reset named parameters (or all known parameters for the provider's current model, when
    /// `names` is empty) to their constraint defaults. Returns the set of (parameter, default)
    /// pairs actually changed.
    pub async fn reset(&self, provider: &str, names: &[String]) -> Result<Vec<(String, Value)>, ConfigError> {
        Self::validate_provider(provider)?;
        let current_model = {
            let doc = self.cache.read().await;
            doc.provider
                .models
                .get(provider)
                .map(|m| m.model.clone())
                .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))?
        };
        let constraints = parameter_constraints(provider, &current_model);
        let targets: Vec<String> = if names.is_empty() {
            constraints.keys().cloned().collect()
        } else {
            names.to_vec()
        };

        let mut changed = Vec::new();
        for name in &targets {
            if let Some(constraint) = constraints.get(name) {
                let current = self.current_parameter_value(provider, name).await;
                if current.as_ref() != Some(&constraint.default) {
                    self.set_parameter(provider, name, &stringify(&constraint.default)).await?;
                    changed.push((name.clone(), constraint.default.clone()));
                }
            }
        }
        Ok(changed)
    }

    async fn current_parameter_value(&self, provider: &str, parameter: &str) -> Option<Value> {
        let doc = self.cache.read().await;
        let model = doc.provider.models.get(provider)?;
        match parameter {
            "temperature" => Some(serde_json::json!(model.temperature)),
            "max_tokens" | "max_output_tokens" | "max_completion_tokens" => {
                Some(model.max_tokens.map(Value::from).unwrap_or(Value::Null))
            }
            "system_prompt" => Some(Value::String(model.system_prompt.clone())),
            other => model.extra.get(other).cloned(),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce(raw: &str, param_type: ParamType) -> Result<Value, ConfigError> {
    match param_type {
        ParamType::Number => raw
            .parse::<f64>()
            .map(|n| serde_json::json!(n))
            .map_err(|_| ConfigError::TypeMismatch {
                parameter: "value".to_string(),
                expected: "number",
                got: raw.to_string(),
            }),
        ParamType::Integer => raw
            .parse::<i64>()
            .map(|n| serde_json::json!(n))
            .map_err(|_| ConfigError::TypeMismatch {
                parameter: "value".to_string(),
                expected: "integer",
                got: raw.to_string(),
            }),
        ParamType::String => Ok(Value::String(raw.to_string())),
        ParamType::StringArray => Ok(Value::Array(
            raw.split(',').map(|s| Value::String(s.trim().to_string())).collect(),
        )),
        ParamType::Json => serde_json::from_str(raw).map_err(|_| ConfigError::TypeMismatch {
            parameter: "value".to_string(),
            expected: "json object",
            got: raw.to_string(),
        }),
    }
}

fn validate_constraint(parameter: &str, value: &Value, constraint: &ParameterConstraint) -> Result<(), ConfigError> {
    if let Some(allowed) = &constraint.enum_values {
        let as_str = value.as_str().unwrap_or_default();
        if !allowed.iter().any(|a| a == as_str) {
            return Err(ConfigError::NotInEnum {
                parameter: parameter.to_string(),
                value: as_str.to_string(),
                allowed: allowed.clone(),
            });
        }
    }
    if let Some(n) = value.as_f64() {
        if let Some(min) = constraint.min {
            if n < min {
                return Err(ConfigError::OutOfRange {
                    parameter: parameter.to_string(),
                    value: n.to_string(),
                    min: min.to_string(),
                    max: constraint.max.map(|m| m.to_string()).unwrap_or_default(),
                });
            }
        }
        if let Some(max) = constraint.max {
            if n > max {
                return Err(ConfigError::OutOfRange {
                    parameter: parameter.to_string(),
                    value: n.to_string(),
                    min: constraint.min.map(|m| m.to_string()).unwrap_or_default(),
                    max: max.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_load_materializes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let authority = ConfigurationAuthority::load(path.clone(), Arc::new(NullNotifier)).await.unwrap();
        let (active, model) = authority.active_provider_config().await;
        assert_eq!(active, "openai");
        assert_eq!(model.model, "gpt-4o-mini");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn set_parameter_persists_and_is_observable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let authority = ConfigurationAuthority::load(path, Arc::new(NullNotifier)).await.unwrap();
        authority.set_parameter("openai", "temperature", "0.9").await.unwrap();
        let (_, model) = authority.active_provider_config().await;
        assert_eq!(model.temperature, 0.9);
    }

    #[tokio::test]
    async fn out_of_range_parameter_does_not_mutate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let authority = ConfigurationAuthority::load(path, Arc::new(NullNotifier)).await.unwrap();
        let err = authority.set_parameter("openai", "temperature", "5.0").await;
        assert!(err.is_err());
        let (_, model) = authority.active_provider_config().await;
        assert_eq!(model.temperature, 0.7);
    }

    #[tokio::test]
    async fn switch_active_updates_active_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let authority = ConfigurationAuthority::load(path, Arc::new(NullNotifier)).await.unwrap();
        authority.switch_active("anthropic").await.unwrap();
        let (active, _) = authority.active_provider_config().await;
        assert_eq!(active, "anthropic");
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let authority = ConfigurationAuthority::load(path, Arc::new(NullNotifier)).await.unwrap();
        authority.set_parameter("openai", "temperature", "0.3").await.unwrap();
        let changed_first = authority.reset("openai", &[]).await.unwrap();
        assert!(!changed_first.is_empty());
        let changed_second = authority.reset("openai", &[]).await.unwrap();
        assert!(changed_second.is_empty());
    }
}
