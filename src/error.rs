//! Typed error taxonomy shared across the gateway's components.
//!
//! Each component exposes its own narrow error enum; this module holds the ones that cross
//! component boundaries (configuration, tool registry, adapters, JSON-RPC) so that callers can
//! match on a stable set of variants instead of parsing strings.

use thiserror::Error;

/// Failures raised by the configuration authority (C4).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("unknown parameter `{parameter}` for provider `{provider}`")]
    UnknownParameter { provider: String, parameter: String },
    #[error("parameter `{parameter}` expects type {expected}, got `{got}`")]
    TypeMismatch {
        parameter: String,
        expected: &'static str,
        got: String,
    },
    #[error("parameter `{parameter}` value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        parameter: String,
        value: String,
        min: String,
        max: String,
    },
    #[error("parameter `{parameter}` value `{value}` is not one of {allowed:?}")]
    NotInEnum {
        parameter: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("failed to persist configuration: {0}")]
    Persistence(String),
}

/// Failures raised while validating or executing a registered tool (C5).
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("missing required parameter `{0}`")]
    MissingRequired(String),
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    #[error("parameter `{parameter}` expects type {expected}, got `{got}`")]
    TypeMismatch {
        parameter: String,
        expected: &'static str,
        got: String,
    },
    #[error("parameter `{parameter}` value `{value}` is not one of {allowed:?}")]
    NotInEnum {
        parameter: String,
        value: String,
        allowed: Vec<String>,
    },
    #[error("parameter `{parameter}` value {value} is out of range [{min:?}, {max:?}]")]
    OutOfRange {
        parameter: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    #[error("handler execution failed: {0}")]
    HandlerFailed(String),
}

/// Classification of a failure surfaced by a provider adapter (C3).
#[derive(Debug, Error, Clone)]
pub enum AdapterErrorKind {
    #[error("request to upstream provider timed out")]
    Timeout,
    #[error("rate limited by upstream provider")]
    RateLimit,
    #[error("upstream provider returned an error: {0}")]
    ApiError(String),
    #[error("adapter configuration mismatch: {0}")]
    ConfigError(String),
}

/// JSON-RPC level errors (C7), carrying the MCP-assigned numeric code.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("parse error")]
    ParseError,
    #[error("invalid request")]
    InvalidRequest,
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("tool not found: {0}")]
    ToolNotFound(String),
    #[error("tool execution error: {0}")]
    ToolExecutionError(String),
}

impl RpcError {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    pub const MCP_SERVER_ERROR: i64 = -32000;
    pub const MCP_TOOL_NOT_FOUND: i64 = -32001;
    pub const MCP_TOOL_EXECUTION_ERROR: i64 = -32002;

    /// The numeric JSON-RPC/MCP error code for this variant.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::ParseError => Self::PARSE_ERROR,
            RpcError::InvalidRequest => Self::INVALID_REQUEST,
            RpcError::MethodNotFound(_) => Self::METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => Self::INVALID_PARAMS,
            RpcError::Internal(_) => Self::INTERNAL_ERROR,
            RpcError::ToolNotFound(_) => Self::MCP_TOOL_NOT_FOUND,
            RpcError::ToolExecutionError(_) => Self::MCP_TOOL_EXECUTION_ERROR,
        }
    }
}
