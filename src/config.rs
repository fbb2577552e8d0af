//! Static, process-startup gateway configuration.
//!
//! Distinct from [`crate::configuration`] (C4), which is the runtime-mutable, notification-driving
//! provider/parameter document. This module covers the ambient concerns of the HTTP server
//! itself: bind address, upstream timeouts, and the path to the C4 document. Grounded on the
//! reference `common/config.py`'s `GatewayConfig`, trimmed to what this gateway's own server
//! needs (the reference's router/MCP sub-sections do not apply to a single-package crate).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address the HTTP/WebSocket server binds to.
    pub host: String,
    /// Port the HTTP/WebSocket server binds to.
    pub port: u16,
    /// Per-request timeout, in seconds, applied to upstream provider calls.
    pub request_timeout_secs: u64,
    /// Path to the persisted provider/parameter configuration document (C4).
    pub config_path: PathBuf,
    /// Log level passed through to `env_logger` if not already set via `RUST_LOG`.
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 60,
            config_path: PathBuf::from("aigateway_config.yaml"),
            log_level: "info".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Load from a YAML file if present, else fall back to defaults. Mirrors the reference
    /// loader's "file overrides struct defaults" layering.
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_yaml::from_str(&text) {
                Ok(cfg) => cfg,
                Err(e) => {
                    log::warn!("failed to parse gateway config at {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.request_timeout_secs, 60);
    }

    #[test]
    fn load_missing_file_falls_back_to_default() {
        let cfg = GatewayConfig::load(std::path::Path::new("/nonexistent/path.yaml"));
        assert_eq!(cfg.host, "127.0.0.1");
    }
}
