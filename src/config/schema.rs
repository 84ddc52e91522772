//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the modular server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Modules to install, instantiated through the catalog.
    pub modules: Vec<ModuleConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            // The bundled observability modules, so a minimal config still
            // exercises both dispatch surfaces.
            modules: vec![
                ModuleConfig {
                    name: "access-log".to_string(),
                    priority: 10,
                    ..ModuleConfig::default()
                },
                ModuleConfig {
                    name: "byte-counter".to_string(),
                    priority: 50,
                    ..ModuleConfig::default()
                },
            ],
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Upper bound on the initial read handed to the handler chain.
    pub max_read_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            max_read_bytes: 64 * 1024,
        }
    }
}

/// One module to install.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModuleConfig {
    /// Catalog name of the module.
    pub name: String,

    /// Dispatch priority. Lower runs earlier on both surfaces.
    pub priority: i32,

    /// Install this module (and keep it installed across reloads).
    pub enabled: bool,

    /// Module-private configuration file, handed through verbatim.
    pub conf_file: Option<PathBuf>,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            priority: 100,
            enabled: true,
            conf_file: None,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Initial read timeout in seconds.
    pub read_secs: u64,

    /// How long shutdown waits for in-flight connections to drain.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_secs: 5,
            drain_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
