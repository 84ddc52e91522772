//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the module list (names present, no duplicates)
//! - Validate value ranges (limits > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use super::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `listener.bind_address` does not parse as a socket address.
    InvalidBindAddress(String),
    /// `listener.max_connections` is zero.
    ZeroMaxConnections,
    /// `listener.max_read_bytes` is zero.
    ZeroMaxReadBytes,
    /// A `[[modules]]` entry has no name (position in the list).
    UnnamedModule(usize),
    /// Two `[[modules]]` entries share a name.
    DuplicateModuleName(String),
    /// `observability.metrics_address` does not parse while metrics are on.
    InvalidMetricsAddress(String),
    /// `observability.log_format` is neither "pretty" nor "json".
    InvalidLogFormat(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener.bind_address `{}` is not a socket address", addr)
            }
            ValidationError::ZeroMaxConnections => {
                write!(f, "listener.max_connections must be greater than zero")
            }
            ValidationError::ZeroMaxReadBytes => {
                write!(f, "listener.max_read_bytes must be greater than zero")
            }
            ValidationError::UnnamedModule(idx) => {
                write!(f, "modules[{}] has no name", idx)
            }
            ValidationError::DuplicateModuleName(name) => {
                write!(f, "module name `{}` appears more than once", name)
            }
            ValidationError::InvalidMetricsAddress(addr) => {
                write!(f, "observability.metrics_address `{}` is not a socket address", addr)
            }
            ValidationError::InvalidLogFormat(format) => {
                write!(f, "observability.log_format `{}` is not `pretty` or `json`", format)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check everything serde cannot. Collects every problem instead of
/// stopping at the first.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.listener.max_read_bytes == 0 {
        errors.push(ValidationError::ZeroMaxReadBytes);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }
    if !matches!(config.observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(
            config.observability.log_format.clone(),
        ));
    }

    // Equal priorities are legal (attach order breaks ties); duplicate
    // names are not, the name is the module's identity.
    let mut seen = HashSet::new();
    for (idx, module) in config.modules.iter().enumerate() {
        if module.name.is_empty() {
            errors.push(ValidationError::UnnamedModule(idx));
        } else if !seen.insert(module.name.as_str()) {
            errors.push(ValidationError::DuplicateModuleName(module.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
