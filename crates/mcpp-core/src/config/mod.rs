//! Configuration resolution.
//!
//! Merges a template's schema defaults with four override sources into one
//! [`ResolvedConfiguration`], and splits volume-mount and command-argument
//! properties out of the environment map.
//!
//! Precedence, lowest to highest:
//!
//! 1. schema defaults
//! 2. config file values
//! 3. `--config key=value`
//! 4. `--override key=value` (`__` nested paths)
//! 5. explicit environment variables
//! 6. reserved keys (transport, port)

mod mounts;
mod resolved;
mod resolver;
mod sources;

use thiserror::Error;

pub use resolved::ResolvedConfiguration;
pub use resolver::{ConfigResolver, DEFAULT_MOUNT_ROOT, MCP_PORT_ENV, MCP_TRANSPORT_ENV};
pub use sources::{ConfigSources, ReservedKeys, flatten_document, load_config_file, parse_key_value};

/// Errors raised while resolving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// One or more required properties had no value after merging.
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    /// A value did not match the property's declared type.
    #[error("Invalid value for '{property}': {reason}")]
    InvalidValue { property: String, reason: String },

    /// A config file could not be read or parsed.
    #[error("Failed to load config file {path}: {reason}")]
    File { path: String, reason: String },

    /// A `key=value` pair was malformed.
    #[error("Malformed key=value pair: '{0}'")]
    MalformedPair(String),
}
