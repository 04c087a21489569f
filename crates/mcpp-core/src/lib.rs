//! Core domain types and port definitions for mcpp.
//!
//! This crate holds everything the backend adapters and the protocol client
//! share: the template and deployment model, configuration resolution, the
//! [`DeploymentBackend`](ports::DeploymentBackend) port and the error taxonomy.
//! It contains no process or network code.
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod ports;
pub mod settings;

// Re-export commonly used types for convenience
pub use config::{
    ConfigError, ConfigResolver, ConfigSources, ReservedKeys, ResolvedConfiguration,
    load_config_file, parse_key_value,
};
pub use domain::{
    BackendType, ConfigProperty, ConfigSchema, Deployment, DeploymentStatus, PropertyType,
    Template, ToolCallResult, ToolDefinition, TransportKind, TransportSpec,
};
pub use ports::{
    BackendError, CoreError, DeploymentBackend, DeploymentRequest, ErrorKind, LaunchCommand,
};
pub use settings::{PlatformSettings, SettingsError, validate_settings};

