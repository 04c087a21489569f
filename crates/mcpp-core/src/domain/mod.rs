//! Domain types shared across the backend and protocol layers.

mod deployment;
mod template;
mod tool;

pub use deployment::{
    BackendType, DEFAULT_MANAGED_BY, Deployment, DeploymentStatus, LABEL_MANAGED_BY,
    LABEL_TEMPLATE,
};
pub use template::{
    ConfigProperty, ConfigSchema, PropertyType, Template, TransportKind, TransportSpec,
};
pub use tool::{ToolCallResult, ToolDefinition};
