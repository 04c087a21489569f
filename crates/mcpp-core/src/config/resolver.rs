//! Configuration merge and type normalisation.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::mounts::{container_path, split_mounts};
use super::{ConfigError, ConfigSources, ReservedKeys, ResolvedConfiguration};
use crate::domain::{ConfigProperty, ConfigSchema, PropertyType};

/// Environment variable carrying the transport a server should speak.
pub const MCP_TRANSPORT_ENV: &str = "MCP_TRANSPORT";

/// Environment variable carrying the port an HTTP server should bind.
pub const MCP_PORT_ENV: &str = "MCP_PORT";

/// Container directory host paths are mounted under.
pub const DEFAULT_MOUNT_ROOT: &str = "/mnt";

const DEFAULT_ARRAY_SEPARATOR: &str = ",";

/// Merges schema defaults with caller-supplied sources.
///
/// Stateless apart from the mount root: two calls with equal inputs always
/// produce equal outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigResolver {
    mount_root: String,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_ROOT)
    }
}

impl ConfigResolver {
    pub fn new(mount_root: impl Into<String>) -> Self {
        Self {
            mount_root: mount_root.into(),
        }
    }

    #[must_use]
    pub fn mount_root(&self) -> &str {
        &self.mount_root
    }

    /// Resolve `schema` against `sources`.
    ///
    /// # Errors
    ///
    /// `MissingRequired` lists every required property left without a value.
    /// `InvalidValue` is returned for the first value that fails its type.
    pub fn resolve(
        &self,
        schema: &ConfigSchema,
        sources: &ConfigSources,
        reserved: &ReservedKeys,
    ) -> Result<ResolvedConfiguration, ConfigError> {
        let properties = schema.properties();
        let mut values: Vec<Option<Value>> =
            properties.iter().map(|p| p.default.clone()).collect();

        apply_layer(
            properties,
            &mut values,
            "config file",
            sources.config_file.iter().map(|(k, v)| (k, v.clone())),
        );
        apply_layer(
            properties,
            &mut values,
            "config",
            sources
                .config_values
                .iter()
                .map(|(k, v)| (k, Value::String(v.clone()))),
        );
        apply_layer(
            properties,
            &mut values,
            "override",
            sources
                .overrides
                .iter()
                .map(|(k, v)| (k, Value::String(v.clone()))),
        );

        // Explicit env vars: matching keys set the property, the rest pass through.
        let mut passthrough = BTreeMap::new();
        for (key, value) in &sources.env_vars {
            match properties.iter().position(|p| p.matches_key(key)) {
                Some(index) => values[index] = Some(Value::String(value.clone())),
                None => {
                    passthrough.insert(key.clone(), value.clone());
                }
            }
        }

        let missing: Vec<String> = properties
            .iter()
            .zip(&values)
            .filter(|(p, v)| p.required && is_absent(v.as_ref()))
            .map(|(p, _)| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingRequired(missing));
        }

        let mut env = BTreeMap::new();
        let mut volumes = BTreeMap::new();
        let mut args = Vec::new();

        for (property, value) in properties.iter().zip(values) {
            let Some(value) = value.filter(|v| !v.is_null()) else {
                continue;
            };
            let text = normalise(property, &value)?;
            debug!(
                property = %property.name,
                value = %redacted(property, &text),
                "Resolved configuration property"
            );

            if property.is_volume_mount {
                let mounts = split_mounts(&text, &self.mount_root);
                if property.is_command_arg {
                    args.extend(mounts.iter().map(|(_, container)| container.clone()));
                }
                volumes.extend(mounts);
            } else if property.is_command_arg {
                args.extend(text.split_whitespace().map(str::to_string));
            } else {
                env.insert(property.env_name(), text);
            }
        }

        env.extend(passthrough);

        if let Some(transport) = reserved.transport {
            env.insert(MCP_TRANSPORT_ENV.to_string(), transport.as_str().to_string());
        }
        if let Some(port) = reserved.port {
            env.insert(MCP_PORT_ENV.to_string(), port.to_string());
        }

        Ok(ResolvedConfiguration::from_parts(env, volumes, args))
    }

    /// Container path a host path would be mounted at.
    #[must_use]
    pub fn container_path_for(&self, host: &str) -> String {
        container_path(host, &self.mount_root)
    }
}

fn apply_layer<'a>(
    properties: &[ConfigProperty],
    values: &mut [Option<Value>],
    source: &str,
    entries: impl Iterator<Item = (&'a String, Value)>,
) {
    for (key, value) in entries {
        match properties.iter().position(|p| p.matches_key(key)) {
            Some(index) => values[index] = Some(value),
            None => debug!(source, key = %key, "Ignoring unknown configuration key"),
        }
    }
}

fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn redacted<'a>(property: &ConfigProperty, text: &'a str) -> &'a str {
    if property.sensitive { "***" } else { text }
}

fn invalid(property: &ConfigProperty, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        property: property.name.clone(),
        reason: reason.into(),
    }
}

/// Convert a raw value into the string form the workload receives.
fn normalise(property: &ConfigProperty, value: &Value) -> Result<String, ConfigError> {
    match property.property_type {
        PropertyType::String => match value {
            Value::Array(items) => join_items(property, items, " "),
            other => scalar_text(property, other),
        },
        PropertyType::Boolean => normalise_bool(property, value),
        PropertyType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|n| n.to_string())
                .map_err(|_| invalid(property, format!("expected an integer, got '{s}'"))),
            other => Err(invalid(property, format!("expected an integer, got {other}"))),
        },
        PropertyType::Number => match value {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(s.trim().to_string()),
                _ => Err(invalid(property, format!("expected a number, got '{s}'"))),
            },
            other => Err(invalid(property, format!("expected a number, got {other}"))),
        },
        PropertyType::Array => {
            let separator = property
                .env_separator
                .as_deref()
                .unwrap_or(DEFAULT_ARRAY_SEPARATOR);
            match value {
                Value::Array(items) => join_items(property, items, separator),
                Value::String(s) if s.trim_start().starts_with('[') => {
                    match serde_json::from_str::<Vec<Value>>(s) {
                        Ok(items) => join_items(property, &items, separator),
                        Err(e) => Err(invalid(property, format!("malformed array: {e}"))),
                    }
                }
                other => scalar_text(property, other),
            }
        }
    }
}

fn normalise_bool(property: &ConfigProperty, value: &Value) -> Result<String, ConfigError> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(|b| b.to_string())
        .ok_or_else(|| invalid(property, format!("expected a boolean, got {value}")))
}

fn scalar_text(property: &ConfigProperty, value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(invalid(property, format!("expected a scalar, got {other}"))),
    }
}

fn join_items(
    property: &ConfigProperty,
    items: &[Value],
    separator: &str,
) -> Result<String, ConfigError> {
    let parts = items
        .iter()
        .map(|item| scalar_text(property, item))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(separator))
}
