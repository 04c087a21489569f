//! Override sources fed into the resolver.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use super::ConfigError;
use crate::domain::TransportKind;

/// Separator for nested keys in config files and `--override` pairs.
pub(crate) const NESTED_SEPARATOR: &str = "__";

/// Every caller-supplied configuration source, already split into keys.
///
/// Values from the environment of the current process are never read;
/// `env_vars` only holds what the caller passed explicitly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigSources {
    /// Flattened config file document (`__`-joined nested keys).
    pub config_file: BTreeMap<String, Value>,
    /// `--config key=value` pairs.
    pub config_values: BTreeMap<String, String>,
    /// `--override key=value` pairs.
    pub overrides: BTreeMap<String, String>,
    /// `--env KEY=value` pairs.
    pub env_vars: BTreeMap<String, String>,
}

impl ConfigSources {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already loaded config document. Nested objects are flattened.
    #[must_use]
    pub fn with_config_file(mut self, document: &Value) -> Self {
        self.config_file = flatten_document(document);
        self
    }

    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config_values.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Build sources from raw `key=value` strings as a front end collects them.
    pub fn from_pairs<S: AsRef<str>>(
        config_values: &[S],
        overrides: &[S],
        env_vars: &[S],
    ) -> Result<Self, ConfigError> {
        let collect = |pairs: &[S]| -> Result<BTreeMap<String, String>, ConfigError> {
            pairs.iter().map(|p| parse_key_value(p.as_ref())).collect()
        };
        Ok(Self {
            config_file: BTreeMap::new(),
            config_values: collect(config_values)?,
            overrides: collect(overrides)?,
            env_vars: collect(env_vars)?,
        })
    }
}

/// Reserved keys the platform sets itself. They win over every source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReservedKeys {
    pub transport: Option<TransportKind>,
    pub port: Option<u16>,
}

impl ReservedKeys {
    #[must_use]
    pub const fn new(transport: Option<TransportKind>, port: Option<u16>) -> Self {
        Self { transport, port }
    }
}

/// Split a `key=value` pair on the first `=`.
///
/// The key is trimmed and must be non-empty; the value is kept verbatim and
/// may itself contain `=`.
pub fn parse_key_value(pair: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedPair(pair.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::MalformedPair(pair.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Load a JSON or YAML config document.
pub fn load_config_file(path: impl AsRef<Path>) -> Result<Value, ConfigError> {
    let path = path.as_ref();
    let file_error = |reason: String| ConfigError::File {
        path: path.display().to_string(),
        reason,
    };

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let contents = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;

    match extension.as_deref() {
        Some("json") => serde_json::from_str(&contents).map_err(|e| file_error(e.to_string())),
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&contents).map_err(|e| file_error(e.to_string()))
        }
        other => Err(file_error(format!(
            "unsupported file extension: {}",
            other.unwrap_or("<none>")
        ))),
    }
}

/// Flatten nested objects into `__`-joined keys. Arrays are kept as leaves.
#[must_use]
pub fn flatten_document(document: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Value::Object(map) = document {
        for (key, value) in map {
            flatten_into(key, value, &mut out);
        }
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}{NESTED_SEPARATOR}{key}"), nested, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf.clone());
        }
    }
}
