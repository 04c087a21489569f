//! Template descriptor types.
//!
//! Templates are produced by the discovery layer and consumed read-only here.
//! The JSON shape is:
//!
//! ```json
//! {
//!   "name": "Demo", "description": "...", "version": "1.0.0",
//!   "image": "example/demo:latest",
//!   "config_schema": { "properties": { ... }, "required": [ ... ] },
//!   "transport": { "default": "stdio", "supported": ["stdio", "http"], "port": 7071 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Transport a tool server speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON-RPC over the process's standard input/output.
    #[default]
    Stdio,
    /// JSON-RPC over HTTP POST.
    #[serde(alias = "streamable-http", alias = "sse")]
    Http,
}

impl TransportKind {
    /// Wire name used in environment variables and labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdio => "stdio",
            Self::Http => "http",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared transport capabilities of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSpec {
    /// Transport used when the caller does not ask for one.
    #[serde(default)]
    pub default: TransportKind,

    /// Every transport the server can speak.
    #[serde(default)]
    pub supported: Vec<TransportKind>,

    /// Port the server listens on when running over HTTP.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Default for TransportSpec {
    fn default() -> Self {
        Self {
            default: TransportKind::Stdio,
            supported: vec![TransportKind::Stdio],
            port: None,
        }
    }
}

impl TransportSpec {
    /// Check whether `kind` is supported. The default transport always is.
    #[must_use]
    pub fn supports(&self, kind: TransportKind) -> bool {
        self.default == kind || self.supported.contains(&kind)
    }
}

/// Declared type of a configuration property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    String,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "int")]
    Integer,
    Number,
    Array,
}

/// One property of a template's configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigProperty {
    /// Property name (the key in `config_schema.properties`).
    #[serde(skip)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub property_type: PropertyType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Environment variable this property resolves to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_mapping: Option<String>,

    /// Separator used when an array value is flattened into one variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_separator: Option<String>,

    /// Value is one or more host paths to mount into the workload.
    #[serde(default, rename = "volume_mount")]
    pub is_volume_mount: bool,

    /// Value is appended to the launch command.
    #[serde(default, rename = "command_arg")]
    pub is_command_arg: bool,

    /// Values are redacted in logs.
    #[serde(default)]
    pub sensitive: bool,

    /// Set from the schema's `required` list.
    #[serde(skip)]
    pub required: bool,
}

impl ConfigProperty {
    /// Create a plain string property.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::String,
            default: None,
            description: None,
            env_mapping: None,
            env_separator: None,
            is_volume_mount: false,
            is_command_arg: false,
            sensitive: false,
            required: false,
        }
    }

    #[must_use]
    pub const fn with_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = property_type;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_env_mapping(mut self, env: impl Into<String>) -> Self {
        self.env_mapping = Some(env.into());
        self
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.env_separator = Some(separator.into());
        self
    }

    #[must_use]
    pub const fn volume_mount(mut self) -> Self {
        self.is_volume_mount = true;
        self
    }

    #[must_use]
    pub const fn command_arg(mut self) -> Self {
        self.is_command_arg = true;
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Environment variable name this property is exported as.
    ///
    /// Falls back to the upper-cased property name when no mapping is declared.
    #[must_use]
    pub fn env_name(&self) -> String {
        self.env_mapping
            .clone()
            .unwrap_or_else(|| self.name.to_uppercase())
    }

    /// Check whether a source key addresses this property.
    ///
    /// Accepts the property name, its effective env name (see
    /// [`Self::env_name`]), or a `__` nested path whose segments joined with
    /// `_` equal the property name.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        if key == self.name || key == self.env_name() {
            return true;
        }
        key.contains("__") && key.split("__").collect::<Vec<_>>().join("_") == self.name
    }
}

/// Ordered configuration schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema", into = "RawSchema")]
pub struct ConfigSchema {
    properties: Vec<ConfigProperty>,
}

impl ConfigSchema {
    /// Build a schema from properties in declaration order.
    #[must_use]
    pub const fn new(properties: Vec<ConfigProperty>) -> Self {
        Self { properties }
    }

    /// Properties in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[ConfigProperty] {
        &self.properties
    }

    /// Look up a property by any key it answers to.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&ConfigProperty> {
        self.properties.iter().find(|p| p.matches_key(key))
    }
}

#[derive(Serialize, Deserialize)]
struct RawSchema {
    #[serde(default)]
    properties: serde_json::Map<String, Value>,
    #[serde(default)]
    required: Vec<String>,
}

impl TryFrom<RawSchema> for ConfigSchema {
    type Error = String;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let mut properties = Vec::with_capacity(raw.properties.len());
        for (name, value) in raw.properties {
            let mut property: ConfigProperty = serde_json::from_value(value)
                .map_err(|e| format!("invalid property '{name}': {e}"))?;
            property.required = raw.required.contains(&name);
            property.name = name;
            properties.push(property);
        }
        Ok(Self { properties })
    }
}

impl From<ConfigSchema> for RawSchema {
    fn from(schema: ConfigSchema) -> Self {
        let required = schema
            .properties
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.clone())
            .collect();
        let properties = schema
            .properties
            .into_iter()
            .map(|p| {
                let name = p.name.clone();
                (name, serde_json::to_value(p).unwrap_or(Value::Null))
            })
            .collect();
        Self {
            properties,
            required,
        }
    }
}

/// A tool-server template descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Template identifier (directory name in the discovery layer).
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub version: String,

    /// Container image reference.
    #[serde(default)]
    pub image: String,

    /// Local launch command, for running the server as a plain process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub config_schema: ConfigSchema,

    #[serde(default)]
    pub transport: TransportSpec,
}

impl Template {
    /// Parse a descriptor, assigning it the given identifier.
    pub fn from_json(id: impl Into<String>, json: &str) -> Result<Self, serde_json::Error> {
        let mut template: Self = serde_json::from_str(json)?;
        template.id = id.into();
        Ok(template)
    }

    /// Minimal template for a given image.
    pub fn new(id: impl Into<String>, image: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            version: String::new(),
            image: image.into(),
            command: None,
            config_schema: ConfigSchema::default(),
            transport: TransportSpec::default(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: TransportSpec) -> Self {
        self.transport = transport;
        self
    }

    #[must_use]
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = Some(command);
        self
    }
}
