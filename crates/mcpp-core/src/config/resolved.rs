use std::collections::BTreeMap;

use serde::Serialize;

/// Output of configuration resolution.
///
/// Produced once per deploy or call and read-only afterwards. Ordered maps
/// make two resolutions of the same input byte-identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedConfiguration {
    env: BTreeMap<String, String>,
    volumes: BTreeMap<String, String>,
    args: Vec<String>,
}

impl ResolvedConfiguration {
    /// Assemble a configuration from already-resolved parts.
    #[must_use]
    pub const fn from_parts(
        env: BTreeMap<String, String>,
        volumes: BTreeMap<String, String>,
        args: Vec<String>,
    ) -> Self {
        Self { env, volumes, args }
    }

    /// Environment variable name → value.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Host path → container path.
    #[must_use]
    pub const fn volumes(&self) -> &BTreeMap<String, String> {
        &self.volumes
    }

    /// Tokens appended to the launch command.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}
