//! Platform settings and validation.
//!
//! Settings are plain values passed explicitly to every component; nothing
//! here reads global state. Missing fields fall back to the defaults below.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MOUNT_ROOT;
use crate::domain::{BackendType, DEFAULT_MANAGED_BY};

/// Default timeout for a single runtime CLI command, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 60;

/// Default grace period given to a workload on stop, in seconds.
pub const DEFAULT_STOP_TIMEOUT_SECS: u64 = 10;

/// Default timeout for each protocol handshake step, in seconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 30;

/// Default timeout for one tool call, in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60;

/// Default path the HTTP transport posts to.
pub const DEFAULT_HTTP_PATH: &str = "/mcp";

/// Platform-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlatformSettings {
    /// Backends to enable, in detection order.
    pub backends: Vec<BackendType>,

    /// Path or name of the docker CLI.
    pub docker_binary: String,

    /// Value of the ownership label on every workload.
    pub managed_by: String,

    /// Container directory host paths are mounted under.
    pub mount_root: String,

    pub command_timeout_secs: u64,
    pub stop_timeout_secs: u64,
    pub handshake_timeout_secs: u64,
    pub call_timeout_secs: u64,

    /// Path appended to an endpoint for HTTP protocol requests.
    pub http_path: String,

    /// Pull images before deploying.
    pub pull_images: bool,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PlatformSettings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            backends: BackendType::ALL.to_vec(),
            docker_binary: "docker".to_string(),
            managed_by: DEFAULT_MANAGED_BY.to_string(),
            mount_root: DEFAULT_MOUNT_ROOT.to_string(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            stop_timeout_secs: DEFAULT_STOP_TIMEOUT_SECS,
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            http_path: DEFAULT_HTTP_PATH.to_string(),
            pull_images: false,
        }
    }

    /// Load settings from a JSON or YAML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Load(format!("{}: {e}", path.display())))?;

        let settings: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_str(&contents)
                .map_err(|e| SettingsError::Load(format!("{}: {e}", path.display())))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| SettingsError::Load(format!("{}: {e}", path.display())))?,
        };

        validate_settings(&settings)?;
        Ok(settings)
    }

    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Errors that can occur during settings validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("At least one backend must be enabled")]
    NoBackends,

    #[error("Backend listed more than once: {0}")]
    DuplicateBackend(BackendType),

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    #[error("HTTP path must start with '/', got {0}")]
    InvalidHttpPath(String),

    #[error("Failed to load settings: {0}")]
    Load(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &PlatformSettings) -> Result<(), SettingsError> {
    if settings.backends.is_empty() {
        return Err(SettingsError::NoBackends);
    }
    for (i, backend) in settings.backends.iter().enumerate() {
        if settings.backends[..i].contains(backend) {
            return Err(SettingsError::DuplicateBackend(*backend));
        }
    }

    for (name, secs) in [
        ("command_timeout_secs", settings.command_timeout_secs),
        ("stop_timeout_secs", settings.stop_timeout_secs),
        ("handshake_timeout_secs", settings.handshake_timeout_secs),
        ("call_timeout_secs", settings.call_timeout_secs),
    ] {
        if secs == 0 {
            return Err(SettingsError::ZeroTimeout(name));
        }
    }

    for (field, value) in [
        ("docker_binary", &settings.docker_binary),
        ("managed_by", &settings.managed_by),
        ("mount_root", &settings.mount_root),
    ] {
        if value.trim().is_empty() {
            return Err(SettingsError::Empty { field });
        }
    }

    if !settings.http_path.starts_with('/') {
        return Err(SettingsError::InvalidHttpPath(settings.http_path.clone()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = PlatformSettings::with_defaults();
        assert_eq!(
            settings.backends,
            vec![BackendType::Docker, BackendType::Kubernetes, BackendType::Mock]
        );
        assert_eq!(settings.managed_by, DEFAULT_MANAGED_BY);
        assert_eq!(settings.mount_root, "/mnt");
        assert_eq!(settings.http_path, "/mcp");
        assert!(validate_settings(&settings).is_ok());
    }

    #[test]
    fn test_validate_duplicate_backend() {
        let settings = PlatformSettings {
            backends: vec![BackendType::Mock, BackendType::Mock],
            ..Default::default()
        };
        assert_eq!(
            validate_settings(&settings),
            Err(SettingsError::DuplicateBackend(BackendType::Mock))
        );
    }

    #[test]
    fn test_validate_zero_timeout() {
        let settings = PlatformSettings {
            call_timeout_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::ZeroTimeout("call_timeout_secs"))
        ));
    }

    #[test]
    fn test_validate_http_path() {
        let settings = PlatformSettings {
            http_path: "mcp".into(),
            ..Default::default()
        };
        assert!(matches!(
            validate_settings(&settings),
            Err(SettingsError::InvalidHttpPath(_))
        ));
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "backends: [mock]\ncall_timeout_secs: 5").unwrap();

        let settings = PlatformSettings::load(file.path()).unwrap();
        assert_eq!(settings.backends, vec![BackendType::Mock]);
        assert_eq!(settings.call_timeout(), Duration::from_secs(5));
        assert_eq!(settings.docker_binary, "docker");
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"backends": []}}"#).unwrap();
        assert_eq!(
            PlatformSettings::load(file.path()),
            Err(SettingsError::NoBackends)
        );
    }
}
