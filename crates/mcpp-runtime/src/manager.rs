//! Single-backend deployment operations.
//!
//! `DeploymentManager` pairs one backend with the configuration resolver. It
//! never retries: every backend error is returned to the caller unchanged.

use std::sync::Arc;
use std::time::Duration;

use mcpp_core::{
    BackendError, BackendType, ConfigError, ConfigResolver, ConfigSources, CoreError, Deployment,
    DeploymentBackend, DeploymentRequest, LaunchCommand, PlatformSettings, ReservedKeys, Template,
    TransportKind,
};
use tracing::info;

/// Per-deploy choices that are not part of the template configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Transport to run the server with; the template default when unset.
    pub transport: Option<TransportKind>,
    /// Port for HTTP servers; the template's declared port when unset.
    pub port: Option<u16>,
    /// Overrides the `pull_images` setting.
    pub pull_image: Option<bool>,
}

impl DeployOptions {
    #[must_use]
    pub const fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub const fn with_pull(mut self, pull: bool) -> Self {
        self.pull_image = Some(pull);
        self
    }
}

/// Deployment operations against one backend.
#[derive(Clone)]
pub struct DeploymentManager {
    backend: Arc<dyn DeploymentBackend>,
    resolver: ConfigResolver,
    stop_timeout: Duration,
    pull_images: bool,
}

impl std::fmt::Debug for DeploymentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentManager")
            .field("backend", &self.backend.backend_type())
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl DeploymentManager {
    pub fn new(backend: Arc<dyn DeploymentBackend>, settings: &PlatformSettings) -> Self {
        Self {
            backend,
            resolver: ConfigResolver::new(&settings.mount_root),
            stop_timeout: settings.stop_timeout(),
            pull_images: settings.pull_images,
        }
    }

    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    pub fn backend(&self) -> &Arc<dyn DeploymentBackend> {
        &self.backend
    }

    /// Resolve `template` against `sources` and deploy it.
    ///
    /// Nothing reaches the backend when resolution fails.
    pub async fn deploy_template(
        &self,
        template: &Template,
        sources: &ConfigSources,
        options: &DeployOptions,
    ) -> Result<Deployment, CoreError> {
        let transport = options.transport.unwrap_or(template.transport.default);
        if !template.transport.supports(transport) {
            return Err(ConfigError::InvalidValue {
                property: "transport".to_string(),
                reason: format!("template '{}' does not support {transport}", template.id),
            }
            .into());
        }
        if template.image.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                property: "image".to_string(),
                reason: format!("template '{}' has no image", template.id),
            }
            .into());
        }

        let port = match transport {
            TransportKind::Http => options.port.or(template.transport.port),
            TransportKind::Stdio => None,
        };
        let reserved = ReservedKeys::new(Some(transport), port);
        let resolved = self
            .resolver
            .resolve(&template.config_schema, sources, &reserved)?;

        let mut request = DeploymentRequest::new(&template.id, &template.image, resolved)
            .with_pull(options.pull_image.unwrap_or(self.pull_images));
        if let Some(port) = port {
            request = request.with_port(port);
        }

        info!(
            template = %template.id,
            backend = %self.backend_type(),
            transport = %transport,
            "Deploying template"
        );
        Ok(self.backend.deploy(&request).await?)
    }

    /// Managed deployments, optionally restricted to one template.
    pub async fn list_deployments(
        &self,
        template_filter: Option<&str>,
    ) -> Result<Vec<Deployment>, BackendError> {
        let mut deployments = self.backend.list().await?;
        if let Some(template) = template_filter {
            deployments.retain(|d| d.template == template);
        }
        Ok(deployments)
    }

    pub async fn stop_deployment(
        &self,
        id: &str,
        timeout: Option<Duration>,
    ) -> Result<(), BackendError> {
        self.backend
            .stop(id, timeout.unwrap_or(self.stop_timeout))
            .await
    }

    pub async fn deployment_status(&self, id: &str) -> Result<Deployment, BackendError> {
        self.backend.status(id).await
    }

    pub async fn deployment_logs(
        &self,
        id: &str,
        lines: usize,
        follow: bool,
    ) -> Result<String, BackendError> {
        self.backend.logs(id, lines, follow).await
    }

    /// Resolve configuration for a one-shot stdio session and build its command.
    pub fn prepare_stdio_launch(
        &self,
        template: &Template,
        sources: &ConfigSources,
    ) -> Result<LaunchCommand, CoreError> {
        let reserved = ReservedKeys::new(Some(TransportKind::Stdio), None);
        let resolved = self
            .resolver
            .resolve(&template.config_schema, sources, &reserved)?;
        Ok(self.backend.stdio_launch(template, &resolved)?)
    }
}
