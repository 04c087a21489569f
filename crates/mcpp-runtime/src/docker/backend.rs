//! Docker CLI backend.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mcpp_core::domain::{LABEL_MANAGED_BY, LABEL_TEMPLATE};
use mcpp_core::{
    BackendError, BackendType, Deployment, DeploymentBackend, DeploymentRequest, LaunchCommand,
    PlatformSettings, ResolvedConfiguration, Template,
};
use tracing::{debug, info, warn};

use super::command::{DockerCli, is_no_such};
use super::parse::{parse_inspect_output, parse_ps_output};

/// Backend driving workloads through the `docker` CLI.
#[derive(Debug, Clone)]
pub struct DockerBackend {
    cli: DockerCli,
    managed_by: String,
}

impl DockerBackend {
    /// Connect to the runtime configured in `settings`.
    ///
    /// Fails with `Unavailable` when `docker version` does not answer.
    pub async fn connect(settings: &PlatformSettings) -> Result<Self, BackendError> {
        let backend = Self {
            cli: DockerCli::new(&settings.docker_binary, settings.command_timeout()),
            managed_by: settings.managed_by.clone(),
        };

        let output = backend
            .cli
            .run(&args(["version", "--format", "{{.Server.Version}}"]))
            .await
            .map_err(|e| match e {
                unavailable @ BackendError::Unavailable(_) => unavailable,
                other => BackendError::Unavailable(other.to_string()),
            })?;
        debug!(version = %output.stdout.trim(), "Docker runtime available");

        Ok(backend)
    }

    fn run_args(&self, name: &str, request: &DeploymentRequest) -> Vec<String> {
        let mut run = args(["run", "-d", "--name", name]);
        run.extend(self.label_args(&request.template_id));
        if let Some(port) = request.port {
            run.push("-p".into());
            run.push(format!("{port}:{port}"));
        }
        run.extend(config_args(&request.resolved));
        run.push(request.image.clone());
        run.extend(request.resolved.args().iter().cloned());
        run
    }

    fn label_args(&self, template_id: &str) -> Vec<String> {
        vec![
            "--label".into(),
            format!("{LABEL_TEMPLATE}={template_id}"),
            "--label".into(),
            format!("{LABEL_MANAGED_BY}={}", self.managed_by),
        ]
    }

    async fn inspect(&self, id: &str) -> Result<Deployment, BackendError> {
        match self.cli.run(&args(["inspect", id])).await {
            Ok(output) => parse_inspect_output(&output.stdout, id, &self.managed_by),
            Err(e) if is_no_such(&e) => Err(BackendError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Remove a half-created workload, folding a failed removal into the error.
    async fn rollback(&self, name: &str, original: BackendError) -> BackendError {
        match self.cli.run(&args(["rm", "-f", name])).await {
            Ok(_) => {
                info!(deployment_id = %name, "Rolled back failed deployment");
                original
            }
            Err(e) if is_no_such(&e) => original,
            Err(e) => {
                warn!(deployment_id = %name, error = %e, "Rollback after failed deploy failed");
                BackendError::PartialFailure {
                    original: Box::new(original),
                    rollback: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl DeploymentBackend for DockerBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Docker
    }

    async fn deploy(&self, request: &DeploymentRequest) -> Result<Deployment, BackendError> {
        if request.pull_image {
            info!(image = %request.image, "Pulling image");
            self.cli.run(&args(["pull", &request.image])).await?;
        }

        let name = workload_name(&request.template_id);
        if let Err(e) = self.cli.run(&self.run_args(&name, request)).await {
            return Err(self.rollback(&name, e).await);
        }

        match self.inspect(&name).await {
            Ok(deployment) => {
                info!(
                    deployment_id = %deployment.id,
                    template = %request.template_id,
                    backend = "docker",
                    "Deployment created"
                );
                Ok(deployment)
            }
            Err(e) => Err(self.rollback(&name, e).await),
        }
    }

    async fn list(&self) -> Result<Vec<Deployment>, BackendError> {
        let filter = format!("label={LABEL_MANAGED_BY}={}", self.managed_by);
        let output = self
            .cli
            .run(&args(["ps", "-a", "--filter", &filter, "--format", "{{json .}}"]))
            .await?;
        Ok(parse_ps_output(&output.stdout, &self.managed_by))
    }

    async fn stop(&self, id: &str, timeout: Duration) -> Result<(), BackendError> {
        self.inspect(id).await?;

        // The CLI waits up to `timeout` for the container before killing it.
        let seconds = timeout.as_secs().to_string();
        let limit = timeout + self.cli.timeout();
        match self
            .cli
            .run_with_timeout(&args(["stop", "-t", &seconds, id]), limit)
            .await
        {
            Ok(_) => {}
            Err(e) if is_no_such(&e) => return Err(BackendError::NotFound(id.to_string())),
            Err(e) => return Err(e),
        }

        if let Err(e) = self.cli.run(&args(["rm", id])).await {
            warn!(deployment_id = %id, error = %e, "Failed to remove stopped container");
        }
        info!(deployment_id = %id, backend = "docker", "Deployment stopped");
        Ok(())
    }

    async fn status(&self, id: &str) -> Result<Deployment, BackendError> {
        self.inspect(id).await
    }

    async fn logs(&self, id: &str, lines: usize, follow: bool) -> Result<String, BackendError> {
        self.inspect(id).await?;

        let tail = lines.to_string();
        if follow {
            let output = self
                .cli
                .capture_until_timeout(&args(["logs", "--tail", &tail, "-f", id]))
                .await?;
            return Ok(output.combined());
        }
        let output = self.cli.run(&args(["logs", "--tail", &tail, id])).await?;
        Ok(output.combined())
    }

    fn stdio_launch(
        &self,
        template: &Template,
        resolved: &ResolvedConfiguration,
    ) -> Result<LaunchCommand, BackendError> {
        if template.image.is_empty() {
            return Err(BackendError::Unsupported(format!(
                "template '{}' has no image",
                template.id
            )));
        }

        let name = workload_name(&template.id);
        let mut launch = args(["run", "-i", "--rm", "--name", &name]);
        launch.extend(self.label_args(&template.id));
        launch.extend(config_args(resolved));
        launch.push(template.image.clone());
        launch.extend(resolved.args().iter().cloned());

        Ok(LaunchCommand::new(self.cli.binary(), launch).with_container_name(name))
    }

    async fn cleanup_ephemeral(&self, name: &str) -> Result<(), BackendError> {
        match self.cli.run(&args(["rm", "-f", name])).await {
            Ok(_) => Ok(()),
            Err(e) if is_no_such(&e) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn args<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.iter().map(ToString::to_string).collect()
}

/// `-e` and `-v` flags for a resolved configuration.
fn config_args(resolved: &ResolvedConfiguration) -> Vec<String> {
    let mut out = Vec::new();
    for (key, value) in resolved.env() {
        out.push("-e".into());
        out.push(format!("{key}={value}"));
    }
    for (host, container) in resolved.volumes() {
        out.push("-v".into());
        out.push(format!("{host}:{container}"));
    }
    out
}

/// `mcp-<template>-<timestamp>-<suffix>`, unique per call.
fn workload_name(template_id: &str) -> String {
    let slug: String = template_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "mcp-{slug}-{}-{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        &suffix[..8]
    )
}
