//! In-memory backend.
//!
//! Honours the same contract as the real runtime backends without touching
//! any external process, and records every probe so tests can assert on the
//! order backends were queried in.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcpp_core::{
    BackendError, BackendType, Deployment, DeploymentBackend, DeploymentRequest, DeploymentStatus,
    LaunchCommand, ResolvedConfiguration, Template,
};
use mcpp_core::domain::DEFAULT_MANAGED_BY;
use tokio::sync::RwLock;
use tracing::info;

/// Backend operation recorded by [`MockBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Status(String),
    Stop(String),
    Logs(String),
}

#[derive(Debug, Default)]
struct MockState {
    deployments: BTreeMap<String, Deployment>,
    logs: HashMap<String, Vec<String>>,
    probes: Vec<Probe>,
}

/// In-memory deployment registry.
#[derive(Debug)]
pub struct MockBackend {
    state: RwLock<MockState>,
    unavailable: AtomicBool,
    next_id: AtomicU64,
    managed_by: String,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MockState::default()),
            unavailable: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            managed_by: DEFAULT_MANAGED_BY.to_string(),
        }
    }

    /// Make every subsequent call fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Register an existing deployment, as if created out of band.
    pub async fn insert(&self, deployment: Deployment) {
        self.state
            .write()
            .await
            .deployments
            .insert(deployment.id.clone(), deployment);
    }

    /// Append a log line to a deployment's output.
    pub async fn push_log(&self, id: &str, line: impl Into<String>) {
        self.state
            .write()
            .await
            .logs
            .entry(id.to_string())
            .or_default()
            .push(line.into());
    }

    /// Every id-addressed call made so far, in order.
    pub async fn probes(&self) -> Vec<Probe> {
        self.state.read().await.probes.clone()
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("mock backend switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeploymentBackend for MockBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Mock
    }

    async fn deploy(&self, request: &DeploymentRequest) -> Result<Deployment, BackendError> {
        self.check_available()?;

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("mcp-{}-{n}", request.template_id);
        let mut deployment = Deployment::new(
            &id,
            &request.template_id,
            BackendType::Mock,
            &request.image,
            &self.managed_by,
        )
        .with_status(DeploymentStatus::Running);
        if let Some(port) = request.port {
            deployment = deployment.with_endpoint(format!("http://localhost:{port}"));
        }

        self.state
            .write()
            .await
            .deployments
            .insert(id.clone(), deployment.clone());
        info!(deployment_id = %id, backend = "mock", "Deployment created");
        Ok(deployment)
    }

    async fn list(&self) -> Result<Vec<Deployment>, BackendError> {
        self.check_available()?;
        Ok(self.state.read().await.deployments.values().cloned().collect())
    }

    async fn stop(&self, id: &str, _timeout: Duration) -> Result<(), BackendError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.probes.push(Probe::Stop(id.to_string()));
        state
            .deployments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn status(&self, id: &str) -> Result<Deployment, BackendError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.probes.push(Probe::Status(id.to_string()));
        state
            .deployments
            .get(id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(id.to_string()))
    }

    async fn logs(&self, id: &str, lines: usize, _follow: bool) -> Result<String, BackendError> {
        self.check_available()?;
        let mut state = self.state.write().await;
        state.probes.push(Probe::Logs(id.to_string()));
        if !state.deployments.contains_key(id) {
            return Err(BackendError::NotFound(id.to_string()));
        }
        let all = state.logs.get(id).map(Vec::as_slice).unwrap_or_default();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].iter().map(|l| format!("{l}\n")).collect())
    }

    fn stdio_launch(
        &self,
        template: &Template,
        resolved: &ResolvedConfiguration,
    ) -> Result<LaunchCommand, BackendError> {
        self.check_available()?;
        let command = template
            .command
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                BackendError::Unsupported(format!(
                    "template '{}' has no local command",
                    template.id
                ))
            })?;

        let mut args = command[1..].to_vec();
        args.extend(resolved.args().iter().cloned());
        Ok(LaunchCommand::new(&command[0], args).with_env(resolved.env().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(template: &str) -> DeploymentRequest {
        DeploymentRequest::new(template, "demo:latest", ResolvedConfiguration::default())
    }

    #[tokio::test]
    async fn test_deploy_list_stop() {
        let backend = MockBackend::new();
        let d = backend.deploy(&request("demo").with_port(7071)).await.unwrap();
        assert_eq!(d.status, DeploymentStatus::Running);
        assert_eq!(d.endpoint.as_deref(), Some("http://localhost:7071"));
        assert_eq!(backend.list().await.unwrap().len(), 1);

        backend.stop(&d.id, Duration::from_secs(1)).await.unwrap();
        assert!(backend.list().await.unwrap().is_empty());

        let err = backend.stop(&d.id, Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_logs_tail() {
        let backend = MockBackend::new();
        let d = backend.deploy(&request("demo")).await.unwrap();
        for line in ["one", "two", "three"] {
            backend.push_log(&d.id, line).await;
        }
        assert_eq!(backend.logs(&d.id, 2, false).await.unwrap(), "two\nthree\n");
        assert_eq!(backend.logs(&d.id, 10, false).await.unwrap(), "one\ntwo\nthree\n");
    }

    #[tokio::test]
    async fn test_unavailable_switch() {
        let backend = MockBackend::new();
        backend.set_unavailable(true);
        assert!(matches!(
            backend.list().await,
            Err(BackendError::Unavailable(_))
        ));
    }

    #[test]
    fn test_stdio_launch_requires_command() {
        let backend = MockBackend::new();
        let template = Template::new("demo", "demo:latest");
        assert!(matches!(
            backend.stdio_launch(&template, &ResolvedConfiguration::default()),
            Err(BackendError::Unsupported(_))
        ));

        let template = template.with_command(vec!["sh".into(), "-c".into(), "cat".into()]);
        let launch = backend
            .stdio_launch(&template, &ResolvedConfiguration::default())
            .unwrap();
        assert_eq!(launch.program, "sh");
        assert_eq!(launch.args, ["-c", "cat"]);
        assert!(launch.container_name.is_none());
    }
}
