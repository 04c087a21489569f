//! Kubernetes backend placeholder.
//!
//! The type has no values: construction always fails with
//! `BackendError::Unavailable`, so no code path can hold a Kubernetes backend
//! that silently does nothing.

use std::time::Duration;

use async_trait::async_trait;
use mcpp_core::{
    BackendError, BackendType, Deployment, DeploymentBackend, DeploymentRequest, LaunchCommand,
    PlatformSettings, ResolvedConfiguration, Template,
};

#[derive(Debug)]
pub enum KubernetesBackend {}

impl KubernetesBackend {
    pub fn new(_settings: &PlatformSettings) -> Result<Self, BackendError> {
        Err(BackendError::Unavailable(
            "kubernetes backend is not implemented".to_string(),
        ))
    }
}

#[async_trait]
impl DeploymentBackend for KubernetesBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Kubernetes
    }

    async fn deploy(&self, _request: &DeploymentRequest) -> Result<Deployment, BackendError> {
        match *self {}
    }

    async fn list(&self) -> Result<Vec<Deployment>, BackendError> {
        match *self {}
    }

    async fn stop(&self, _id: &str, _timeout: Duration) -> Result<(), BackendError> {
        match *self {}
    }

    async fn status(&self, _id: &str) -> Result<Deployment, BackendError> {
        match *self {}
    }

    async fn logs(&self, _id: &str, _lines: usize, _follow: bool) -> Result<String, BackendError> {
        match *self {}
    }

    fn stdio_launch(
        &self,
        _template: &Template,
        _resolved: &ResolvedConfiguration,
    ) -> Result<LaunchCommand, BackendError> {
        match *self {}
    }
}
