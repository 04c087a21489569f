//! Execution backends and deployment orchestration for mcpp.
//!
//! Implements the [`DeploymentBackend`](mcpp_core::DeploymentBackend) port for
//! the docker CLI, a Kubernetes placeholder and an in-memory mock, and layers
//! single-backend ([`DeploymentManager`]) and multi-backend
//! ([`MultiBackendManager`]) operations on top.
#![deny(unused_crate_dependencies)]

pub mod docker;
pub mod factory;
pub mod kubernetes;
mod manager;
pub mod mock;
mod multi;

pub use docker::DockerBackend;
pub use factory::{BackendSelection, create_backend, select_backend};
pub use kubernetes::KubernetesBackend;
pub use manager::{DeployOptions, DeploymentManager};
pub use mock::{MockBackend, Probe};
pub use multi::{BackendHealth, MultiBackendManager, SkippedBackend};

#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tempfile as _;
