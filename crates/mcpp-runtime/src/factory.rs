//! Backend construction from the closed [`BackendType`] set.

use std::sync::Arc;

use mcpp_core::{BackendError, BackendType, DeploymentBackend, PlatformSettings};
use tracing::warn;

use crate::docker::DockerBackend;
use crate::kubernetes::KubernetesBackend;
use crate::mock::MockBackend;

/// Construct one backend.
///
/// Fails with `Unavailable` when the runtime cannot be reached.
pub async fn create_backend(
    backend_type: BackendType,
    settings: &PlatformSettings,
) -> Result<Arc<dyn DeploymentBackend>, BackendError> {
    match backend_type {
        BackendType::Docker => Ok(Arc::new(DockerBackend::connect(settings).await?)),
        BackendType::Kubernetes => match KubernetesBackend::new(settings) {
            Ok(never) => match never {},
            Err(e) => Err(e),
        },
        BackendType::Mock => Ok(Arc::new(MockBackend::new())),
    }
}

/// Outcome of [`select_backend`].
pub struct BackendSelection {
    pub backend: Arc<dyn DeploymentBackend>,
    /// Set when the preferred backend failed and `fallback` was used instead.
    pub fell_back_from: Option<(BackendType, String)>,
}

impl std::fmt::Debug for BackendSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelection")
            .field("backend", &self.backend.backend_type())
            .field("fell_back_from", &self.fell_back_from)
            .finish()
    }
}

/// Construct `preferred`, or `fallback` if that fails.
///
/// A fallback is never silent: it is logged and reported in the selection.
pub async fn select_backend(
    preferred: BackendType,
    fallback: Option<BackendType>,
    settings: &PlatformSettings,
) -> Result<BackendSelection, BackendError> {
    match create_backend(preferred, settings).await {
        Ok(backend) => Ok(BackendSelection {
            backend,
            fell_back_from: None,
        }),
        Err(e) => {
            let Some(fallback) = fallback.filter(|f| *f != preferred) else {
                return Err(e);
            };
            warn!(
                backend = %preferred,
                fallback = %fallback,
                error = %e,
                "Preferred backend unavailable, falling back"
            );
            let backend = create_backend(fallback, settings).await?;
            Ok(BackendSelection {
                backend,
                fell_back_from: Some((preferred, e.to_string())),
            })
        }
    }
}
