//! Parsing of docker `ps` and `inspect` JSON output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mcpp_core::domain::{LABEL_MANAGED_BY, LABEL_TEMPLATE};
use mcpp_core::{BackendError, BackendType, Deployment, DeploymentStatus};
use serde::Deserialize;
use tracing::debug;

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsEntry {
    names: String,
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    labels: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    ports: String,
}

/// Parse `ps` output, one JSON object per line. Non-JSON lines are skipped.
pub(crate) fn parse_ps_output(output: &str, managed_by: &str) -> Vec<Deployment> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<PsEntry>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(line, error = %e, "Skipping non-JSON runtime output");
                None
            }
        })
        .filter_map(|entry| {
            let labels = parse_label_list(&entry.labels);
            let name = entry.names.split(',').next().unwrap_or_default().to_string();
            build_deployment(
                name,
                entry.image,
                labels,
                &entry.state,
                parse_ps_timestamp(&entry.created_at),
                host_port_from_ps(&entry.ports),
                managed_by,
            )
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    name: String,
    #[serde(default)]
    created: String,
    config: InspectConfig,
    state: InspectState,
    #[serde(default)]
    network_settings: Option<InspectNetwork>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetwork {
    #[serde(default)]
    ports: Option<BTreeMap<String, Option<Vec<PortBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PortBinding {
    #[serde(default)]
    host_port: String,
}

/// Parse `inspect` output into a managed deployment.
///
/// Returns `NotFound` when the object exists but is not owned by `managed_by`.
pub(crate) fn parse_inspect_output(
    output: &str,
    id: &str,
    managed_by: &str,
) -> Result<Deployment, BackendError> {
    let entries: Vec<InspectEntry> =
        serde_json::from_str(output.trim()).map_err(|e| BackendError::Parse(e.to_string()))?;
    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::NotFound(id.to_string()))?;

    let port = entry
        .network_settings
        .and_then(|n| n.ports)
        .and_then(|ports| {
            ports
                .into_values()
                .flatten()
                .flatten()
                .find_map(|binding| binding.host_port.parse::<u16>().ok())
        });
    let created_at = DateTime::parse_from_rfc3339(&entry.created)
        .map(|t| t.with_timezone(&Utc))
        .ok();

    build_deployment(
        entry.name.trim_start_matches('/').to_string(),
        entry.config.image,
        entry.config.labels.unwrap_or_default(),
        &entry.state.status,
        created_at,
        port,
        managed_by,
    )
    .ok_or_else(|| BackendError::NotFound(id.to_string()))
}

fn build_deployment(
    name: String,
    image: String,
    labels: BTreeMap<String, String>,
    state: &str,
    created_at: Option<DateTime<Utc>>,
    host_port: Option<u16>,
    managed_by: &str,
) -> Option<Deployment> {
    if labels.get(LABEL_MANAGED_BY).map(String::as_str) != Some(managed_by) {
        debug!(name, "Ignoring workload without ownership label");
        return None;
    }
    let template = labels.get(LABEL_TEMPLATE).cloned().unwrap_or_default();

    let mut deployment = Deployment::new(name, template, BackendType::Docker, image, managed_by)
        .with_status(DeploymentStatus::from_runtime_state(state));
    if let Some(created_at) = created_at {
        deployment.created_at = created_at;
    }
    if let Some(port) = host_port {
        deployment = deployment.with_endpoint(format!("http://localhost:{port}"));
    }
    deployment.labels = labels;
    Some(deployment)
}

/// `a=b,c=d` → map. Values containing commas are not representable here.
fn parse_label_list(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// `2024-05-01 10:00:00 +0000 UTC` → timestamp.
fn parse_ps_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let head: Vec<&str> = raw.split_whitespace().take(3).collect();
    DateTime::parse_from_str(&head.join(" "), "%Y-%m-%d %H:%M:%S %z")
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

/// First published host port in `0.0.0.0:7071->7071/tcp, :::7071->7071/tcp`.
fn host_port_from_ps(ports: &str) -> Option<u16> {
    ports.split(',').find_map(|mapping| {
        let (host, _) = mapping.split_once("->")?;
        host.rsplit(':').next()?.trim().parse().ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKER: &str = "mcp-platform";

    #[test]
    fn test_ps_skips_noise_and_foreign_workloads() {
        let output = r#"WARNING: some daemon notice
{"ID":"abc","Names":"mcp-demo-1","Image":"demo:latest","State":"running","Labels":"managed-by=mcp-platform,template=demo","CreatedAt":"2024-05-01 10:00:00 +0000 UTC","Ports":"0.0.0.0:7071->7071/tcp, :::7071->7071/tcp"}
{"ID":"def","Names":"other","Image":"x","State":"running","Labels":"managed-by=someone-else"}
"#;
        let deployments = parse_ps_output(output, MARKER);
        assert_eq!(deployments.len(), 1);

        let d = &deployments[0];
        assert_eq!(d.id, "mcp-demo-1");
        assert_eq!(d.template, "demo");
        assert_eq!(d.status, DeploymentStatus::Running);
        assert_eq!(d.endpoint.as_deref(), Some("http://localhost:7071"));
        assert_eq!(d.created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_inspect_output() {
        let output = r#"[{
            "Name": "/mcp-demo-1",
            "Created": "2024-05-01T10:00:00.123456789Z",
            "Config": {"Image": "demo:latest", "Labels": {"managed-by": "mcp-platform", "template": "demo"}},
            "State": {"Status": "exited"},
            "NetworkSettings": {"Ports": {"7071/tcp": null}}
        }]"#;
        let d = parse_inspect_output(output, "mcp-demo-1", MARKER).unwrap();
        assert_eq!(d.id, "mcp-demo-1");
        assert_eq!(d.status, DeploymentStatus::Exited);
        assert!(d.endpoint.is_none());
    }

    #[test]
    fn test_inspect_unmanaged_is_not_found() {
        let output = r#"[{"Name": "/db", "Config": {"Image": "pg", "Labels": null}, "State": {"Status": "running"}}]"#;
        let err = parse_inspect_output(output, "db", MARKER).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_inspect_garbage_is_parse_error() {
        let err = parse_inspect_output("not json", "x", MARKER).unwrap_err();
        assert!(matches!(err, BackendError::Parse(_)));
    }

    #[test]
    fn test_host_port_parsing() {
        assert_eq!(host_port_from_ps("0.0.0.0:8080->80/tcp"), Some(8080));
        assert_eq!(host_port_from_ps(":::9000->9000/tcp"), Some(9000));
        assert_eq!(host_port_from_ps("80/tcp"), None);
        assert_eq!(host_port_from_ps(""), None);
    }
}
