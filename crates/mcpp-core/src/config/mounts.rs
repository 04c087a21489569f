//! Volume-mount value splitting.

/// Split a volume-mount value into `(host, container)` pairs.
///
/// Whitespace separates independent paths. A token of the form
/// `host:/container` carries its own container path; anything else is
/// mounted under `mount_root` at the same relative location.
pub(crate) fn split_mounts(value: &str, mount_root: &str) -> Vec<(String, String)> {
    value
        .split_whitespace()
        .map(|token| match explicit_target(token) {
            Some((host, container)) => (host.to_string(), container.to_string()),
            None => (token.to_string(), container_path(token, mount_root)),
        })
        .collect()
}

/// Container path synthesised for a host path with no explicit target.
pub(crate) fn container_path(host: &str, mount_root: &str) -> String {
    let relative = host.trim_start_matches("./").trim_start_matches('/');
    format!("{}/{relative}", mount_root.trim_end_matches('/'))
}

// Windows drive letters ("C:\data") never match: the target must be absolute.
fn explicit_target(token: &str) -> Option<(&str, &str)> {
    let (host, container) = token.split_once(':')?;
    if host.is_empty() || !container.starts_with('/') {
        return None;
    }
    Some((host, container))
}
