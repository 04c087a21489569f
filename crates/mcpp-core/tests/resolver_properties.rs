//! Integration tests for configuration resolution.
//!
//! # What is tested
//!
//! - Source precedence from schema defaults up to explicit env vars
//! - Reserved keys winning over every source
//! - Volume-mount and command-arg properties, alone and combined
//! - Missing required properties reported together
//! - Repeated resolution producing identical output

use std::io::Write;

use mcpp_core::{
    ConfigError, ConfigProperty, ConfigResolver, ConfigSchema, ConfigSources, PropertyType,
    ReservedKeys, Template, TransportKind, load_config_file,
};
use serde_json::json;

fn log_level_schema() -> ConfigSchema {
    ConfigSchema::new(vec![
        ConfigProperty::new("log_level")
            .with_env_mapping("LOG_LEVEL")
            .with_default("info"),
    ])
}

fn resolve(schema: &ConfigSchema, sources: &ConfigSources) -> mcpp_core::ResolvedConfiguration {
    ConfigResolver::default()
        .resolve(schema, sources, &ReservedKeys::default())
        .expect("resolution should succeed")
}

// ── Precedence ─────────────────────────────────────────────────────

#[test]
fn test_precedence_ladder() {
    let schema = log_level_schema();
    let file = json!({"log": {"level": "debug"}});

    let defaults = resolve(&schema, &ConfigSources::new());
    assert_eq!(defaults.env()["LOG_LEVEL"], "info");

    let sources = ConfigSources::new().with_config_file(&file);
    assert_eq!(resolve(&schema, &sources).env()["LOG_LEVEL"], "debug");

    let sources = sources.with_config("log_level", "warn");
    assert_eq!(resolve(&schema, &sources).env()["LOG_LEVEL"], "warn");

    let sources = sources.with_override("log__level", "error");
    assert_eq!(resolve(&schema, &sources).env()["LOG_LEVEL"], "error");

    let sources = sources.with_env("LOG_LEVEL", "trace");
    assert_eq!(resolve(&schema, &sources).env()["LOG_LEVEL"], "trace");
}

#[test]
fn test_config_file_info_config_warn_override_error() {
    let schema = log_level_schema();
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    writeln!(file, r#"{{"log_level": "debug"}}"#).unwrap();
    let document = load_config_file(file.path()).unwrap();

    let sources = ConfigSources::new()
        .with_config_file(&document)
        .with_config("log_level", "warn")
        .with_override("log_level", "error");

    assert_eq!(resolve(&schema, &sources).env()["LOG_LEVEL"], "error");
}

#[test]
fn test_reserved_keys_always_win() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("transport").with_env_mapping("MCP_TRANSPORT"),
    ]);
    let sources = ConfigSources::new()
        .with_config("transport", "stdio")
        .with_env("MCP_TRANSPORT", "stdio")
        .with_env("MCP_PORT", "1");

    let resolved = ConfigResolver::default()
        .resolve(
            &schema,
            &sources,
            &ReservedKeys::new(Some(TransportKind::Http), Some(7071)),
        )
        .unwrap();

    assert_eq!(resolved.env()["MCP_TRANSPORT"], "http");
    assert_eq!(resolved.env()["MCP_PORT"], "7071");
}

// ── Volumes and arguments ──────────────────────────────────────────

#[test]
fn test_volume_mount_and_command_arg() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("allowed_dirs")
            .with_env_mapping("ALLOWED_DIRS")
            .volume_mount()
            .command_arg(),
    ]);
    let sources = ConfigSources::new().with_config("allowed_dirs", "/a/b");

    let resolved = resolve(&schema, &sources);

    assert_eq!(resolved.volumes().get("/a/b").map(String::as_str), Some("/mnt/a/b"));
    assert_eq!(resolved.args(), ["/mnt/a/b"]);
    assert!(!resolved.env().contains_key("ALLOWED_DIRS"));
}

#[test]
fn test_multiple_mount_paths() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("data_dirs").volume_mount(),
    ]);
    let sources = ConfigSources::new().with_config("data_dirs", "/p1 /p2  /p3");

    let resolved = resolve(&schema, &sources);

    assert_eq!(resolved.volumes().len(), 3);
    assert_eq!(resolved.volumes()["/p1"], "/mnt/p1");
    assert_eq!(resolved.volumes()["/p2"], "/mnt/p2");
    assert_eq!(resolved.volumes()["/p3"], "/mnt/p3");
    assert!(resolved.args().is_empty());
    assert!(!resolved.env().contains_key("DATA_DIRS"));
}

#[test]
fn test_explicit_container_target_feeds_args() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("root").volume_mount().command_arg(),
    ]);
    let sources = ConfigSources::new().with_config("root", "/srv/data:/data");

    let resolved = resolve(&schema, &sources);

    assert_eq!(resolved.volumes()["/srv/data"], "/data");
    assert_eq!(resolved.args(), ["/data"]);
}

#[test]
fn test_command_arg_only() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("extra").command_arg(),
    ]);
    let sources = ConfigSources::new().with_config("extra", "--verbose --depth 3");

    let resolved = resolve(&schema, &sources);

    assert_eq!(resolved.args(), ["--verbose", "--depth", "3"]);
    assert!(resolved.volumes().is_empty());
}

#[test]
fn test_custom_mount_root() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("dirs").volume_mount(),
    ]);
    let resolved = ConfigResolver::new("/workspace")
        .resolve(
            &schema,
            &ConfigSources::new().with_config("dirs", "/home/me"),
            &ReservedKeys::default(),
        )
        .unwrap();
    assert_eq!(resolved.volumes()["/home/me"], "/workspace/home/me");
}

// ── Validation ─────────────────────────────────────────────────────

#[test]
fn test_missing_required_lists_every_property() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("api_key").required(),
        ConfigProperty::new("region").required().with_default("eu"),
        ConfigProperty::new("bucket").required(),
    ]);

    let err = ConfigResolver::default()
        .resolve(&schema, &ConfigSources::new(), &ReservedKeys::default())
        .unwrap_err();

    assert_eq!(
        err,
        ConfigError::MissingRequired(vec!["api_key".into(), "bucket".into()])
    );
    assert!(err.to_string().contains("api_key, bucket"));
}

#[test]
fn test_invalid_number() {
    let schema = ConfigSchema::new(vec![
        ConfigProperty::new("ratio").with_type(PropertyType::Number),
    ]);
    let err = ConfigResolver::default()
        .resolve(
            &schema,
            &ConfigSources::new().with_config("ratio", "abc"),
            &ReservedKeys::default(),
        )
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { .. }));
}

// ── Determinism ────────────────────────────────────────────────────

#[test]
fn test_repeated_resolution_is_identical() {
    let template = Template::from_json(
        "filesystem",
        r#"{
            "name": "Filesystem",
            "image": "example/fs:latest",
            "config_schema": {
                "properties": {
                    "allowed_dirs": {"type": "string", "volume_mount": true, "command_arg": true},
                    "log_level": {"type": "string", "default": "info", "env_mapping": "LOG_LEVEL"},
                    "read_only": {"type": "boolean", "default": false, "env_mapping": "READ_ONLY"}
                },
                "required": ["allowed_dirs"]
            }
        }"#,
    )
    .unwrap();
    let sources = ConfigSources::new()
        .with_config("allowed_dirs", "/x /y")
        .with_env("ZED", "1")
        .with_env("ALPHA", "2");

    let first = resolve(&template.config_schema, &sources);
    let second = resolve(&template.config_schema, &sources);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.env()["READ_ONLY"], "false");
}
