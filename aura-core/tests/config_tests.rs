//! Loading configuration files from disk

use aura_core::config::{self, ConfigError, ValidationErrorKind};
use aura_core::gateway;
use aura_core::providers::ProviderKind;
use std::io::Write;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};

fn write_config(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

const YAML: &str = r#"
version: "0.1"
server:
  host: 127.0.0.1
  port: 9090
providers:
  - id: primary
    kind: openai
    api_key: ${AURA_IT_OPENAI_KEY}
    models: [gpt-4o, gpt-4o-mini]
    default_model: gpt-4o-mini
    priority: 1
  - id: backup
    kind: deepseek
    api_key: sk-deepseek
    models: ["*"]
    default_model: deepseek-chat
    priority: 2
  - id: parked
    kind: gemini
    api_key: g-key
    models: [gemini-1.5-flash]
    enabled: false
routing:
  default_timeout_ms: 15000
health:
  degrade_after: 1
  cooldown_ms: 5000
"#;

#[test]
fn test_load_yaml_with_env_interpolation() {
    std::env::set_var("AURA_IT_OPENAI_KEY", "sk-from-env");
    let file = write_config(".yaml", YAML);

    let config = config::load_from_path(file.path()).unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 9090);
    assert_eq!(config.providers.len(), 3);
    assert_eq!(config.providers[0].api_key.expose_secret(), "sk-from-env");
    assert_eq!(config.providers[1].kind, ProviderKind::DeepSeek);
    assert!(!config.providers[2].enabled);
    assert_eq!(
        config.routing.dispatch_config().default_timeout,
        Duration::from_secs(15)
    );
    assert_eq!(config.health.policy().cooldown, Duration::from_secs(5));

    let dispatcher = gateway::build_dispatcher(&config).unwrap();
    let snapshot = dispatcher.registry().snapshot();
    let ids: Vec<_> = snapshot.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["primary", "backup"]);
    assert_eq!(snapshot[0].default_model, "gpt-4o-mini");
}

#[test]
fn test_shipped_example_config_loads() {
    for (name, value) in [
        ("OPENAI_API_KEY", "sk-openai"),
        ("ANTHROPIC_API_KEY", "sk-ant"),
        ("GEMINI_API_KEY", "g-key"),
        ("DEEPSEEK_API_KEY", "sk-deepseek"),
    ] {
        std::env::set_var(name, value);
    }
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../aura.example.yaml");

    let config = config::load_from_path(path).unwrap();

    let ids: Vec<_> = config.providers.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["openai", "claude", "gemini", "deepseek"]);
    assert_eq!(config.providers[1].api_key.expose_secret(), "sk-ant");

    let dispatcher = gateway::build_dispatcher(&config).unwrap();
    assert_eq!(dispatcher.registry().snapshot().len(), 3);
}

#[test]
fn test_missing_env_var_fails_load() {
    let file = write_config(
        ".yml",
        r#"
version: "0.1"
providers:
  - id: a
    kind: openai
    api_key: ${AURA_IT_NEVER_SET}
    models: [m]
"#,
    );

    match config::load_from_path(file.path()) {
        Err(ConfigError::EnvVarNotFound { var }) => assert_eq!(var, "AURA_IT_NEVER_SET"),
        other => panic!("Expected EnvVarNotFound, got {:?}", other),
    }
}

#[test]
fn test_load_json() {
    let file = write_config(
        ".json",
        r#"{
  "version": "0.1",
  "providers": [
    {"id": "claude", "kind": "anthropic", "api_key": "k", "models": ["claude-3-5-haiku"]}
  ],
  "routing": {"on_permanent_error": "fallback"}
}"#,
    );

    let config = config::load_from_path(file.path()).unwrap();
    assert_eq!(config.providers[0].kind, ProviderKind::Anthropic);
    assert_eq!(config.providers[0].priority, 100);
    assert_eq!(config.server.port, 8080);
}

#[test]
fn test_unsupported_extension() {
    let file = write_config(".toml", "version = \"0.1\"");
    assert!(matches!(
        config::load_from_path(file.path()),
        Err(ConfigError::UnsupportedFormat { .. })
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    assert!(matches!(
        config::load_from_path(&path),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn test_parse_error_reports_location() {
    let file = write_config(".yaml", "version: \"0.1\"\nproviders: [\n");
    match config::load_from_path(file.path()) {
        Err(ConfigError::Parse { line, .. }) => assert!(line.is_some()),
        other => panic!("Expected Parse error, got {:?}", other),
    }
}

fn validation_error(yaml: &str) -> aura_core::config::ValidationError {
    let file = write_config(".yaml", yaml);
    match config::load_from_path(file.path()) {
        Err(ConfigError::Validation(err)) => err,
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[test]
fn test_wrong_version_rejected() {
    let err = validation_error(
        r#"
version: "2.0"
providers:
  - {id: a, kind: openai, api_key: k, models: [m]}
"#,
    );
    assert_eq!(err.field_path, "version");
    assert!(matches!(err.kind, ValidationErrorKind::InvalidVersion { .. }));
}

#[test]
fn test_duplicate_provider_ids_rejected() {
    let err = validation_error(
        r#"
version: "0.1"
providers:
  - {id: a, kind: openai, api_key: k, models: [m]}
  - {id: a, kind: gemini, api_key: k, models: [g]}
"#,
    );
    assert_eq!(err.field_path, "providers[1].id");
}

#[test]
fn test_bad_base_url_rejected() {
    let err = validation_error(
        r#"
version: "0.1"
providers:
  - {id: a, kind: openai, api_key: k, models: [m], base_url: "ftp://example.com"}
"#,
    );
    assert_eq!(err.field_path, "providers[0].base_url");
    assert!(matches!(err.kind, ValidationErrorKind::InvalidUrl { .. }));
}

#[test]
fn test_default_model_must_be_listed() {
    let err = validation_error(
        r#"
version: "0.1"
providers:
  - {id: a, kind: openai, api_key: k, models: [m], default_model: other}
"#,
    );
    assert_eq!(err.field_path, "providers[0].default_model");
}

#[test]
fn test_all_disabled_rejected() {
    let err = validation_error(
        r#"
version: "0.1"
providers:
  - {id: a, kind: openai, api_key: k, models: [m], enabled: false}
"#,
    );
    assert_eq!(err.field_path, "providers");
}

#[test]
fn test_grace_must_fit_in_budget() {
    let err = validation_error(
        r#"
version: "0.1"
providers:
  - {id: a, kind: openai, api_key: k, models: [m]}
routing:
  default_timeout_ms: 100
  cancel_grace_ms: 100
"#,
    );
    assert_eq!(err.field_path, "routing.cancel_grace_ms");
}
