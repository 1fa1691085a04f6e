//! Tests for config functionality.

use crate::config::{Config, ENV_LOCK_TTL_MS, ENV_RUNNER_ENABLED, IdFormatConfig};
use serial_test::serial;
use std::collections::HashMap;
use std::time::Duration;
use tempfile::TempDir;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_default_config() {
    let config = Config::default();

    assert!(!config.runner_enabled);
    assert_eq!(config.poll_interval_ms, 30_000);
    assert_eq!(config.task_timeout_secs, 600);
    assert_eq!(config.lock_ttl_ms, 1_800_000);
    assert_eq!(config.lock_retry.attempts, 5);
    assert!(config.actions.is_empty());
    assert!(config.id_formats.is_empty());
}

#[test]
fn test_parse_empty_yaml_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
runner_enabled: true
poll_interval_ms: 500
actions:
  demo: "echo {target}"
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert!(config.runner_enabled);
    assert_eq!(config.poll_interval(), Duration::from_millis(500));
    assert_eq!(config.actions.get("demo").unwrap(), "echo {target}");
    // Unspecified values keep their defaults
    assert_eq!(config.task_timeout_secs, 600);
    assert_eq!(config.lock_retry.max_backoff_ms, 2_000);
}

#[test]
fn test_parse_id_formats() {
    let yaml = r#"
id_formats:
  plan:
    infix: PLN
    width: 5
  card:
    width: 4
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(
        config.id_formats.get("plan"),
        Some(&IdFormatConfig {
            infix: Some("PLN".to_string()),
            width: 5
        })
    );
    assert_eq!(config.id_formats.get("card").unwrap().infix, None);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
lock_ttl_ms: 1000
some_future_setting: 42
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.lock_ttl(), Duration::from_secs(1));
}

#[test]
fn test_validate_rejects_zero_values() {
    for yaml in [
        "poll_interval_ms: 0",
        "task_timeout_secs: 0",
        "lock_ttl_ms: 0",
        "lock_retry:\n  attempts: 0",
    ] {
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(
            err.to_string().contains("must be greater than 0"),
            "unexpected error for {:?}: {}",
            yaml,
            err
        );
    }
}

#[test]
fn test_validate_rejects_bad_id_format() {
    let err = Config::from_yaml("id_formats:\n  card:\n    width: 0").unwrap_err();
    assert!(err.to_string().contains("width"));

    let err = Config::from_yaml("id_formats:\n  idea:\n    infix: 'O-P'").unwrap_err();
    assert!(err.to_string().contains("alphanumeric"));

    let err = Config::from_yaml("id_formats:\n  idea:\n    infix: ''").unwrap_err();
    assert!(err.to_string().contains("alphanumeric"));
}

#[test]
fn test_overrides_replace_file_values() {
    let mut config = Config::from_yaml("poll_interval_ms: 500").unwrap();
    config
        .apply_overrides(lookup_from(&[
            ("DOCKET_RUNNER_ENABLED", "yes"),
            ("DOCKET_POLL_INTERVAL_MS", "250"),
            ("DOCKET_TASK_TIMEOUT_SECS", "5"),
            ("DOCKET_LOCK_TTL_MS", "1000"),
        ]))
        .unwrap();

    assert!(config.runner_enabled);
    assert_eq!(config.poll_interval_ms, 250);
    assert_eq!(config.task_timeout(), Duration::from_secs(5));
    assert_eq!(config.lock_ttl_ms, 1000);
}

#[test]
fn test_overrides_reject_garbage() {
    let mut config = Config::default();
    let err = config
        .apply_overrides(lookup_from(&[("DOCKET_RUNNER_ENABLED", "maybe")]))
        .unwrap_err();
    assert!(err.to_string().contains("DOCKET_RUNNER_ENABLED"));

    let err = config
        .apply_overrides(lookup_from(&[("DOCKET_POLL_INTERVAL_MS", "-5")]))
        .unwrap_err();
    assert!(err.to_string().contains("DOCKET_POLL_INTERVAL_MS"));
}

#[test]
fn test_retry_policy_from_config() {
    let config = Config::from_yaml(
        "lock_retry:\n  attempts: 3\n  initial_backoff_ms: 10\n  max_backoff_ms: 15",
    )
    .unwrap();
    let policy = config.retry_policy();

    assert_eq!(policy.attempts, 3);
    assert_eq!(policy.backoff_delay(0), Duration::from_millis(10));
    assert_eq!(policy.backoff_delay(4), Duration::from_millis(15));
}

#[test]
fn test_to_yaml_roundtrip() {
    let mut config = Config::default();
    config
        .actions
        .insert("demo".to_string(), "echo {target}".to_string());

    let yaml = config.to_yaml().unwrap();
    assert_eq!(Config::from_yaml(&yaml).unwrap(), config);
}

#[test]
#[serial]
fn test_load_missing_file_uses_defaults_and_env() {
    let temp_dir = TempDir::new().unwrap();
    // SAFETY: serialized with other env-mutating tests.
    unsafe {
        std::env::set_var(ENV_RUNNER_ENABLED, "true");
        std::env::set_var(ENV_LOCK_TTL_MS, "2500");
    }

    let config = Config::load(temp_dir.path().join("config.yaml"));

    unsafe {
        std::env::remove_var(ENV_RUNNER_ENABLED);
        std::env::remove_var(ENV_LOCK_TTL_MS);
    }

    let config = config.unwrap();
    assert!(config.runner_enabled);
    assert_eq!(config.lock_ttl_ms, 2500);
}

#[test]
#[serial]
fn test_load_reads_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "task_timeout_secs: 42\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.task_timeout_secs, 42);
}
