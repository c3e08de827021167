//! Tests for the config module.

use serial_test::serial;
use std::io::Write;
use swesmoke_core::config::{
    interpolate_env_vars, load_config, load_config_with_overrides, ConfigOverrides,
};
use tempfile::NamedTempFile;

#[test]
fn test_env_interpolation_basic() {
    std::env::set_var("SWESMOKE_IT_VAR", "hello");
    let result = interpolate_env_vars("value: ${SWESMOKE_IT_VAR}");
    assert_eq!(result, "value: hello");
    std::env::remove_var("SWESMOKE_IT_VAR");
}

#[test]
fn test_env_interpolation_missing_no_default() {
    std::env::remove_var("NONEXISTENT_VAR_ABC");
    let result = interpolate_env_vars("value: ${NONEXISTENT_VAR_ABC}");
    assert_eq!(result, "value: ");
}

#[test]
#[serial]
fn load_config_without_file_uses_defaults() {
    let cfg = load_config(None).unwrap();
    assert_eq!(cfg.dataset.name, "SWE-Gym/SWE-Gym");
    assert_eq!(cfg.dataset.source, "huggingface:SWE-Gym/SWE-Gym");
    assert_eq!(cfg.dataset.split, "train");
    assert_eq!(cfg.evaluator.timeout_seconds, 1800);
    assert_eq!(cfg.evaluator.model_name, "test_model");
    assert!(cfg.evaluator.modal);
    assert_eq!(cfg.output.logs_directory, "logs");
}

#[test]
#[serial]
fn load_config_merges_yaml_over_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
dataset:
  source: "local:${{SWESMOKE_IT_DATA:-instances.jsonl}}"
evaluator:
  program: python3
  timeout_seconds: 60
"#
    )
    .unwrap();

    std::env::remove_var("SWESMOKE_IT_DATA");
    let cfg = load_config(Some(file.path())).unwrap();
    assert_eq!(cfg.dataset.source, "local:instances.jsonl");
    assert_eq!(cfg.dataset.split, "train");
    assert_eq!(cfg.evaluator.program, "python3");
    assert_eq!(cfg.evaluator.timeout_seconds, 60);
    assert_eq!(
        cfg.evaluator.args,
        vec!["-m".to_string(), "swebench.harness.run_evaluation".to_string()]
    );
}

#[test]
#[serial]
fn env_then_cli_overrides_win() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "evaluator:\n  timeout_seconds: 60\n").unwrap();

    std::env::set_var("SWESMOKE_EVALUATOR__TIMEOUT_SECONDS", "120");
    std::env::set_var("SWESMOKE_OUTPUT__LOGS_DIRECTORY", "env-logs");
    let from_env = load_config(Some(file.path())).unwrap();

    let overrides = ConfigOverrides {
        timeout_seconds: Some(5),
        modal: Some(false),
        ..Default::default()
    };
    let from_cli = load_config_with_overrides(Some(file.path()), overrides).unwrap();
    std::env::remove_var("SWESMOKE_EVALUATOR__TIMEOUT_SECONDS");
    std::env::remove_var("SWESMOKE_OUTPUT__LOGS_DIRECTORY");

    assert_eq!(from_env.evaluator.timeout_seconds, 120);
    assert_eq!(from_env.output.logs_directory, "env-logs");
    assert_eq!(from_cli.evaluator.timeout_seconds, 5);
    assert!(!from_cli.evaluator.modal);
    assert_eq!(from_cli.output.logs_directory, "env-logs");
}

#[test]
#[serial]
fn load_config_rejects_zero_timeout() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "evaluator:\n  timeout_seconds: 0\n").unwrap();
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(format!("{err}").contains("timeout_seconds must be positive"));
}

#[test]
#[serial]
fn load_config_missing_file_is_error() {
    let err = load_config(Some(std::path::Path::new("/nonexistent/swesmoke.yaml"))).unwrap_err();
    assert!(format!("{err}").contains("failed to read config"));
}
