//! Tests for layered configuration loading and saving
use std::io::Write;
use tokio_test::{assert_err, assert_ok};

use brachiosaure_solver_lib::infrastructure::{AppConfig, ConfigManager};

#[test]
fn missing_optional_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = ConfigManager::new().unwrap();
    manager.config_path = dir.path().join("absent.json");

    let config = manager.load_config().unwrap();
    let defaults = AppConfig::default();
    assert_eq!(config.challenge.base_url, defaults.challenge.base_url);
    assert_eq!(config.keygen.noise_mask, defaults.keygen.noise_mask);
    assert_eq!(config.solver.max_attempts, 0);
}

#[test]
fn explicit_file_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("absent.json"));
    assert_err!(manager.load_config());
}

#[test]
fn json_file_overrides_only_given_fields() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "challenge": {{ "base_url": "http://127.0.0.1:8000/" }},
            "solver": {{ "max_attempts": 25 }}
        }}"#
    )
    .unwrap();

    let config = ConfigManager::with_path(file.path()).load_config().unwrap();
    assert_eq!(config.challenge.base_url, "http://127.0.0.1:8000/");
    assert_eq!(config.challenge.login_url().unwrap(), "http://127.0.0.1:8000/login");
    assert_eq!(config.solver.max_attempts, 25);
    // Untouched sections keep their defaults
    assert_eq!(config.solver.attempt_interval_ms, 1000);
    assert_eq!(config.keygen.box_size, 2);
    assert!(config.validator.enabled);
}

#[test]
fn toml_file_is_accepted() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[keygen]\nbox_size = 3\nerror_correction = \"M\"\n\n[validator]\nenabled = false").unwrap();

    let config = ConfigManager::with_path(file.path()).load_config().unwrap();
    assert_eq!(config.keygen.box_size, 3);
    assert_eq!(config.keygen.error_correction, "M");
    assert!(!config.validator.enabled);
    assert_ok!(config.validate());
}

#[test]
fn invalid_value_types_are_reported() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(file, r#"{{ "keygen": {{ "noise_mask": "lots" }} }}"#).unwrap();

    assert_err!(ConfigManager::with_path(file.path()).load_config());
}

#[tokio::test]
async fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));

    let mut config = AppConfig::default();
    config.keygen.output_dir = "out".to_string();
    config.keygen.noise_mask = 3;
    config.solver.attempt_interval_ms = 2500;
    config.logging.level = "debug".to_string();
    manager.save_config(&config).await.unwrap();

    let loaded = manager.load_config().unwrap();
    assert_eq!(loaded.keygen.output_dir, "out");
    assert_eq!(loaded.keygen.noise_mask, 3);
    assert_eq!(loaded.solver.attempt_interval_ms, 2500);
    assert_eq!(loaded.logging.level, "debug");
    assert_eq!(loaded.keygen.first_image_path(), std::path::Path::new("out").join("img1.png"));
}

#[test]
fn environment_overrides_file_and_defaults() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    write!(
        file,
        r#"{{
            "challenge": {{ "base_url": "http://127.0.0.1:8000/" }},
            "solver": {{ "max_attempts": 25 }}
        }}"#
    )
    .unwrap();

    let vars: config::Map<String, String> = [
        ("BRACHIO__SOLVER__MAX_ATTEMPTS", "7"),
        ("BRACHIO__CHALLENGE__BASE_URL", "http://10.0.0.2:1337/"),
        ("BRACHIO__KEYGEN__NOISE_MASK", "3"),
        ("UNRELATED__SOLVER__MAX_ATTEMPTS", "99"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let config = assert_ok!(
        ConfigManager::with_path(file.path())
            .with_env_source(vars)
            .load_config()
    );
    assert_eq!(config.solver.max_attempts, 7);
    assert_eq!(config.challenge.base_url, "http://10.0.0.2:1337/");
    assert_eq!(config.keygen.noise_mask, 3);
    // Neither the file nor the environment touched these
    assert_eq!(config.solver.attempt_interval_ms, 1000);
    assert_eq!(config.challenge.login_path, "login");
}

#[test]
fn malformed_environment_value_is_reported() {
    let vars: config::Map<String, String> =
        [("BRACHIO__SOLVER__MAX_ATTEMPTS".to_string(), "many".to_string())]
            .into_iter()
            .collect();

    let dir = tempfile::tempdir().unwrap();
    let mut manager = ConfigManager::new().unwrap().with_env_source(vars);
    manager.config_path = dir.path().join("absent.json");
    assert_err!(manager.load_config());
}
