//! Integration tests for configuration discovery and env overrides.

use std::env;
use std::fs;
use std::sync::Mutex;

use devbridge::{Config, LuaRuntime};
use tempfile::TempDir;

// Global lock to prevent env var pollution between tests
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Point the config directory at a fresh temp dir and clear overrides.
fn setup_test_env() -> (TempDir, std::sync::MutexGuard<'static, ()>) {
    let guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp_dir = TempDir::new().expect("tempdir");

    env::remove_var("DEVBRIDGE_STRICT");
    env::remove_var("DEVBRIDGE_BOARD");
    env::set_var("DEVBRIDGE_CONFIG_DIR", temp_dir.path());

    (temp_dir, guard)
}

#[test]
fn test_config_dir_from_env() {
    let (temp_dir, _guard) = setup_test_env();
    assert_eq!(Config::config_dir().expect("config dir"), temp_dir.path());
}

#[test]
fn test_load_without_file_uses_defaults() {
    let (_temp_dir, _guard) = setup_test_env();
    let config = Config::load().expect("load");
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_reads_file_and_applies_overrides() {
    let (temp_dir, _guard) = setup_test_env();
    fs::write(
        temp_dir.path().join("config.json"),
        serde_json::json!({
            "board": "from-file",
            "devices": [
                { "name": "thermo", "class": "SENSE_TEMP", "values": [18.25], "writable": false }
            ]
        })
        .to_string(),
    )
    .expect("write config");

    env::set_var("DEVBRIDGE_STRICT", "1");
    env::set_var("DEVBRIDGE_BOARD", "from-env");
    let config = Config::load().expect("load");
    env::remove_var("DEVBRIDGE_STRICT");
    env::remove_var("DEVBRIDGE_BOARD");

    assert!(config.strict);
    assert_eq!(config.board, "from-env");
    assert_eq!(config.devices.len(), 1);

    let rt = LuaRuntime::from_config(&config).expect("Should create runtime");
    assert!(rt.is_strict());
    let (board, temp): (String, f64) = rt
        .lua()
        .load("return sys.BOARD, saul.thermo:read()")
        .eval()
        .expect("eval");
    assert_eq!(board, "from-env");
    assert!((temp - 18.25).abs() < 1e-9);
}

#[test]
fn test_strict_runtime_from_env_propagates_errors() {
    let (_temp_dir, _guard) = setup_test_env();
    env::set_var("DEVBRIDGE_STRICT", "1");
    let config = Config::load().expect("load");
    env::remove_var("DEVBRIDGE_STRICT");

    let rt = LuaRuntime::from_config(&config).expect("Should create runtime");
    assert!(rt.load_string("bad", "local x = nil; x.y = 1").is_err());
}
