//! Configuration system tests
//!
//! Tests configuration loading from disk, validation, and path expansion

mod common;

use std::fs;
use std::path::PathBuf;

use peerqueue::logging;
use peerqueue::{Error, ErrorCode, LoggingSettings, PeerQueueProvider, ProviderConfig};
use tempfile::TempDir;

use common::*;

/// Test fixture for configuration testing
struct ConfigFixture {
    temp_dir: TempDir,
    config_path: PathBuf,
}

impl ConfigFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        Self { temp_dir, config_path }
    }

    fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).unwrap();
    }

    fn load(&self) -> peerqueue::Result<ProviderConfig> {
        ProviderConfig::load(&self.config_path)
    }
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_empty_file_uses_defaults() {
    let fixture = ConfigFixture::new();
    fixture.write_config("");

    let config = fixture.load().unwrap();
    assert_eq!(config.node.local_port, 5555);
    assert!(config.node.peers.is_empty());
    assert!(config.node.can_take_work);
    assert_eq!(config.transport.send_timeout_ms, 3000);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_valid_fixture_loads() {
    let config = ProviderConfig::load(valid_config_fixture()).unwrap();

    assert_eq!(config.node.local_port, 6200);
    assert_eq!(
        config.node.peers,
        vec!["10.0.0.2:6200".to_string(), "tcp://node-c.internal:6201".to_string()]
    );
    assert_eq!(config.transport.receive_timeout_ms, 500);
    assert_eq!(config.transport.max_frame_bytes, 1_048_576);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json_format);

    assert!(PeerQueueProvider::new(config).is_ok());
}

#[test]
fn test_producer_only_node() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[node]
local_port = 7000
can_take_work = false
"#,
    );

    let config = fixture.load().unwrap();
    assert!(!config.node.can_take_work);
    assert_eq!(config.node.local_port, 7000);
}

#[test]
fn test_default_template_loads_from_disk() {
    let fixture = ConfigFixture::new();
    fixture.write_config(ProviderConfig::default_toml());

    let config = fixture.load().unwrap();
    let defaults = ProviderConfig::default();
    assert_eq!(config.node.local_port, defaults.node.local_port);
    assert_eq!(config.transport.max_frame_bytes, defaults.transport.max_frame_bytes);
    assert!(config.logging.file.is_none());
}

#[test]
fn test_saved_config_reloads() {
    let fixture = ConfigFixture::new();
    let mut config = ProviderConfig::new(6100, ["10.1.0.5:6100"], true);
    config.transport.send_timeout_ms = 900;
    fixture.write_config(&config.to_toml_string().unwrap());

    let reloaded = fixture.load().unwrap();
    assert_eq!(reloaded.node.peers, config.node.peers);
    assert_eq!(reloaded.transport.send_timeout_ms, 900);
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = ProviderConfig::load(temp_dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(err, Error::ConfigNotFound { .. }));
    assert_eq!(err.code(), ErrorCode::ConfigNotFound);
    assert!(err.suggestion().is_some());
}

#[test]
fn test_invalid_fixture_rejected() {
    let err = ProviderConfig::load(invalid_config_fixture()).unwrap_err();

    match err {
        Error::ConfigValidation { field, .. } => assert_eq!(field.as_deref(), Some("node.peers")),
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_invalid_toml_syntax() {
    let fixture = ConfigFixture::new();
    fixture.write_config("[node\nlocal_port = 1");

    let err = fixture.load().unwrap_err();
    assert!(matches!(err, Error::ConfigParse { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_wrong_value_type() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[node]
local_port = "not-a-port"
"#,
    );

    assert!(matches!(fixture.load(), Err(Error::ConfigParse { .. })));
}

#[test]
fn test_oversized_frame_limit_rejected() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[transport]
max_frame_bytes = 134217728
"#,
    );

    match fixture.load() {
        Err(Error::ConfigValidation { field, .. }) => {
            assert_eq!(field.as_deref(), Some("transport.max_frame_bytes"))
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_ipv6_peers_rejected() {
    let fixture = ConfigFixture::new();
    for peers in [r#"["::1:5555"]"#, r#"["[::1]:5555"]"#] {
        fixture.write_config(&format!("[node]\npeers = {}\n", peers));

        match fixture.load() {
            Err(Error::ConfigValidation { field, .. }) => assert_eq!(field.as_deref(), Some("node.peers")),
            other => panic!("expected {} to be rejected, got {:?}", peers, other),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Path Expansion Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_tilde_expansion_in_log_file() {
    let fixture = ConfigFixture::new();
    fixture.write_config(
        r#"
[logging]
file = "~/peerqueue/logs/node.log"
"#,
    );

    let config = fixture.load().unwrap();
    let file = config.logging.file.unwrap();
    assert!(!file.starts_with('~'), "tilde not expanded: {}", file);
    assert!(file.ends_with("peerqueue/logs/node.log"));
}

#[test]
fn test_env_var_expansion_in_log_file() {
    let fixture = ConfigFixture::new();
    std::env::set_var("PEERQUEUE_TEST_LOG_ROOT", fixture.temp_dir.path());
    fixture.write_config(
        r#"
[logging]
file = "$PEERQUEUE_TEST_LOG_ROOT/node.log"
"#,
    );

    let config = fixture.load().unwrap();
    let expected = fixture.temp_dir.path().join("node.log");
    assert_eq!(config.logging.file.map(PathBuf::from), Some(expected));

    std::env::remove_var("PEERQUEUE_TEST_LOG_ROOT");
}

// ─────────────────────────────────────────────────────────────────
// Logging Initialization
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_logging_writes_to_configured_file() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("logs");
    let settings = LoggingSettings {
        level: "debug".to_string(),
        file: Some(log_dir.join("node.log").to_string_lossy().into_owned()),
        max_files: 2,
        json_format: true,
    };

    let guards = logging::init_logging(&settings).unwrap();
    assert!(guards.has_file_output());
    tracing::info!(test = "config_tests", "Logging smoke test");
    drop(guards);

    assert!(log_dir.exists());
    let written = fs::read_dir(&log_dir).unwrap().count();
    assert!(written >= 1, "no log file created in {}", log_dir.display());

    // Only one global subscriber per process
    assert!(logging::init_simple(tracing::Level::WARN).is_err());
}
