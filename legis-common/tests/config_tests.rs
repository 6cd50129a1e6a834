//! Configuration resolution tests
//!
//! Covers the resolution priority (explicit path, environment, default file,
//! compiled defaults) and graceful degradation for missing files.
//!
//! Tests that touch LEGIS_CONFIG are marked #[serial] so they never race on
//! the process environment.

use legis_common::config::{ConfigResolver, ConfigSource, IngestConfig, CONFIG_ENV_VAR};
use legis_common::Error;
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_explicit_path_wins_over_environment() {
    let explicit = write_config("[batch]\nmax_operations = 10\n");
    let from_env = write_config("[batch]\nmax_operations = 20\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let resolver = ConfigResolver::new(Some(explicit.path().to_path_buf()));
    let (config, source) = resolver.load().unwrap();

    assert_eq!(config.batch.max_operations, 10);
    assert_eq!(source, ConfigSource::CommandLine(explicit.path().to_path_buf()));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_environment_path_is_used() {
    let from_env = write_config("[pacing]\npause_between_requests_ms = 5\n");
    env::set_var(CONFIG_ENV_VAR, from_env.path());

    let (config, source) = ConfigResolver::new(None).load().unwrap();

    assert_eq!(config.pacing.pause_between_requests_ms, 5);
    assert!(matches!(source, ConfigSource::Environment(_)));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_environment_file_falls_back_to_defaults() {
    env::set_var(CONFIG_ENV_VAR, "/nonexistent/legis/config.toml");

    let (config, source) = ConfigResolver::new(None).load().unwrap();

    assert_eq!(config, IngestConfig::default());
    assert!(matches!(source, ConfigSource::Environment(_)));

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_error() {
    env::remove_var(CONFIG_ENV_VAR);

    let resolver = ConfigResolver::new(Some("/nonexistent/legis.toml".into()));
    let err = resolver.load().unwrap_err();

    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_malformed_file_is_error() {
    let broken = write_config("[retry]\nmax_attempts = \"three\"\n");

    let err = ConfigResolver::new(Some(broken.path().to_path_buf()))
        .load()
        .unwrap_err();

    assert!(err.to_string().contains("Parse TOML failed"));
}

#[test]
fn test_full_config_round_trips_through_toml() {
    let content = r#"
        [batch]
        max_operations = 100
        pause_between_batches_ms = 50

        [retry]
        max_attempts = 5
        delay_ms = 200

        [progress]
        extract = { start = 0, end = 60 }
        transform = { start = 60, end = 80 }
        load = { start = 80, end = 100 }

        [upstream]
        base_url = "https://api.example.org/v1"
        id_field = "legislator_id"

        [store]
        database_path = "/tmp/legis/documents.db"
    "#;

    let config = IngestConfig::from_toml_str(content).unwrap();

    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.progress.extract.end, 60);
    assert_eq!(config.upstream.id_field, "legislator_id");
    assert_eq!(
        config.store.database_path(),
        std::path::PathBuf::from("/tmp/legis/documents.db")
    );
    assert!(config.validate().is_empty());
}
