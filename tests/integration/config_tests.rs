use crate::env_lock;
use refdupe::config::{Config, ConfigError};
use refdupe::output::OutputFormat;
use refdupe::scanner::HashAlgorithm;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_defaults_without_sources() {
    let _lock = env_lock();
    let config: Config = Config::figment(None).extract().unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_toml_file_overrides_defaults() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
output = "/var/log/refdupe.log"
format = "json"
algorithm = "sha256"
min_size = 4096
skip_hidden = true
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.output, "/var/log/refdupe.log");
    assert_eq!(config.format, OutputFormat::Json);
    assert_eq!(config.algorithm, HashAlgorithm::Sha256);
    assert_eq!(config.min_size, Some(4096));
    assert!(config.skip_hidden);
    assert!(config.prefilter);
}

#[test]
fn test_environment_overrides_file() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "format = \"json\"\nprefilter = true\n").unwrap();

    std::env::set_var("REFDUPE_FORMAT", "text");
    std::env::set_var("REFDUPE_PREFILTER", "false");
    let config = Config::load(Some(&path));
    std::env::remove_var("REFDUPE_FORMAT");
    std::env::remove_var("REFDUPE_PREFILTER");

    let config = config.unwrap();
    assert_eq!(config.format, OutputFormat::Text);
    assert!(!config.prefilter);
}

#[test]
fn test_explicit_missing_file_is_an_error() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let result = Config::load(Some(&dir.path().join("absent.toml")));
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_invalid_value_is_an_error() {
    let _lock = env_lock();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "algorithm = \"md5\"\n").unwrap();

    let result = Config::load(Some(&path));
    assert!(matches!(result, Err(ConfigError::Load(_))));
}
