use std::io::Write;

use navgraph_core::config::AppConfig;
use navgraph_core::NavError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[execution]
retry_budget = 4
action_delay_ms = 150

[session]
idle_timeout_secs = 120
sweep_interval_secs = 15

[graphs]
dir = "/srv/navgraph/trees"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.execution.retry_budget, 4);
    assert_eq!(config.execution.action_delay_ms, 150);
    assert_eq!(config.session.idle_timeout_secs, 120);
    assert_eq!(config.session.sweep_interval().as_secs(), 15);
    assert_eq!(config.graph_dir(), std::path::PathBuf::from("/srv/navgraph/trees"));
}

#[test]
fn test_missing_sections_use_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[execution]\naction_delay_ms = 25\n").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.execution.retry_budget, 2);
    assert_eq!(config.execution.action_delay_ms, 25);
    assert_eq!(config.session.idle_timeout_secs, 600);
    assert_eq!(config.session.sweep_interval_secs, 60);
    assert_eq!(config.graphs.dir, "graphs");
}

#[test]
fn test_env_var_expansion() {
    std::env::set_var("NAVGRAPH_TEST_GRAPH_DIR", "/tmp/navgraph-env-trees");
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[graphs]\ndir = \"${NAVGRAPH_TEST_GRAPH_DIR}\"\n")
        .expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.graphs.dir, "/tmp/navgraph-env-trees");
}

#[test]
fn test_missing_file_is_config_not_found() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, NavError::ConfigNotFound(_)));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[execution\nretry_budget = ").expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(matches!(err, NavError::Config(_)));
}
