use std::path::PathBuf;
use std::time::Duration;

use devco::config::{default_data_dir, GlobalConfig};
use devco::AppError;

#[test]
fn empty_file_yields_defaults() {
    let config = GlobalConfig::from_toml_str("").expect("defaults");

    assert_eq!(config.address, ":8000");
    assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
    assert_eq!(config.default_branch_prefix, "devco/");
    assert_eq!(config.tools.devcontainer, "devcontainer");
    assert_eq!(config.tools.docker, "docker");
    assert_eq!(config.tools.git, "git");
}

#[test]
fn file_values_override_defaults() {
    let config = GlobalConfig::from_toml_str(
        r#"
address = "127.0.0.1:9000"
data_dir = "/var/lib/devco"
shutdown_timeout_seconds = 30
default_branch_prefix = "ws/"

[tools]
docker = "/usr/local/bin/podman"
"#,
    )
    .expect("valid config");

    assert_eq!(config.socket_addr().expect("addr").port(), 9000);
    assert_eq!(config.data_dir, PathBuf::from("/var/lib/devco"));
    assert_eq!(config.projects_path(), PathBuf::from("/var/lib/devco/projects.json"));
    assert_eq!(config.worktree_root(), PathBuf::from("/var/lib/devco/worktree"));
    assert_eq!(config.shutdown_timeout_seconds, 30);
    assert_eq!(config.default_branch_prefix, "ws/");
    assert_eq!(config.tools.docker, "/usr/local/bin/podman");
    assert_eq!(config.tools.git, "git");
}

#[test]
fn leading_colon_binds_all_interfaces() {
    let config = GlobalConfig::from_toml_str("address = \":8123\"").expect("valid");
    assert_eq!(
        config.socket_addr().expect("addr").to_string(),
        "0.0.0.0:8123"
    );
}

#[test]
fn zero_timeout_is_rejected() {
    let err = GlobalConfig::from_toml_str("shutdown_timeout_seconds = 0").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().contains("shutdown_timeout_seconds"));
}

#[test]
fn empty_tool_path_is_rejected() {
    let err = GlobalConfig::from_toml_str("[tools]\ngit = \"\"").unwrap_err();
    assert!(err.to_string().contains("tools.git"));
}

#[test]
fn unparseable_address_is_rejected() {
    let err = GlobalConfig::from_toml_str("address = \"not-an-address\"").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = GlobalConfig::from_toml_str("address = ").unwrap_err();
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn load_from_missing_path_is_a_config_error() {
    let err = GlobalConfig::load_from_path("/definitely/not/here.toml").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "address = \"127.0.0.1:7000\"").expect("write");

    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.address, "127.0.0.1:7000");
}

#[test]
#[serial_test::serial]
#[allow(unsafe_code)]
fn data_dir_follows_xdg_data_home() {
    unsafe {
        std::env::set_var("XDG_DATA_HOME", "/tmp/xdg-data");
    }
    assert_eq!(default_data_dir(), PathBuf::from("/tmp/xdg-data/devco"));

    unsafe {
        std::env::set_var("XDG_DATA_HOME", "");
    }
    assert!(default_data_dir().ends_with(".local/share/devco"));

    unsafe {
        std::env::remove_var("XDG_DATA_HOME");
    }
    assert!(default_data_dir().ends_with(".local/share/devco"));
}
