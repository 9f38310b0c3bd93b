use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use zkwatch::cli::Cli;
use zkwatch::config::{load_paths, Config, ConfigError};

#[test]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        paths_file = "/etc/zkwatch/paths.yaml"
        [registry]
        cluster_prefix = "/monitors"
        cluster_name = "prod-zookeeper-monitor"
        [status]
        enabled = false
        listen_address = "127.0.0.1:9000"
        [email]
        from_address = "alerts@example.com"
        [slack]
        timeout_seconds = 3
    "#;

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(
        config.paths_file,
        Some(PathBuf::from("/etc/zkwatch/paths.yaml"))
    );
    assert_eq!(config.registry.workspace(), "/monitors/prod-zookeeper-monitor");
    assert!(!config.status.enabled);
    assert_eq!(config.status.listen_address, "127.0.0.1:9000");
    assert_eq!(config.email.from_address, "alerts@example.com");
    assert_eq!(config.slack.timeout_seconds, 3);
}

#[test]
fn test_partial_config_keeps_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[registry]\ncluster_name = \"staging\"\n").unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.registry.workspace(), "/zk_monitor/staging");
    assert_eq!(config.log_level, "warn");
    assert!(config.status.enabled);
    assert_eq!(config.status.listen_address, "0.0.0.0:8080");
    assert_eq!(config.slack.timeout_seconds, 10);
}

#[test]
fn test_cli_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "log_level = \"info\"\n[status]\nlisten_address = \"127.0.0.1:9000\"\n[registry]\ncluster_name = \"from-file\"\n"
    )
    .unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        paths_file: Some(PathBuf::from("/tmp/paths.yaml")),
        log_level: Some("trace".to_string()),
        listen_address: Some("127.0.0.1:9999".to_string()),
        cluster_name: Some("from-cli".to_string()),
    };

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.log_level, "trace");
    assert_eq!(config.paths_file, Some(PathBuf::from("/tmp/paths.yaml")));
    assert_eq!(config.status.listen_address, "127.0.0.1:9999");
    assert_eq!(config.registry.cluster_name, "from-cli");
    // Untouched keys in the same table survive.
    assert_eq!(config.registry.cluster_prefix, "/zk_monitor");
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let cli = Cli {
        config: Some(PathBuf::from("/nonexistent/zkwatch.toml")),
        ..Default::default()
    };

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.registry.workspace(), "/zk_monitor/zkmonitor");
    assert_eq!(config.email.from_address, "zkwatch");
    assert!(config.paths_file.is_none());
}

#[test]
fn test_invalid_toml_is_an_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[slack]\ntimeout_seconds = \"soon\"\n").unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    assert!(Config::load(&cli).is_err());
}

#[test]
fn test_load_paths_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
/services/foo/min_1:
  children: 1
  cancel_timeout: 30
  alerter:
    email: you@home.com
    slack: https://hooks.slack.com/services/T000/B000/XXXX
/services/bar:
  notify_recovery: true
"#
    )
    .unwrap();

    let paths = load_paths(file.path()).unwrap();

    assert_eq!(paths.len(), 2);
    let foo = &paths["/services/foo/min_1"];
    assert_eq!(foo.children, Some(1));
    assert_eq!(foo.cancel_timeout, Some(30.0));
    assert_eq!(foo.alerter["email"], json!("you@home.com"));
    assert_eq!(
        foo.alerter["slack"],
        json!("https://hooks.slack.com/services/T000/B000/XXXX")
    );
    let bar = &paths["/services/bar"];
    assert!(bar.notify_recovery);
    assert!(bar.alerter.is_empty());
    assert_eq!(bar.cancel_timeout(), None);
}

#[test]
fn test_load_paths_missing_file() {
    let err = load_paths(&PathBuf::from("/nonexistent/paths.yaml")).unwrap_err();

    match err {
        ConfigError::Read { path, .. } => {
            assert_eq!(path, PathBuf::from("/nonexistent/paths.yaml"))
        }
        other => panic!("expected a read error, got {:?}", other),
    }
}
