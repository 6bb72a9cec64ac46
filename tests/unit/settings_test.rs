//! Unit tests for configuration loading

use akashgen_gateway::config::Settings;
use std::io::Write;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings::load_from_path(dir.path().join("absent.toml")).unwrap();

    assert_eq!(settings.server.port, 6571);
    assert_eq!(settings.admission.max_concurrent, 10);
    assert_eq!(settings.polling.interval_ms, 1000);
    assert_eq!(
        settings.upstream.preferred_gpus,
        vec!["RTX4090", "A10", "A100", "V100-32Gi", "H100"]
    );
}

#[test]
fn test_load_file_overrides() {
    let file = write_config(
        r#"
[server]
port = 7000

[upstream]
status_url = "http://localhost:9000/api/status"
preferred_gpus = ["H100", "A100"]

[polling]
interval_ms = 250

[admission]
max_concurrent = 2
"#,
    );

    let settings = Settings::load_from_path(file.path()).unwrap();

    assert_eq!(settings.server.port, 7000);
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.upstream.status_url, "http://localhost:9000/api/status");
    assert_eq!(settings.upstream.preferred_gpus, vec!["H100", "A100"]);
    assert_eq!(settings.polling.interval_ms, 250);
    assert_eq!(settings.polling.max_duration_secs, 300);
    assert_eq!(settings.admission.max_concurrent, 2);
}

#[test]
fn test_load_rejects_invalid_values() {
    let file = write_config(
        r#"
[admission]
max_concurrent = 0
"#,
    );

    assert!(Settings::load_from_path(file.path()).is_err());
}
