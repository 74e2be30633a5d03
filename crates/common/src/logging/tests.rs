use std::path::PathBuf;

use super::{format_service_name, types::*, Rotation};

fn has_attr(config: &LoggerConfig, key: &str, value: &str) -> bool {
    config
        .build_resource()
        .iter()
        .any(|(k, v)| k.as_str() == key && v.as_str() == value)
}

#[test]
fn test_resource_minimal() {
    let config = LoggerConfig::new("slp-indexer".to_string());
    assert!(has_attr(&config, "service.name", "slp-indexer"));
    assert!(!config
        .build_resource()
        .iter()
        .any(|(k, _)| k.as_str() == "service.version"));
}

#[test]
fn test_resource_with_version_and_attributes() {
    let config = LoggerConfig::new("slp-indexer".to_string())
        .with_service_version("0.1.0".to_string())
        .add_resource_attribute("chain", "bch".to_string());

    assert!(has_attr(&config, "service.version", "0.1.0"));
    assert!(has_attr(&config, "chain", "bch"));
}

#[test]
fn test_builders() {
    let file = FileLoggingConfig::new(PathBuf::from("/var/log/slp"), "indexer".to_string())
        .with_rotation(Rotation::HOURLY)
        .with_json_format(true);
    let config = LoggerConfig::new("svc".to_string())
        .with_json_logging(true)
        .with_file_logging(file)
        .with_otlp(OtlpExportConfig::new("http://localhost:4317".to_string()));

    assert!(config.stdout.json_format);
    let file = config.file.unwrap();
    assert!(file.json_format);
    assert_eq!(file.rotation, Rotation::HOURLY);
    assert_eq!(config.otlp.unwrap().timeout.as_secs(), 10);
}

#[test]
fn test_format_service_name() {
    assert_eq!(format_service_name("slp-indexer", None), "slp-indexer");
    assert_eq!(
        format_service_name("slp-indexer", Some("mainnet")),
        "slp-indexer%mainnet"
    );
}
