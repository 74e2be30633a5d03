//! Logging setup for binaries from their config section.

use std::path::PathBuf;

use tracing::info;

use super::{
    format_service_name, init, FileLoggingConfig, LoggerConfig, LoggingError, OtlpExportConfig,
};

#[derive(Debug)]
pub struct LoggingInitConfig<'a> {
    pub service_base_name: &'a str,
    /// e.g. "mainnet" or "dev"
    pub service_label: Option<&'a str>,
    pub service_version: Option<&'a str>,
    pub otlp_url: Option<&'a str>,
    pub log_dir: Option<&'a PathBuf>,
    pub log_file_prefix: Option<&'a str>,
    pub json_format: Option<bool>,
}

pub fn init_logging_from_config(config: LoggingInitConfig<'_>) -> Result<(), LoggingError> {
    let service_name = format_service_name(config.service_base_name, config.service_label);
    let mut lconfig = LoggerConfig::new(service_name);

    if let Some(version) = config.service_version {
        lconfig = lconfig.with_service_version(version.to_owned());
    }

    if let Some(url) = config.otlp_url {
        lconfig = lconfig.with_otlp(OtlpExportConfig::new(url.to_owned()));
    }

    let file_config = config.log_dir.map(|dir| {
        let prefix = config
            .log_file_prefix
            .unwrap_or(config.service_base_name)
            .to_owned();
        FileLoggingConfig::new(dir.clone(), prefix)
            .with_json_format(config.json_format.unwrap_or(false))
    });
    if let Some(file_config) = &file_config {
        lconfig = lconfig.with_file_logging(file_config.clone());
    }

    if let Some(json_format) = config.json_format {
        lconfig = lconfig.with_json_logging(json_format);
    }

    init(lconfig)?;

    if let Some(url) = config.otlp_url {
        info!(%url, "using OpenTelemetry tracing output");
    }
    if let Some(file_config) = &file_config {
        info!(
            log_dir = %file_config.directory.display(),
            log_prefix = %file_config.file_name_prefix,
            "file logging enabled"
        );
    }

    Ok(())
}
