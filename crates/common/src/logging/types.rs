//! Configuration types for the logging subsystem.

use std::{path::PathBuf, time::Duration};

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::format::FmtSpan;

/// Stdout layer settings.
#[derive(Debug, Clone)]
pub struct StdoutConfig {
    pub json_format: bool,
    pub fmt_span: FmtSpan,
}

impl Default for StdoutConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            fmt_span: FmtSpan::CLOSE,
        }
    }
}

/// Rolling file output.
#[derive(Debug, Clone)]
pub struct FileLoggingConfig {
    pub directory: PathBuf,
    /// e.g. "slp-indexer" produces "slp-indexer.2024-01-01"
    pub file_name_prefix: String,
    pub rotation: Rotation,
    pub json_format: bool,
}

impl FileLoggingConfig {
    pub fn new(directory: PathBuf, file_name_prefix: String) -> Self {
        Self {
            directory,
            file_name_prefix,
            rotation: Rotation::DAILY,
            json_format: false,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_json_format(mut self, json_format: bool) -> Self {
        self.json_format = json_format;
        self
    }
}

#[derive(Debug, Clone)]
pub struct OtlpExportConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl OtlpExportConfig {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Top level logger configuration.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub service_name: String,
    pub service_version: Option<String>,
    pub stdout: StdoutConfig,
    pub file: Option<FileLoggingConfig>,
    pub otlp: Option<OtlpExportConfig>,
    /// Extra resource attributes attached to exported spans.
    pub attributes: Vec<KeyValue>,
}

impl LoggerConfig {
    pub fn new(service_name: String) -> Self {
        Self {
            service_name,
            service_version: None,
            stdout: StdoutConfig::default(),
            file: None,
            otlp: None,
            attributes: Vec::new(),
        }
    }

    pub fn with_service_version(mut self, version: String) -> Self {
        self.service_version = Some(version);
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.stdout.json_format = enabled;
        self
    }

    pub fn with_file_logging(mut self, config: FileLoggingConfig) -> Self {
        self.file = Some(config);
        self
    }

    pub fn with_otlp(mut self, config: OtlpExportConfig) -> Self {
        self.otlp = Some(config);
        self
    }

    pub fn add_resource_attribute(mut self, key: &str, value: String) -> Self {
        self.attributes.push(KeyValue::new(key.to_owned(), value));
        self
    }

    /// Resource describing this process for span export.
    pub fn build_resource(&self) -> Resource {
        let mut attributes = vec![KeyValue::new("service.name", self.service_name.clone())];
        if let Some(version) = &self.service_version {
            attributes.push(KeyValue::new("service.version", version.clone()));
        }
        attributes.extend(self.attributes.iter().cloned());
        Resource::new(attributes)
    }
}
