//! Error types for initialization and configuration.

use std::{io, path::PathBuf};

use slp_btcio::ClientError;
use slp_db_types::DbError;
use slp_index::IndexerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum InitError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("toml: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("config: {0}")]
    MalformedConfig(#[from] ConfigError),

    #[error("log dir is not valid utf-8: {0:?}")]
    InvalidLogDirPath(PathBuf),

    #[error("runtime: {0}")]
    RuntimeBuild(#[source] io::Error),

    #[error("node client: {0}")]
    BitcoinClientCreation(#[from] ClientError),

    #[error("store: {0}")]
    StorageCreation(#[from] DbError),

    #[error("indexer: {0}")]
    Indexer(#[from] IndexerError),
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// Tried to traverse into a primitive.
    #[error("can't traverse into non-table key: {0}")]
    TraverseNonTableAt(String),

    /// Invalid override string.
    #[error("invalid override: '{0}'")]
    InvalidOverride(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
