//! Configuration for the SLP indexer.

mod config;

pub use config::{
    BitcoindConfig, BlacklistConfig, Config, IndexerConfig, LoggingConfig, StoreConfig,
    WebhookConfig, DEFAULT_BLACKLIST,
};
