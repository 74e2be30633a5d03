//! CLI argument parsing and environment variable handling.

use std::{env, path::PathBuf};

use argh::FromArgs;

use crate::errors::*;

/// Any non-empty value turns the token blacklist off.
const DISABLE_BLACKLIST_VAR: &str = "DISABLE_BLACKLIST";

/// Configs overridable by environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct EnvArgs {
    disable_blacklist: bool,
}

impl EnvArgs {
    /// Loads environment variables that should override the config.
    pub(crate) fn from_env() -> Self {
        Self {
            disable_blacklist: env::var(DISABLE_BLACKLIST_VAR).is_ok_and(|v| !v.is_empty()),
        }
    }

    /// Get strings of overrides gathered from env.
    pub(crate) fn get_overrides(&self) -> Vec<String> {
        let mut overrides = Vec::new();
        if self.disable_blacklist {
            overrides.push("blacklist.disabled=true".to_owned());
        }
        overrides
    }
}

#[derive(Clone, Debug, FromArgs)]
#[argh(description = "SLP token indexer")]
pub(crate) struct Args {
    // Config non-overriding args
    #[argh(option, short = 'c', description = "path to configuration")]
    pub config: PathBuf,

    // Config overriding args
    /// Node rpc url that will override the one in the config toml.
    #[argh(option, description = "node rpc url")]
    pub rpc_url: Option<String>,

    /// Store service url that will override the one in the config toml.
    #[argh(option, description = "store service url")]
    pub store_url: Option<String>,

    /// Height the first run starts from.
    #[argh(option, description = "start block height for a fresh store")]
    pub start_height: Option<u64>,

    #[argh(option, description = "directory for rotated log files")]
    pub log_dir: Option<PathBuf>,

    /// Other generic overrides to the config toml.
    /// Will be used, for example, as `-o indexer.backup_epoch=500 -o webhook.url=http://hook`
    #[argh(option, short = 'o', description = "generic config overrides")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Get strings of overrides gathered from user and internal attributes.
    pub(crate) fn get_all_overrides(&self) -> Result<Vec<String>, InitError> {
        let mut overrides = self.overrides.clone();
        overrides.extend_from_slice(&self.get_internal_overrides()?);
        Ok(overrides)
    }

    /// Overrides passed directly as args attributes.
    fn get_internal_overrides(&self) -> Result<Vec<String>, InitError> {
        let mut overrides = Vec::new();
        if let Some(rpc_url) = &self.rpc_url {
            overrides.push(format!("bitcoind.rpc_url={rpc_url}"));
        }
        if let Some(store_url) = &self.store_url {
            overrides.push(format!("store.url={store_url}"));
        }
        if let Some(height) = self.start_height {
            overrides.push(format!("indexer.start_block_height={height}"));
        }
        if let Some(log_dir) = &self.log_dir {
            let dir = log_dir
                .to_str()
                .ok_or_else(|| InitError::InvalidLogDirPath(log_dir.clone()))?;
            overrides.push(format!("logging.log_dir={dir}"));
        }

        Ok(overrides)
    }
}
