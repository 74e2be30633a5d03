//! Configuration loading and construction of the indexer's collaborators.

use std::{fs, path::Path, sync::Arc, time::Duration};

use slp_btcio::{NodeRpc, RpcClient};
use slp_common::RetryPolicy;
use slp_config::Config;
use slp_db_store_http::{open_http_backend, HttpBackend};
use slp_index::{Blacklist, BlockIndexer, BlockIndexerBuilder, HttpWebhook};
use toml::value::Table;
use tracing::*;

use crate::{args::*, errors::*};

/// Load config early for logging initialization
pub(crate) fn load_config_early(args: &Args) -> Result<Config, InitError> {
    let config_toml = load_config_from_path(&args.config)?;

    let env_args = EnvArgs::from_env();
    let mut override_strs = env_args.get_overrides();
    override_strs.extend_from_slice(&args.get_all_overrides()?);

    apply_config_overrides(config_toml, &override_strs)
}

fn load_config_from_path(path: &Path) -> Result<toml::Value, InitError> {
    let config_str = fs::read_to_string(path)?;
    toml::from_str(&config_str).map_err(InitError::TomlParse)
}

fn apply_config_overrides(
    mut config_toml: toml::Value,
    override_strs: &[String],
) -> Result<Config, InitError> {
    let overrides = override_strs
        .iter()
        .map(|o| parse_override(o))
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let table = config_toml
        .as_table_mut()
        .ok_or_else(|| ConfigError::TraverseNonTableAt("<root>".to_owned()))?;

    for (path, val) in overrides {
        apply_override(&path, val, table)?;
    }

    let config = config_toml
        .try_into::<Config>()
        .map_err(InitError::TomlParse)?;

    validate_config(config)
}

/// Splits `key.path=value`. The value is read as a TOML scalar and falls back to a string.
fn parse_override(override_str: &str) -> Result<(String, toml::Value), ConfigError> {
    let (key, value) = override_str
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidOverride(override_str.to_owned()))?;

    let key = key.trim();
    if key.is_empty() || key.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidOverride(override_str.to_owned()));
    }

    Ok((key.to_owned(), parse_value(value.trim())))
}

fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<Table>(&format!("v = {raw}"))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_owned()))
}

/// Sets `val` at the dotted `path`, creating intermediate tables as needed.
fn apply_override(path: &str, val: toml::Value, table: &mut Table) -> Result<(), ConfigError> {
    match path.split_once('.') {
        None => {
            table.insert(path.to_owned(), val);
            Ok(())
        }
        Some((head, rest)) => {
            let child = table
                .entry(head.to_owned())
                .or_insert(toml::Value::Table(Table::new()));
            let child = child
                .as_table_mut()
                .ok_or_else(|| ConfigError::TraverseNonTableAt(head.to_owned()))?;
            apply_override(rest, val, child)
        }
    }
}

fn validate_config(config: Config) -> Result<Config, InitError> {
    if config.indexer.backup_epoch == 0 {
        return Err(ConfigError::InvalidValue {
            key: "indexer.backup_epoch",
            reason: "must be positive".to_owned(),
        }
        .into());
    }
    if config.indexer.cache_max_entries == 0 {
        return Err(ConfigError::InvalidValue {
            key: "indexer.cache_max_entries",
            reason: "must be positive".to_owned(),
        }
        .into());
    }
    if config.store.url.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "store.url",
            reason: "empty".to_owned(),
        }
        .into());
    }
    Ok(config)
}

pub(crate) fn init_store(config: &Config) -> Result<Arc<HttpBackend>, InitError> {
    let timeout = config.store.timeout_ms.map(Duration::from_millis);
    let db = open_http_backend(&config.store.url, timeout)?;
    info!(url = %config.store.url, "connected store client");
    Ok(db)
}

/// Bitcoin client initialization
pub(crate) fn create_bitcoin_rpc_client(config: &Config) -> Result<Arc<dyn NodeRpc>, InitError> {
    let bitcoind = &config.bitcoind;
    let client = RpcClient::new(
        bitcoind.rpc_url.clone(),
        bitcoind.rpc_user.clone(),
        bitcoind.rpc_password.clone(),
    )?;
    Ok(Arc::new(client))
}

fn rpc_retry_policy(config: &Config) -> RetryPolicy {
    let policy = RetryPolicy::default().with_base_delay_ms(config.bitcoind.retry_interval_ms());
    match config.bitcoind.retry_count {
        Some(count) => policy.with_max_retries(u32::from(count)),
        None => policy,
    }
}

pub(crate) fn init_indexer(
    config: &Config,
    db: Arc<HttpBackend>,
    rpc: Arc<dyn NodeRpc>,
) -> Result<BlockIndexer<HttpBackend>, InitError> {
    let blacklist = Blacklist::from_config(&config.blacklist);
    if config.blacklist.disabled {
        warn!("token blacklist disabled");
    } else {
        info!(tokens = blacklist.len(), "token blacklist loaded");
    }

    let mut builder = BlockIndexerBuilder::new(db, rpc, config.indexer.clone())
        .with_blacklist(blacklist)
        .with_rpc_retry(rpc_retry_policy(config));

    if let Some(url) = &config.webhook.url {
        info!(%url, "pin claim webhook enabled");
        builder = builder.with_webhook(Arc::new(HttpWebhook::new(url.clone())?));
    }

    Ok(builder.build())
}
