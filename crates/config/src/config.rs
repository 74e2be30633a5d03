use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slp_primitives::TokenId;

const DEFAULT_RPC_URL: &str = "http://172.17.0.1:8332";
const DEFAULT_RPC_USER: &str = "bitcoin";
const DEFAULT_RPC_PASSWORD: &str = "password";

const DEFAULT_STORE_URL: &str = "http://localhost:5020";

/// First block that can hold an SLP transaction.
const DEFAULT_START_BLOCK_HEIGHT: u64 = 543_375;

/// Blocks between store backups; also the rollback granularity.
const DEFAULT_BACKUP_EPOCH: u64 = 1_000;

const DEFAULT_TX_RETRY_LIMIT: u32 = 10;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 1_000_000;
const DEFAULT_MAX_DAG_DEPTH: usize = 10_000;
const DEFAULT_BLOCK_POLL_INTERVAL_MS: u64 = 500;
const DEFAULT_FILTER_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RPC_RETRY_DELAY_MS: u64 = 1_000;

/// Tokens excluded from indexing unless the blacklist is disabled.
pub const DEFAULT_BLACKLIST: [&str; 5] = [
    "dd21be4532d93661e8ffe16db6535af0fb8ee1344d1fef81a193e2b4cfa9fbc9",
    "0df768b5485c72645de069b68f66d02205c26f827c608ef5ffa976266d753d50",
    "aa1cdd36ab9f4aa6284e5ff370421305887f845f076c38689bd912e372058c11",
    "7f8889682d57369ed0e32336f8b7e0ffec625a35cca183f4e81fde4e71a538a1",
    "6448381f9649ecacd8c30189cfbfee71a91b6b9738ea494fe33f8b8b51cbfca0",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoindConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_rpc_user")]
    pub rpc_user: String,
    #[serde(default = "default_rpc_password")]
    pub rpc_password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u8>,
    /// Milliseconds before the first retry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<u64>,
}

impl Default for BitcoindConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            rpc_user: default_rpc_user(),
            rpc_password: default_rpc_password(),
            retry_count: None,
            retry_interval: None,
        }
    }
}

impl BitcoindConfig {
    pub fn retry_interval_ms(&self) -> u64 {
        self.retry_interval.unwrap_or(DEFAULT_RPC_RETRY_DELAY_MS)
    }
}

/// The key-value service that holds indexer state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    #[serde(default = "default_start_block_height")]
    pub start_block_height: u64,

    #[serde(default = "default_backup_epoch")]
    pub backup_epoch: u64,

    /// Failures tolerated per transaction before the block is abandoned.
    #[serde(default = "default_tx_retry_limit")]
    pub tx_retry_limit: u32,

    /// Insertions after which the tx and token caches are cleared.
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    #[serde(default = "default_max_dag_depth")]
    pub max_dag_depth: usize,

    #[serde(default = "default_block_poll_interval_ms")]
    pub block_poll_interval_ms: u64,

    #[serde(default = "default_filter_retry_attempts")]
    pub filter_retry_attempts: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            start_block_height: DEFAULT_START_BLOCK_HEIGHT,
            backup_epoch: DEFAULT_BACKUP_EPOCH,
            tx_retry_limit: DEFAULT_TX_RETRY_LIMIT,
            cache_max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            max_dag_depth: DEFAULT_MAX_DAG_DEPTH,
            block_poll_interval_ms: DEFAULT_BLOCK_POLL_INTERVAL_MS,
            filter_retry_attempts: DEFAULT_FILTER_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistConfig {
    #[serde(default = "default_blacklist")]
    pub token_ids: Vec<TokenId>,

    #[serde(default)]
    pub disabled: bool,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            token_ids: default_blacklist(),
            disabled: false,
        }
    }
}

impl BlacklistConfig {
    /// Ids in force, taking `disabled` into account.
    pub fn active_ids(&self) -> &[TokenId] {
        if self.disabled {
            &[]
        } else {
            &self.token_ids
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Receives new pin claims.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Appended to the service name, e.g. "mainnet".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub otlp_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_format: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bitcoind: BitcoindConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub indexer: IndexerConfig,

    #[serde(default)]
    pub blacklist: BlacklistConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_owned()
}

fn default_rpc_user() -> String {
    DEFAULT_RPC_USER.to_owned()
}

fn default_rpc_password() -> String {
    DEFAULT_RPC_PASSWORD.to_owned()
}

fn default_store_url() -> String {
    DEFAULT_STORE_URL.to_owned()
}

fn default_start_block_height() -> u64 {
    DEFAULT_START_BLOCK_HEIGHT
}

fn default_backup_epoch() -> u64 {
    DEFAULT_BACKUP_EPOCH
}

fn default_tx_retry_limit() -> u32 {
    DEFAULT_TX_RETRY_LIMIT
}

fn default_cache_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_max_dag_depth() -> usize {
    DEFAULT_MAX_DAG_DEPTH
}

fn default_block_poll_interval_ms() -> u64 {
    DEFAULT_BLOCK_POLL_INTERVAL_MS
}

fn default_filter_retry_attempts() -> u32 {
    DEFAULT_FILTER_RETRY_ATTEMPTS
}

fn default_blacklist() -> Vec<TokenId> {
    DEFAULT_BLACKLIST
        .iter()
        .filter_map(|id| id.parse().ok())
        .collect()
}
