use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::*;

use crate::{
    error::{ClientError, ClientResult},
    traits::NodeRpc,
    types::{BlockHeaderInfo, BlockInfo, RawTransaction},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i32,
    message: String,
}

/// JSON-RPC 1.0 client for a bitcoind-compatible node.
pub struct RpcClient {
    url: String,
    user: String,
    password: String,
    client: Client,
    next_id: AtomicU64,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub fn new(
        url: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            user: user.into(),
            password: password.into(),
            client,
            next_id: AtomicU64::new(0),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> ClientResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(%method, %id, "sending rpc request");

        let body = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let resp = self
            .client
            .post(&self.url)
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        // bitcoind reports rpc errors with a 500 and a json body, so try the body first
        let parsed: RpcResponse<T> = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Status(status.as_u16(), text));
            }
            Err(e) => return Err(ClientError::Parse(e.to_string())),
        };

        if let Some(err) = parsed.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        parsed
            .result
            .ok_or_else(|| ClientError::EmptyResult(method.to_owned()))
    }
}

#[async_trait]
impl NodeRpc for RpcClient {
    async fn get_block_hash(&self, height: u64) -> ClientResult<BlockHash> {
        self.call("getblockhash", vec![json!(height)]).await
    }

    async fn get_block(&self, hash: &BlockHash) -> ClientResult<BlockInfo> {
        self.call("getblock", vec![json!(hash.to_string()), json!(1)])
            .await
    }

    async fn get_block_header(&self, hash: &BlockHash) -> ClientResult<BlockHeaderInfo> {
        self.call("getblockheader", vec![json!(hash.to_string()), json!(true)])
            .await
    }

    async fn get_block_count(&self) -> ClientResult<u64> {
        self.call("getblockcount", vec![]).await
    }

    async fn get_raw_transaction(&self, txid: &Txid) -> ClientResult<RawTransaction> {
        self.call("getrawtransaction", vec![json!(txid.to_string()), json!(true)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_error() {
        let text = r#"{"result":null,"error":{"code":-5,"message":"No such mempool or blockchain transaction"},"id":1}"#;
        let parsed: RpcResponse<RawTransaction> = serde_json::from_str(text).unwrap();

        assert!(parsed.result.is_none());
        let err = parsed.error.unwrap();
        assert_eq!(err.code, -5);
    }

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::Connection("refused".into()).is_transient());
        assert!(ClientError::Status(503, String::new()).is_transient());
        assert!(!ClientError::Status(401, String::new()).is_transient());
        assert!(!ClientError::Rpc {
            code: -5,
            message: String::new()
        }
        .is_transient());
    }
}
