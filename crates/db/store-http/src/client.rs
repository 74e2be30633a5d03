use std::{fmt, time::Duration};

use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use slp_db_types::{DbError, DbResult};
use tracing::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin REST client over the `/level` API.
pub struct StoreClient {
    base_url: String,
    client: Client,
}

impl fmt::Debug for StoreClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl StoreClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> DbResult<Self> {
        let client = Client::builder()
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()
            .map_err(|e| DbError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn table_url(&self, table: &str) -> String {
        format!("{}/level/{table}", self.base_url)
    }

    pub(crate) fn entry_url(&self, table: &str, key: &str) -> String {
        format!("{}/level/{table}/{key}", self.base_url)
    }

    /// `GET /level/{table}/{key}`; a 404 means the key is absent.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        table: &str,
        key: &str,
    ) -> DbResult<Option<T>> {
        let resp = self
            .client
            .get(self.entry_url(table, key))
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            trace!(%table, %key, "entry not found");
            return Ok(None);
        }

        let resp = check_status(resp).await?;
        let value = resp
            .json::<T>()
            .await
            .map_err(|e| DbError::Codec(e.to_string()))?;
        Ok(Some(value))
    }

    /// `POST /level/{table}` with `{key_field: key, data_field: data}`.
    pub(crate) async fn create<D: Serialize>(
        &self,
        table: &str,
        key_field: &str,
        key: &str,
        data_field: &str,
        data: &D,
    ) -> DbResult<()> {
        let body = entry_body(key_field, key, data_field, data)?;
        self.post_json(&self.table_url(table), &body).await
    }

    pub(crate) async fn delete(&self, table: &str, key: &str) -> DbResult<()> {
        let resp = self
            .client
            .delete(self.entry_url(table, key))
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check_status(resp).await.map(|_| ())
    }

    pub(crate) async fn post_json(&self, url: &str, body: &Value) -> DbResult<()> {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DbError::Transport(e.to_string()))?;
        check_status(resp).await.map(|_| ())
    }
}

pub(crate) fn entry_body<D: Serialize>(
    key_field: &str,
    key: &str,
    data_field: &str,
    data: &D,
) -> DbResult<Value> {
    let data = serde_json::to_value(data).map_err(|e| DbError::Codec(e.to_string()))?;
    let mut body = json!({});
    body[key_field] = Value::String(key.to_owned());
    body[data_field] = data;
    Ok(body)
}

async fn check_status(resp: Response) -> DbResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DbError::Http {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = StoreClient::new("http://localhost:5020/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5020");
        assert_eq!(client.table_url("tx"), "http://localhost:5020/level/tx");
        assert_eq!(
            client.entry_url("utxo", "abc:1"),
            "http://localhost:5020/level/utxo/abc:1"
        );
    }

    #[test]
    fn test_entry_body() {
        let body = entry_body("tokenId", "abc", "tokenData", &json!({"decimals": 8})).unwrap();
        assert_eq!(body, json!({"tokenId": "abc", "tokenData": {"decimals": 8}}));
    }
}
