//! Pin claims found in non-token transactions.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bitcoin::Txid;
use slp_btcio::NodeRpc;
use slp_db_types::{PinClaimDatabase, SlpDatabase};
use slp_primitives::PinClaim;
use slp_tx::parse_pin_claim_script;
use tokio::task::JoinHandle;
use tracing::*;

use crate::errors::{IndexerError, IndexerResult};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives newly indexed pin claims.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClaimWebhook: Send + Sync {
    async fn notify_new_claim(&self, claim: &PinClaim) -> IndexerResult<()>;
}

/// Posts each claim as JSON to a fixed url.
#[derive(Debug, Clone)]
pub struct HttpWebhook {
    url: String,
    client: reqwest::Client,
}

impl HttpWebhook {
    pub fn new(url: impl Into<String>) -> IndexerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|err| IndexerError::Webhook(err.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ClaimWebhook for HttpWebhook {
    async fn notify_new_claim(&self, claim: &PinClaim) -> IndexerResult<()> {
        self.client
            .post(&self.url)
            .json(claim)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|err| IndexerError::Webhook(err.to_string()))?;
        Ok(())
    }
}

pub struct PinClaimScanner<D> {
    rpc: Arc<dyn NodeRpc>,
    db: Arc<D>,
    webhook: Option<Arc<dyn ClaimWebhook>>,
}

impl<D> fmt::Debug for PinClaimScanner<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinClaimScanner")
            .field("webhook", &self.webhook.is_some())
            .finish_non_exhaustive()
    }
}

impl<D: SlpDatabase> PinClaimScanner<D> {
    pub fn new(
        rpc: Arc<dyn NodeRpc>,
        db: Arc<D>,
        webhook: Option<Arc<dyn ClaimWebhook>>,
    ) -> Self {
        Self { rpc, db, webhook }
    }

    /// Parses a pin claim out of `txid`, if it carries one.
    ///
    /// The claimant is the address paid by the output spent at input 0.
    pub async fn find_claim(&self, txid: &Txid) -> IndexerResult<Option<PinClaim>> {
        let raw = self.rpc.get_raw_transaction(txid).await?;
        let Some(payload) = raw.first_output_script().and_then(parse_pin_claim_script) else {
            return Ok(None);
        };

        let address = match raw.spent_outpoints().next() {
            Some(outpoint) => {
                let parent = self.rpc.get_raw_transaction(&outpoint.txid).await?;
                parent
                    .output(outpoint.vout)
                    .and_then(|o| o.address())
                    .map(str::to_owned)
            }
            None => None,
        };

        Ok(Some(PinClaim {
            proof_of_burn_txid: payload.proof_of_burn_txid,
            cid: payload.cid,
            filename: payload.filename,
            claim_txid: *txid,
            address,
        }))
    }

    /// Stores the claim carried by `txid` and notifies the webhook in the background.
    pub async fn process_claim(&self, txid: &Txid) -> IndexerResult<Option<PinClaim>> {
        let Some(claim) = self.find_claim(txid).await? else {
            return Ok(None);
        };

        self.db.pin_claim_db().put_pin_claim(&claim).await?;
        info!(%txid, cid = %claim.cid, "indexed pin claim");

        if self.notify(&claim).is_none() {
            trace!(%txid, "no claim webhook configured");
        }
        Ok(Some(claim))
    }

    /// Spawns the webhook call. Failures are logged and never reach the caller.
    pub fn notify(&self, claim: &PinClaim) -> Option<JoinHandle<()>> {
        let webhook = self.webhook.clone()?;
        let claim = claim.clone();
        Some(tokio::spawn(async move {
            if let Err(err) = webhook.notify_new_claim(&claim).await {
                warn!(txid = %claim.claim_txid, %err, "pin claim webhook failed");
            }
        }))
    }
}
