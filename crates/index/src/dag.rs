//! Ancestry validation of token transactions.
//!
//! The walk is depth-first over token-bearing inputs and terminates each branch at a GENESIS of
//! the expected token, or at an ancestor already stored with a valid verdict.

use std::{collections::HashSet, fmt, sync::Arc};

use bitcoin::{hashes::Hash as _, Txid};
use slp_primitives::{SlpValidity, TokenId, TokenType, TransactionRecord, TxInput, TxType};
use tracing::*;

use crate::{
    cache::TxSource,
    errors::{IndexerError, IndexerResult},
};

/// Outcome of an ancestry walk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DagResult {
    pub is_valid: bool,

    /// Visited txids in visiting order, starting with the validated transaction.
    pub dag: Vec<Txid>,
}

impl DagResult {
    fn valid(dag: Vec<Txid>) -> Self {
        Self {
            is_valid: true,
            dag,
        }
    }

    fn invalid(dag: Vec<Txid>) -> Self {
        Self {
            is_valid: false,
            dag,
        }
    }
}

/// Verdict on a single ancestor reached through a token input.
enum ParentCheck {
    /// Branch is settled and valid.
    Settled,
    /// Branch needs its own inputs walked.
    Descend(TransactionRecord),
    Invalid,
}

pub struct DagValidator {
    txs: Arc<dyn TxSource>,
    max_depth: usize,
}

impl fmt::Debug for DagValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagValidator")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl DagValidator {
    pub fn new(txs: Arc<dyn TxSource>, max_depth: usize) -> Self {
        Self { txs, max_depth }
    }

    /// Checks that every token input of `txid` traces back to a GENESIS of `token_id`.
    ///
    /// `end_found` short-circuits the walk for callers that already know the answer: `Some(true)`
    /// reports valid and `Some(false)` invalid, both without fetching anything.
    ///
    /// # Errors
    ///
    /// - [`IndexerError::InvalidArgument`] for a null `txid` or `token_id`.
    /// - [`IndexerError::TokenMismatch`] when an ancestor belongs to another token.
    /// - [`IndexerError::DagTooDeep`] once more than `max_depth` transactions were visited.
    /// - Fetch failures, unchanged.
    pub async fn crawl_dag(
        &self,
        txid: &Txid,
        token_id: &TokenId,
        end_found: Option<bool>,
    ) -> IndexerResult<DagResult> {
        if *txid == Txid::all_zeros() {
            return Err(IndexerError::InvalidArgument("crawl_dag: missing txid".into()));
        }
        if token_id.is_null() {
            return Err(IndexerError::InvalidArgument(
                "crawl_dag: missing token id".into(),
            ));
        }

        match end_found {
            Some(true) => return Ok(DagResult::valid(Vec::new())),
            Some(false) => return Ok(DagResult::invalid(Vec::new())),
            None => {}
        }

        let mut dag = vec![*txid];
        let mut visited = HashSet::from([*txid]);

        let root = self.txs.get_tx(txid).await?;
        if root.tx_type.is_genesis() {
            return Ok(DagResult::valid(dag));
        }
        if !root.is_token_tx() {
            debug!(%txid, "crawl started on a non-token transaction");
            return Ok(DagResult::invalid(dag));
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let mut qualifying = false;

            for (_, input) in node.token_inputs() {
                qualifying = true;
                if !visited.insert(input.txid) {
                    continue;
                }

                match self.check_parent(&node, input, token_id).await? {
                    ParentCheck::Settled => dag.push(input.txid),
                    ParentCheck::Descend(parent) => {
                        dag.push(input.txid);
                        stack.push(parent);
                    }
                    ParentCheck::Invalid => {
                        debug!(%txid, parent = %input.txid, "ancestry rejected");
                        return Ok(DagResult::invalid(dag));
                    }
                }

                if dag.len() > self.max_depth {
                    return Err(IndexerError::DagTooDeep {
                        txid: *txid,
                        max_depth: self.max_depth,
                    });
                }
            }

            if !qualifying {
                trace!(%txid, node = %node.txid, "no token inputs");
                return Ok(DagResult::invalid(dag));
            }
        }

        Ok(DagResult::valid(dag))
    }

    async fn check_parent(
        &self,
        node: &TransactionRecord,
        input: &TxInput,
        token_id: &TokenId,
    ) -> IndexerResult<ParentCheck> {
        let parent = self.txs.get_tx(&input.txid).await?;

        if matches!(parent.is_valid_slp, SlpValidity::Invalid | SlpValidity::Ignored) {
            return Ok(ParentCheck::Invalid);
        }

        if parent.token_type != node.token_type {
            return Ok(ParentCheck::Invalid);
        }

        if let Some(found) = parent.token_id {
            if found != *token_id {
                return Err(IndexerError::TokenMismatch {
                    txid: parent.txid,
                    expected: *token_id,
                    found,
                });
            }
        }

        if parent.is_valid_slp.is_valid() && spends_matching_output(&parent, input, token_id) {
            return Ok(ParentCheck::Settled);
        }

        match parent.tx_type {
            TxType::NftGenesis => {
                if self.minted_from_group(&parent).await? {
                    Ok(ParentCheck::Settled)
                } else {
                    Ok(ParentCheck::Invalid)
                }
            }
            TxType::Genesis => Ok(ParentCheck::Settled),
            TxType::Mint | TxType::Send | TxType::Unknown => Ok(ParentCheck::Descend(parent)),
        }
    }

    /// NFT children must spend a group token at input 0.
    async fn minted_from_group(&self, nft_genesis: &TransactionRecord) -> IndexerResult<bool> {
        let Some(first) = nft_genesis.vin.first().filter(|i| i.carries_token()) else {
            return Ok(false);
        };
        let group = self.txs.get_tx(&first.txid).await?;
        Ok(group.token_type == Some(TokenType::NftGroup))
    }
}

/// Whether `input` spends an output of `parent` carrying the same amount of `token_id`.
fn spends_matching_output(
    parent: &TransactionRecord,
    input: &TxInput,
    token_id: &TokenId,
) -> bool {
    let Some(out) = parent.output(input.vout) else {
        return false;
    };
    if out.token_id != Some(*token_id) {
        return false;
    }
    if input.is_mint_baton {
        return out.is_mint_baton;
    }
    out.token_qty() > 0 && out.token_qty() == input.token_qty
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash as _;

    use super::*;
    use crate::test_utils::*;

    const HEIGHT: u64 = 600_000;

    fn validator(chain: &Arc<FakeChain>) -> DagValidator {
        DagValidator::new(chain.clone(), 10_000)
    }

    #[tokio::test]
    async fn test_send_to_genesis() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let token_id = TokenId::from(g);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 10_000_000, None));
        chain.add_token_tx(send_tx(
            txid(2),
            HEIGHT + 1,
            TokenType::Fungible,
            token_id,
            vec![token_input(g, 1, token_id, 10_000_000)],
            &[10_000_000],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(2), &token_id, None)
            .await
            .unwrap();

        assert_eq!(res, DagResult::valid(vec![txid(2), g]));
        assert_eq!(chain.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_genesis_terminates_immediately() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 100, Some(2)));

        let res = validator(&chain)
            .crawl_dag(&g, &TokenId::from(g), None)
            .await
            .unwrap();

        assert_eq!(res, DagResult::valid(vec![g]));
        assert_eq!(chain.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_input_is_invalid() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let token_id = TokenId::from(g);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 100, None));
        chain.add_token_tx(send_tx(
            txid(2),
            HEIGHT,
            TokenType::Fungible,
            token_id,
            vec![token_input(g, 1, token_id, 0)],
            &[100],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(2), &token_id, None)
            .await
            .unwrap();

        assert_eq!(res, DagResult::invalid(vec![txid(2)]));
    }

    #[tokio::test]
    async fn test_mint_baton_input_is_followed() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let token_id = TokenId::from(g);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 100, Some(2)));
        chain.add_token_tx(mint_tx(
            txid(2),
            HEIGHT,
            token_id,
            vec![baton_input(g, 2, token_id)],
            50,
            Some(2),
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(2), &token_id, None)
            .await
            .unwrap();

        assert!(res.is_valid);
        assert_eq!(res.dag, vec![txid(2), g]);
    }

    #[tokio::test]
    async fn test_parent_of_other_token_type_is_invalid() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let token_id = TokenId::from(g);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Unsupported(45), 100, None));
        chain.add_token_tx(send_tx(
            txid(2),
            HEIGHT,
            TokenType::Fungible,
            token_id,
            vec![token_input(g, 1, token_id, 100)],
            &[100],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(2), &token_id, None)
            .await
            .unwrap();

        assert_eq!(res, DagResult::invalid(vec![txid(2)]));
    }

    #[tokio::test]
    async fn test_token_mismatch_is_an_error() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let other = TokenId::from(txid(9));
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 100, None));
        chain.add_token_tx(send_tx(
            txid(2),
            HEIGHT,
            TokenType::Fungible,
            other,
            vec![token_input(g, 1, other, 100)],
            &[100],
        ));

        let err = validator(&chain)
            .crawl_dag(&txid(2), &other, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IndexerError::TokenMismatch { txid, expected, .. } if txid == g && expected == other
        ));
    }

    #[tokio::test]
    async fn test_three_transaction_chain() {
        let token_id: TokenId = "d9aa162704578945543f5856400546310392a3e68a7922fbc3490e2f21cc7501"
            .parse()
            .unwrap();
        let start: Txid = "4e52e0ec1ebc1d3a1b7f2ae2dbfd7d8bdb8c5a7cb8ac62085d1e0a6d6b2209ee"
            .parse()
            .unwrap();
        let g = token_id.genesis_txid();
        let middle = txid(0x21);

        let chain = Arc::new(FakeChain::new());
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 1_000, None));
        chain.add_token_tx(send_tx(
            middle,
            HEIGHT + 1,
            TokenType::Fungible,
            token_id,
            vec![token_input(g, 1, token_id, 1_000)],
            &[400, 600],
        ));
        chain.add_token_tx(send_tx(
            start,
            HEIGHT + 2,
            TokenType::Fungible,
            token_id,
            vec![token_input(middle, 2, token_id, 600)],
            &[600],
        ));

        let res = validator(&chain)
            .crawl_dag(&start, &token_id, None)
            .await
            .unwrap();

        assert!(res.is_valid);
        assert_eq!(res.dag, vec![start, middle, g]);
    }

    #[tokio::test]
    async fn test_validated_parent_is_trusted() {
        let chain = Arc::new(FakeChain::new());
        let token_id = TokenId::from(txid(1));

        // Parent's own ancestry is not in the chain; only its stored verdict is used.
        let (mut parent, op) = send_tx(
            txid(2),
            HEIGHT,
            TokenType::Fungible,
            token_id,
            vec![token_input(txid(1), 1, token_id, 500)],
            &[500],
        );
        parent.is_valid_slp = SlpValidity::Valid;
        chain.add_token_tx((parent, op));
        chain.add_token_tx(send_tx(
            txid(3),
            HEIGHT,
            TokenType::Fungible,
            token_id,
            vec![token_input(txid(2), 1, token_id, 500)],
            &[500],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(3), &token_id, None)
            .await
            .unwrap();

        assert_eq!(res, DagResult::valid(vec![txid(3), txid(2)]));
        assert_eq!(chain.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_parent_is_rejected() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let token_id = TokenId::from(g);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 100, None));

        // Claims 150 out of a 100 input and carries an invalid verdict.
        let (mut overspend, op) = send_tx(
            txid(2),
            HEIGHT,
            TokenType::Fungible,
            token_id,
            vec![token_input(g, 1, token_id, 100)],
            &[150],
        );
        overspend.is_valid_slp = SlpValidity::Invalid;
        chain.add_token_tx((overspend.clone(), op));
        chain.add_token_tx(send_tx(
            txid(3),
            HEIGHT + 1,
            TokenType::Fungible,
            token_id,
            vec![token_input(txid(2), 1, token_id, 150)],
            &[150],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(3), &token_id, None)
            .await
            .unwrap();
        assert_eq!(res, DagResult::invalid(vec![txid(3)]));

        overspend.is_valid_slp = SlpValidity::Ignored;
        chain.add_plain_tx(overspend);
        let res = validator(&chain)
            .crawl_dag(&txid(3), &token_id, None)
            .await
            .unwrap();
        assert!(!res.is_valid);
    }

    #[tokio::test]
    async fn test_validated_parent_of_other_token_is_an_error() {
        let chain = Arc::new(FakeChain::new());
        let token_a = TokenId::from(txid(1));
        let token_b = TokenId::from(txid(9));
        let parent_txid = txid(2);

        let (mut parent, op) = send_tx(
            parent_txid,
            HEIGHT,
            TokenType::Fungible,
            token_b,
            vec![token_input(txid(9), 1, token_b, 500)],
            &[500],
        );
        parent.is_valid_slp = SlpValidity::Valid;
        chain.add_token_tx((parent, op));
        chain.add_token_tx(send_tx(
            txid(3),
            HEIGHT,
            TokenType::Fungible,
            token_a,
            vec![token_input(parent_txid, 1, token_a, 500)],
            &[500],
        ));

        let err = validator(&chain)
            .crawl_dag(&txid(3), &token_a, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::TokenMismatch { txid, expected, found }
                if txid == parent_txid && expected == token_a && found == token_b
        ));
    }

    #[tokio::test]
    async fn test_nft_requires_group_parent() {
        let chain = Arc::new(FakeChain::new());
        let fungible = txid(1);
        let fungible_id = TokenId::from(fungible);
        let nft = txid(2);
        let nft_id = TokenId::from(nft);

        chain.add_token_tx(genesis_tx(fungible, HEIGHT, TokenType::Fungible, 10, None));
        chain.add_token_tx(nft_genesis_tx(
            nft,
            HEIGHT,
            token_input(fungible, 1, fungible_id, 1),
        ));
        chain.add_token_tx(send_tx(
            txid(3),
            HEIGHT,
            TokenType::NftChild,
            nft_id,
            vec![token_input(nft, 1, nft_id, 1)],
            &[1],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(3), &nft_id, None)
            .await
            .unwrap();
        assert!(!res.is_valid);

        // Same shape, minted from a group token.
        let group = txid(4);
        let group_id = TokenId::from(group);
        let nft = txid(5);
        let nft_id = TokenId::from(nft);
        chain.add_token_tx(genesis_tx(group, HEIGHT, TokenType::NftGroup, 10, None));
        chain.add_token_tx(nft_genesis_tx(nft, HEIGHT, token_input(group, 1, group_id, 1)));
        chain.add_token_tx(send_tx(
            txid(6),
            HEIGHT,
            TokenType::NftChild,
            nft_id,
            vec![token_input(nft, 1, nft_id, 1)],
            &[1],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(6), &nft_id, None)
            .await
            .unwrap();
        assert_eq!(res, DagResult::valid(vec![txid(6), nft]));
    }

    #[tokio::test]
    async fn test_nft_group_input_must_carry_tokens() {
        let chain = Arc::new(FakeChain::new());
        let group = txid(1);
        let group_id = TokenId::from(group);
        let nft = txid(2);
        let nft_id = TokenId::from(nft);

        chain.add_token_tx(genesis_tx(group, HEIGHT, TokenType::NftGroup, 10, None));
        // Spends the group output at vin 0 without any group quantity attached.
        chain.add_token_tx(nft_genesis_tx(nft, HEIGHT, token_input(group, 1, group_id, 0)));
        chain.add_token_tx(send_tx(
            txid(3),
            HEIGHT,
            TokenType::NftChild,
            nft_id,
            vec![token_input(nft, 1, nft_id, 1)],
            &[1],
        ));

        let res = validator(&chain)
            .crawl_dag(&txid(3), &nft_id, None)
            .await
            .unwrap();
        assert_eq!(res, DagResult::invalid(vec![txid(3)]));
    }

    #[tokio::test]
    async fn test_end_found_override() {
        let chain = Arc::new(FakeChain::new());
        let token_id = TokenId::from(txid(1));

        let res = validator(&chain)
            .crawl_dag(&txid(2), &token_id, Some(true))
            .await
            .unwrap();
        assert!(res.is_valid);

        let res = validator(&chain)
            .crawl_dag(&txid(2), &token_id, Some(false))
            .await
            .unwrap();
        assert!(!res.is_valid);
        assert_eq!(chain.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_arguments() {
        let chain = Arc::new(FakeChain::new());
        let err = validator(&chain)
            .crawl_dag(&txid(2), &TokenId::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidArgument(_)));

        let err = validator(&chain)
            .crawl_dag(&Txid::all_zeros(), &TokenId::from(txid(1)), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let chain = Arc::new(FakeChain::new());
        let token_id = TokenId::from(txid(1));
        chain.add_token_tx(send_tx(
            txid(2),
            HEIGHT,
            TokenType::Fungible,
            token_id,
            vec![token_input(txid(1), 1, token_id, 5)],
            &[5],
        ));

        let err = validator(&chain)
            .crawl_dag(&txid(2), &token_id, None)
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_depth_cap() {
        let chain = Arc::new(FakeChain::new());
        let g = txid(1);
        let token_id = TokenId::from(g);
        chain.add_token_tx(genesis_tx(g, HEIGHT, TokenType::Fungible, 5, None));

        let mut prev = g;
        for id in 2..10u8 {
            chain.add_token_tx(send_tx(
                txid(id),
                HEIGHT,
                TokenType::Fungible,
                token_id,
                vec![token_input(prev, 1, token_id, 5)],
                &[5],
            ));
            prev = txid(id);
        }

        let err = DagValidator::new(chain.clone(), 3)
            .crawl_dag(&txid(9), &token_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexerError::DagTooDeep { max_depth: 3, .. }));

        let res = validator(&chain)
            .crawl_dag(&txid(9), &token_id, None)
            .await
            .unwrap();
        assert!(res.is_valid);
        assert_eq!(res.dag.len(), 9);
    }
}
