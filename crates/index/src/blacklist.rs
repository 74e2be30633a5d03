use std::collections::HashSet;

use slp_config::BlacklistConfig;
use slp_primitives::TokenId;

/// Tokens whose transactions are recorded as ignored instead of being indexed.
#[derive(Clone, Debug, Default)]
pub struct Blacklist {
    ids: HashSet<TokenId>,
}

impl Blacklist {
    pub fn new(ids: impl IntoIterator<Item = TokenId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn from_config(config: &BlacklistConfig) -> Self {
        Self::new(config.active_ids().iter().copied())
    }

    pub fn contains(&self, token_id: &TokenId) -> bool {
        self.ids.contains(token_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
