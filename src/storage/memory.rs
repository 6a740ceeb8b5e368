use crate::storage::{ChainHeightStore, CoinbaseLookup};
use crate::wallet::Identity;
use std::sync::RwLock;

/// In-process height handle.
pub struct InMemoryHeight {
    inner: RwLock<Option<u64>>,
}

impl Default for InMemoryHeight {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHeight {
    pub fn new() -> InMemoryHeight {
        InMemoryHeight {
            inner: RwLock::new(None),
        }
    }

    pub fn starting_at(index: u64) -> InMemoryHeight {
        InMemoryHeight {
            inner: RwLock::new(Some(index)),
        }
    }
}

impl ChainHeightStore for InMemoryHeight {
    fn get_last_block_index(&self) -> Option<u64> {
        match self.inner.read() {
            Ok(inner) => *inner,
            Err(_) => {
                log::error!("Failed to acquire read lock on chain height");
                None
            }
        }
    }

    fn set_last_block_index(&self, index: u64) {
        match self.inner.write() {
            Ok(mut inner) => *inner = Some(index),
            Err(_) => log::error!("Failed to acquire write lock on chain height"),
        }
    }
}

/// A coinbase fixed at construction.
pub struct FixedCoinbase {
    identity: Option<Identity>,
}

impl FixedCoinbase {
    pub fn new(identity: Identity) -> FixedCoinbase {
        FixedCoinbase {
            identity: Some(identity),
        }
    }

    pub fn none() -> FixedCoinbase {
        FixedCoinbase { identity: None }
    }
}

impl CoinbaseLookup for FixedCoinbase {
    fn coinbase_identity(&self) -> Option<Identity> {
        self.identity.clone()
    }
}
