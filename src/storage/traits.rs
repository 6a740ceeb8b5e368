use crate::wallet::Identity;

/// Last known block index, shared by the miner (writer) and the sync
/// coordinator (reader). Implementations replace the value atomically.
pub trait ChainHeightStore: Send + Sync {
    fn get_last_block_index(&self) -> Option<u64>;
    fn set_last_block_index(&self, index: u64);
}

/// Source of the identity that receives mining rewards.
pub trait CoinbaseLookup: Send + Sync {
    fn coinbase_identity(&self) -> Option<Identity>;
}
