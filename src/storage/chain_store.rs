// Sled-backed node storage: blocks by index, wallet accounts by address,
// and the small pieces of chain metadata (last block index, coinbase).

use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::storage::{ChainHeightStore, CoinbaseLookup};
use crate::utils::{deserialize, serialize};
use crate::wallet::Identity;
use log::error;
use sled::{Db, Tree};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

const BLOCKS_TREE: &str = "blocks";
const ACCOUNTS_TREE: &str = "accounts";
const META_TREE: &str = "meta";

const LAST_BLOCK_INDEX_KEY: &str = "last_block_index";
const COINBASE_ADDRESS_KEY: &str = "coinbase_address";

#[derive(Clone)]
pub struct ChainStore {
    db: Db,
    // Serializes appends from the mining worker and the inbound server.
    commit_lock: Arc<Mutex<()>>,
}

impl ChainStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ChainStore> {
        let db = sled::open(path.as_ref())
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))?;
        Ok(ChainStore {
            db,
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn tree(&self, name: &str) -> Result<Tree> {
        self.db
            .open_tree(name)
            .map_err(|e| BlockchainError::Database(format!("Failed to open {name} tree: {e}")))
    }

    pub fn put_block(&self, block: &Block) -> Result<()> {
        let blocks = self.tree(BLOCKS_TREE)?;
        blocks.insert(block.get_index().to_be_bytes(), block.serialize()?)?;
        blocks.flush()?;
        Ok(())
    }

    pub fn get_block(&self, index: u64) -> Result<Option<Block>> {
        let blocks = self.tree(BLOCKS_TREE)?;
        match blocks.get(index.to_be_bytes())? {
            Some(bytes) => Ok(Some(Block::deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Append `block` if it extends the stored tip (or is the first block of
    /// an empty store) and record its index. Returns `false` when the block
    /// does not fit the local chain; nothing is written in that case.
    pub fn append_block(&self, block: &Block) -> Result<bool> {
        let _guard = self
            .commit_lock
            .lock()
            .map_err(|_| BlockchainError::Database("Commit lock poisoned".to_string()))?;

        let fits = match self.tip_block()? {
            Some(tip) => block.extends(&tip),
            None => block.get_header().is_genesis(),
        };
        if !fits {
            return Ok(false);
        }
        self.put_block(block)?;
        self.write_last_block_index(block.get_index())?;
        Ok(true)
    }

    /// Highest stored block, independent of the recorded last index.
    pub fn tip_block(&self) -> Result<Option<Block>> {
        let blocks = self.tree(BLOCKS_TREE)?;
        match blocks.last()? {
            Some((_, value)) => Ok(Some(Block::deserialize(value.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Store a block this node produced. The miner records the new height
    /// before the block is stored, so whenever the append does not go
    /// through the height is put back to the stored tip.
    pub fn commit_mined_block(&self, block: &Block) -> Result<bool> {
        let result = self.append_block(block);
        if !matches!(result, Ok(true)) {
            if let Err(e) = self.realign_height() {
                error!("Failed to realign chain height: {e}");
            }
        }
        result
    }

    /// Reset the recorded last index to the highest stored block, or clear
    /// it when nothing is stored.
    pub fn realign_height(&self) -> Result<()> {
        // only rewrites metadata from stored blocks, so a poisoned lock is safe to reuse
        let _guard = self
            .commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match self.tip_block()? {
            Some(tip) => self.write_last_block_index(tip.get_index())?,
            None => {
                let meta = self.tree(META_TREE)?;
                meta.remove(LAST_BLOCK_INDEX_KEY)?;
                meta.flush()?;
            }
        }
        Ok(())
    }

    /// The block at the recorded last index, if any.
    pub fn last_block(&self) -> Result<Option<Block>> {
        match self.read_last_block_index()? {
            Some(index) => self.get_block(index),
            None => Ok(None),
        }
    }

    /// All stored blocks in index order.
    pub fn blocks(&self) -> Result<Vec<Block>> {
        let blocks = self.tree(BLOCKS_TREE)?;
        let mut result = Vec::new();
        for item in blocks.iter() {
            let (_, value) = item?;
            result.push(Block::deserialize(value.as_ref())?);
        }
        Ok(result)
    }

    pub fn read_last_block_index(&self) -> Result<Option<u64>> {
        let meta = self.tree(META_TREE)?;
        match meta.get(LAST_BLOCK_INDEX_KEY)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    BlockchainError::Database("Corrupted last block index".to_string())
                })?;
                Ok(Some(u64::from_be_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    pub fn write_last_block_index(&self, index: u64) -> Result<()> {
        let meta = self.tree(META_TREE)?;
        meta.insert(LAST_BLOCK_INDEX_KEY, index.to_be_bytes().to_vec())?;
        meta.flush()?;
        Ok(())
    }

    pub fn put_account(&self, identity: &Identity) -> Result<()> {
        let accounts = self.tree(ACCOUNTS_TREE)?;
        accounts.insert(identity.get_address(), serialize(identity)?)?;
        accounts.flush()?;
        Ok(())
    }

    pub fn get_account(&self, address: &str) -> Result<Option<Identity>> {
        let accounts = self.tree(ACCOUNTS_TREE)?;
        match accounts.get(address)? {
            Some(bytes) => Ok(Some(deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn list_accounts(&self) -> Result<Vec<Identity>> {
        let accounts = self.tree(ACCOUNTS_TREE)?;
        let mut result = Vec::new();
        for item in accounts.iter() {
            let (_, value) = item?;
            result.push(deserialize(value.as_ref())?);
        }
        Ok(result)
    }

    /// Point the coinbase at a stored account.
    pub fn set_coinbase(&self, address: &str) -> Result<()> {
        if self.get_account(address)?.is_none() {
            return Err(BlockchainError::Wallet(format!(
                "No account stored for address {address}"
            )));
        }
        let meta = self.tree(META_TREE)?;
        meta.insert(COINBASE_ADDRESS_KEY, address.as_bytes())?;
        meta.flush()?;
        Ok(())
    }

    pub fn get_coinbase(&self) -> Result<Option<Identity>> {
        let meta = self.tree(META_TREE)?;
        let address = match meta.get(COINBASE_ADDRESS_KEY)? {
            Some(bytes) => String::from_utf8(bytes.to_vec()).map_err(|e| {
                BlockchainError::Database(format!("Invalid coinbase address format: {e}"))
            })?,
            None => return Ok(None),
        };
        self.get_account(&address)
    }
}

impl ChainHeightStore for ChainStore {
    fn get_last_block_index(&self) -> Option<u64> {
        self.read_last_block_index().unwrap_or_else(|e| {
            error!("Failed to read last block index: {e}");
            None
        })
    }

    fn set_last_block_index(&self, index: u64) {
        if let Err(e) = self.write_last_block_index(index) {
            error!("Failed to write last block index {index}: {e}");
        }
    }
}

impl CoinbaseLookup for ChainStore {
    fn coinbase_identity(&self) -> Option<Identity> {
        self.get_coinbase().unwrap_or_else(|e| {
            error!("Failed to read coinbase account: {e}");
            None
        })
    }
}
