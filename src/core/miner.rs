// Block production: genesis by fixed convention, every later block by
// proof-of-work search, each carrying one reward transaction for the
// configured coinbase identity.

use crate::core::{Block, BlockHeader, CancelToken, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{ChainHeightStore, CoinbaseLookup};
use crate::wallet::Identity;
use log::info;
use std::sync::Arc;

pub struct Miner {
    pow: ProofOfWork,
    heights: Arc<dyn ChainHeightStore>,
    coinbase: Arc<dyn CoinbaseLookup>,
}

impl Miner {
    pub fn new(
        pow: ProofOfWork,
        heights: Arc<dyn ChainHeightStore>,
        coinbase: Arc<dyn CoinbaseLookup>,
    ) -> Miner {
        Miner {
            pow,
            heights,
            coinbase,
        }
    }

    pub fn get_proof_of_work(&self) -> &ProofOfWork {
        &self.pow
    }

    /// The genesis header every node with the same target builds.
    pub fn genesis_header(&self) -> BlockHeader {
        BlockHeader::genesis(&self.pow.compute_target())
    }

    /// Build the block after `previous`, or the genesis block when there is none.
    pub fn produce_next_block(&self, previous: Option<&Block>) -> Result<Block> {
        self.produce(previous, None)
    }

    /// Same as [`Miner::produce_next_block`] but the search stops once `cancel` is set.
    pub fn produce_next_block_with_cancel(
        &self,
        previous: Option<&Block>,
        cancel: &CancelToken,
    ) -> Result<Block> {
        self.produce(previous, Some(cancel))
    }

    fn produce(&self, previous: Option<&Block>, cancel: Option<&CancelToken>) -> Result<Block> {
        let miner = self
            .coinbase
            .coinbase_identity()
            .ok_or(BlockchainError::NoMiningIdentityConfigured)?;

        let header = match previous {
            Some(previous) => self.mine_header(previous, cancel)?,
            None => {
                info!("Creating genesis block, reward goes to {}", miner.get_address());
                BlockHeader::genesis(&self.pow.compute_target())
            }
        };

        let block = Block::new(header, vec![Self::reward_for(&miner)]);
        self.heights.set_last_block_index(block.get_index());
        info!("Block {} finalized: {}", block.get_index(), block.get_hash());
        Ok(block)
    }

    fn mine_header(&self, previous: &Block, cancel: Option<&CancelToken>) -> Result<BlockHeader> {
        let mut header = BlockHeader::new(
            previous.get_index() + 1,
            Some(previous.get_hash().to_string()),
        )?;
        let result = match cancel {
            Some(cancel) => self.pow.mine_with_cancel(&header, cancel)?,
            None => self.pow.mine(&header)?,
        };
        header.seal(&result.target, result.nonce, result.hash);
        Ok(header)
    }

    fn reward_for(miner: &Identity) -> Transaction {
        Transaction::new_reward_tx(miner)
    }

    /// Proof-of-work self-consistency only; linkage to a predecessor is the
    /// caller's job (see [`Block::extends`]).
    pub fn validate_block(&self, block: &Block) -> bool {
        ProofOfWork::validate(block.get_header())
    }
}
