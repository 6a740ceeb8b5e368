//! Core consensus functionality
//!
//! Blocks and reward transactions, the proof-of-work search and check, the
//! miner that produces blocks, and the background worker that keeps mining.

pub mod block;
pub mod miner;
pub mod monetary;
pub mod proof_of_work;
pub mod transaction;
pub mod worker;

pub use block::{Block, BlockHeader, GENESIS_BLOCK_NONCE, GENESIS_INDEX, GENESIS_TIMESTAMP};
pub use miner::Miner;
pub use monetary::{BASE_UNITS_PER_COIN, MINING_REWARD};
pub use proof_of_work::{CancelToken, PowResult, ProofOfWork, TARGET_BITS};
pub use transaction::Transaction;
pub use worker::{MiningWorker, SupersedeHandle};
