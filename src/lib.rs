//! # powchain-node
//!
//! A small proof-of-work chain node: accounts with Base58Check addresses,
//! a miner that extends the chain one rewarded block at a time, and a TCP
//! peer protocol that announces new blocks and fetches missing ones.
//!
//! ## Layout
//! - `core/`: blocks, reward transactions, proof-of-work, the miner and the
//!   background mining worker
//! - `wallet/`: address derivation and checking, identities, local accounts
//! - `network/`: wire messages, peers, the TCP transport, sync coordinator
//!   and inbound server
//! - `storage/`: the sled-backed chain store and the height/coinbase seams
//! - `config/`: node settings from defaults, a TOML file and the environment
//! - `utils/`: hashing, key generation and bincode helpers
//! - `cli/`: command-line parsing for the node binary

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, NodeSettings};
pub use core::{
    Block, BlockHeader, CancelToken, Miner, MiningWorker, ProofOfWork, Transaction,
    GENESIS_BLOCK_NONCE, MINING_REWARD, TARGET_BITS,
};
pub use error::{BlockchainError, Result};
pub use network::{
    GroupBroadcast, Message, MessageType, Peers, Server, SyncCoordinator, SyncEvent, TcpTransport,
};
pub use storage::{ChainHeightStore, ChainStore, CoinbaseLookup, InMemoryHeight};
pub use utils::{base58_encode, current_timestamp, new_key_pair, ripemd160_digest, sha256_digest};
pub use wallet::{
    convert_address, derive_address, hash_pub_key, verify_address, Identity, Wallets,
    ADDRESS_CHECK_SUM_LEN,
};
