use crate::core::Transaction;
use crate::error::Result;
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

/// Nonce stored in the genesis header. Genesis is not mined.
pub const GENESIS_BLOCK_NONCE: u64 = 100563;
/// Fixed genesis timestamp (2018-04-13T00:00:00Z) so every node builds the same genesis hash.
pub const GENESIS_TIMESTAMP: i64 = 1_523_577_600_000;
pub const GENESIS_INDEX: u64 = 1;

/// Width of the big-endian difficulty target field.
pub const TARGET_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct BlockHeader {
    index: u64,
    previous_hash: Option<String>,
    timestamp: i64,
    nonce: u64,
    difficulty_target: Vec<u8>,
    hash: String,
}

impl BlockHeader {
    /// Header for the block following `previous_hash`, not yet mined.
    pub fn new(index: u64, previous_hash: Option<String>) -> Result<BlockHeader> {
        Ok(BlockHeader {
            index,
            previous_hash,
            timestamp: current_timestamp()?,
            nonce: 0,
            difficulty_target: vec![0; TARGET_LEN],
            hash: String::new(),
        })
    }

    pub(crate) fn genesis(target: &BigUint) -> BlockHeader {
        let mut header = BlockHeader {
            index: GENESIS_INDEX,
            previous_hash: None,
            timestamp: GENESIS_TIMESTAMP,
            nonce: GENESIS_BLOCK_NONCE,
            difficulty_target: target_to_bytes(target),
            hash: String::new(),
        };
        header.hash = header.compute_hash();
        header
    }

    /// index || timestamp || previous hash (hex text, empty for genesis) || target || nonce
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.canonical_bytes_with_nonce(self.nonce)
    }

    pub(crate) fn canonical_bytes_with_nonce(&self, nonce: u64) -> Vec<u8> {
        let previous_hash = self.previous_hash.as_deref().unwrap_or("");
        let mut data_bytes = Vec::with_capacity(8 + 8 + previous_hash.len() + TARGET_LEN + 8);
        data_bytes.extend(self.index.to_be_bytes());
        data_bytes.extend(self.timestamp.to_be_bytes());
        data_bytes.extend(previous_hash.as_bytes());
        data_bytes.extend(&self.difficulty_target);
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    /// Hash of the canonical bytes with the header's current nonce.
    pub fn compute_hash(&self) -> String {
        HEXLOWER.encode(&sha256_digest(&self.canonical_bytes()))
    }

    pub(crate) fn set_difficulty_target(&mut self, target: &BigUint) {
        self.difficulty_target = target_to_bytes(target);
    }

    pub(crate) fn seal(&mut self, target: &BigUint, nonce: u64, hash: String) {
        self.set_difficulty_target(target);
        self.nonce = nonce;
        self.hash = hash;
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_previous_hash(&self) -> Option<&str> {
        self.previous_hash.as_deref()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn get_difficulty_target(&self) -> BigUint {
        BigUint::from_bytes_be(&self.difficulty_target)
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == GENESIS_INDEX && self.previous_hash.is_none()
    }

    #[cfg(test)]
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

/// Left-pad the target into the fixed 32-byte field.
pub(crate) fn target_to_bytes(target: &BigUint) -> Vec<u8> {
    let raw = target.to_bytes_be();
    let mut bytes = vec![0u8; TARGET_LEN.saturating_sub(raw.len())];
    bytes.extend(raw);
    bytes
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    header: BlockHeader,
    transactions: Vec<Transaction>,
}

impl Block {
    pub(crate) fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Block {
        Block {
            header,
            transactions,
        }
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_index(&self) -> u64 {
        self.header.get_index()
    }

    pub fn get_hash(&self) -> &str {
        self.header.get_hash()
    }

    pub fn get_previous_hash(&self) -> Option<&str> {
        self.header.get_previous_hash()
    }

    /// True when this block directly extends `previous`.
    pub fn extends(&self, previous: &Block) -> bool {
        self.get_index() == previous.get_index() + 1
            && self.get_previous_hash() == Some(previous.get_hash())
    }

    /// The cached hashes match the content and the only transaction is the
    /// reward. Proof-of-work is checked separately.
    pub fn is_well_formed(&self) -> bool {
        self.header.get_hash() == self.header.compute_hash()
            && matches!(
                self.transactions.as_slice(),
                [reward] if reward.is_reward() && reward.hash_matches()
            )
    }
}
