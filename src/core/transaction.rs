// A transaction in this chain is a plain value record: who receives it, the
// public key of whoever sent it, the amount and a free-form note. The hash
// is fixed at construction and there are no setters.

use crate::core::monetary::{MINER_REWARD_DATA, MINING_REWARD};
use crate::utils::sha256_digest;
use crate::wallet::Identity;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Transaction {
    recipient: String,
    sender_public_key: Vec<u8>,
    amount: u64,
    data: String,
    tx_hash: String,
}

impl Transaction {
    pub fn new(recipient: &str, sender_public_key: &[u8], amount: u64, data: &str) -> Transaction {
        let tx_hash = Self::compute_hash(recipient, sender_public_key, amount, data);
        Transaction {
            recipient: recipient.to_string(),
            sender_public_key: sender_public_key.to_vec(),
            amount,
            data: data.to_string(),
            tx_hash,
        }
    }

    /// The reward a miner pays itself in each block it produces.
    pub fn new_reward_tx(miner: &Identity) -> Transaction {
        Transaction::new(
            miner.get_address(),
            miner.get_public_key(),
            MINING_REWARD,
            MINER_REWARD_DATA,
        )
    }

    // recipient || sender public key || amount (u64 BE) || data
    fn compute_hash(recipient: &str, sender_public_key: &[u8], amount: u64, data: &str) -> String {
        let mut bytes = Vec::with_capacity(recipient.len() + sender_public_key.len() + 8 + data.len());
        bytes.extend(recipient.as_bytes());
        bytes.extend(sender_public_key);
        bytes.extend(amount.to_be_bytes());
        bytes.extend(data.as_bytes());
        HEXLOWER.encode(&sha256_digest(&bytes))
    }

    pub fn get_recipient(&self) -> &str {
        self.recipient.as_str()
    }

    pub fn get_sender_public_key(&self) -> &[u8] {
        self.sender_public_key.as_slice()
    }

    pub fn get_amount(&self) -> u64 {
        self.amount
    }

    pub fn get_data(&self) -> &str {
        self.data.as_str()
    }

    pub fn get_tx_hash(&self) -> &str {
        self.tx_hash.as_str()
    }

    pub fn is_reward(&self) -> bool {
        self.data == MINER_REWARD_DATA && self.amount == MINING_REWARD
    }

    /// Recompute the hash from the fields and compare with the stored one.
    pub fn hash_matches(&self) -> bool {
        Self::compute_hash(
            &self.recipient,
            &self.sender_public_key,
            self.amount,
            &self.data,
        ) == self.tx_hash
    }
}
