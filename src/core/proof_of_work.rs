use crate::core::BlockHeader;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Required leading zero bits of a header hash.
pub const TARGET_BITS: u32 = 20;

// How many nonces are tried between two looks at the cancel token.
const CANCEL_CHECK_INTERVAL: u64 = 4096;

/// Shared flag used to abort a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Output of a search: the target it ran against, the winning nonce and the hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowResult {
    pub target: BigUint,
    pub nonce: u64,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target_bits: u32,
    target: BigUint,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        ProofOfWork {
            target_bits: TARGET_BITS,
            target: BigUint::from(1u32) << (256 - TARGET_BITS),
        }
    }
}

impl ProofOfWork {
    pub fn new(target_bits: u32) -> Result<ProofOfWork> {
        if target_bits == 0 || target_bits > 255 {
            return Err(BlockchainError::Config(format!(
                "Target bits must be within 1..=255, got {target_bits}"
            )));
        }
        Ok(ProofOfWork {
            target_bits,
            target: BigUint::from(1u32) << (256 - target_bits),
        })
    }

    pub fn get_target_bits(&self) -> u32 {
        self.target_bits
    }

    /// `1 << (256 - target_bits)`; a hash is valid when it is strictly below it.
    pub fn compute_target(&self) -> BigUint {
        self.target.clone()
    }

    /// Search nonces from zero upwards until the header hash falls under the target.
    pub fn mine(&self, header: &BlockHeader) -> Result<PowResult> {
        self.search(header, None)
    }

    /// Like [`ProofOfWork::mine`], returning `MiningCancelled` once `cancel` is set.
    pub fn mine_with_cancel(&self, header: &BlockHeader, cancel: &CancelToken) -> Result<PowResult> {
        self.search(header, Some(cancel))
    }

    fn search(&self, header: &BlockHeader, cancel: Option<&CancelToken>) -> Result<PowResult> {
        let mut candidate = header.clone();
        candidate.set_difficulty_target(&self.target);

        info!(
            "Mining block {} with {} target bits",
            candidate.get_index(),
            self.target_bits
        );
        let mut nonce: u64 = 0;
        loop {
            if nonce % CANCEL_CHECK_INTERVAL == 0 && cancel.is_some_and(CancelToken::is_cancelled) {
                debug!("Search for block {} cancelled at nonce {nonce}", candidate.get_index());
                return Err(BlockchainError::MiningCancelled);
            }

            let hash = sha256_digest(&candidate.canonical_bytes_with_nonce(nonce));
            if BigUint::from_bytes_be(&hash) < self.target {
                let hash = HEXLOWER.encode(&hash);
                info!("Found nonce {nonce} for block {}: {hash}", candidate.get_index());
                return Ok(PowResult {
                    target: self.target.clone(),
                    nonce,
                    hash,
                });
            }

            nonce = nonce.checked_add(1).ok_or_else(|| {
                BlockchainError::Mining(format!(
                    "Nonce space exhausted for block {}",
                    candidate.get_index()
                ))
            })?;
        }
    }

    /// Recompute the header hash with its own nonce and compare it with its
    /// own declared target. Linkage and the legitimacy of the declared target
    /// are not checked here.
    pub fn validate(header: &BlockHeader) -> bool {
        let hash = sha256_digest(&header.canonical_bytes());
        BigUint::from_bytes_be(&hash) < header.get_difficulty_target()
    }
}
