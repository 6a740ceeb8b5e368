//! Utility functions and helpers
//!
//! This module contains cryptographic utilities, encoding functions,
//! and the bincode serialization layer used for blocks and accounts.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_encode, current_timestamp, new_key_pair, private_scalar_from_pkcs8,
    ripemd160_digest, sha256_digest, GeneratedKeyPair,
};

pub use serialization::{deserialize, serialize};
