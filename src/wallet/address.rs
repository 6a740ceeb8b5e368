//! Base58Check address codec
//!
//! `derive_address` turns an uncompressed public key into a checksummed
//! address: SHA-256, then RIPEMD-160, a version byte in front and the first
//! four bytes of a double SHA-256 behind, Base58 encoded. `verify_address`
//! is the matching check and never fails loudly: malformed input is `false`.

use crate::utils::{base58_encode, ripemd160_digest, sha256_digest};
use num_bigint::BigUint;
use once_cell::sync::Lazy;

const VERSION: u8 = 0x00;
pub const ADDRESS_CHECK_SUM_LEN: usize = 4;
/// version + pub key hash + checksum
pub const ADDRESS_PAYLOAD_LEN: usize = 25;
const VERSIONED_LEN: usize = ADDRESS_PAYLOAD_LEN - ADDRESS_CHECK_SUM_LEN;

pub const MIN_ADDRESS_LEN: usize = 26;
pub const MAX_ADDRESS_LEN: usize = 35;

const ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

static ALPHABET_INDEX: Lazy<[Option<u8>; 128]> = Lazy::new(|| {
    let mut index = [None; 128];
    for (digit, &ch) in ALPHABET.iter().enumerate() {
        index[ch as usize] = Some(digit as u8);
    }
    index
});

/// RIPEMD-160(SHA-256(pub_key))
pub fn hash_pub_key(pub_key: &[u8]) -> Vec<u8> {
    let pub_key_sha256 = sha256_digest(pub_key);
    ripemd160_digest(pub_key_sha256.as_slice())
}

fn checksum(payload: &[u8]) -> Vec<u8> {
    let first_sha = sha256_digest(payload);
    let second_sha = sha256_digest(first_sha.as_slice());
    second_sha[0..ADDRESS_CHECK_SUM_LEN].to_vec()
}

pub fn derive_address(public_key: &[u8]) -> String {
    convert_address(hash_pub_key(public_key).as_slice())
}

/// Build the address for an already hashed public key.
pub fn convert_address(pub_key_hash: &[u8]) -> String {
    let mut payload: Vec<u8> = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
    payload.push(VERSION);
    payload.extend(pub_key_hash);
    let checksum = checksum(payload.as_slice());
    payload.extend(checksum.as_slice());
    base58_encode(payload.as_slice())
}

pub fn verify_address(address: &str) -> bool {
    if address.len() < MIN_ADDRESS_LEN || address.len() > MAX_ADDRESS_LEN {
        return false;
    }
    let payload = match decode_base58_to_25_bytes(address) {
        Some(payload) => payload,
        None => return false,
    };

    let target_checksum = checksum(&payload[..VERSIONED_LEN]);
    payload[VERSIONED_LEN..] == target_checksum[..]
}

/// Decode the address as one big integer and right-align its bytes into a
/// 25-byte buffer. Leading `1` characters contribute nothing to the integer,
/// so the leading bytes of the buffer stay zero.
fn decode_base58_to_25_bytes(input: &str) -> Option<[u8; ADDRESS_PAYLOAD_LEN]> {
    let radix = BigUint::from(58u32);
    let mut num = BigUint::from(0u32);
    for ch in input.bytes() {
        let digit = ALPHABET_INDEX.get(ch as usize).copied().flatten()?;
        num = num * &radix + BigUint::from(digit);
    }

    let num_bytes = num.to_bytes_be();
    if num_bytes.len() > ADDRESS_PAYLOAD_LEN {
        return None;
    }
    let mut result = [0u8; ADDRESS_PAYLOAD_LEN];
    result[ADDRESS_PAYLOAD_LEN - num_bytes.len()..].copy_from_slice(&num_bytes);
    Some(result)
}
