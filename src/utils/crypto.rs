use ring::digest::{Context, SHA256};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use ripemd::{Digest as RipemdDigest, Ripemd160};

use crate::error::{BlockchainError, Result};
use std::time::{SystemTime, UNIX_EPOCH};

// Layout of the PKCS#8 v1 document ring emits for P-256 keys:
// the 32-byte private scalar follows the `04 20` OCTET STRING header.
const P256_PKCS8_LEN: usize = 138;
const P256_SCALAR_OFFSET: usize = 36;
const P256_SCALAR_LEN: usize = 32;

pub fn current_timestamp() -> Result<i64> {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| BlockchainError::Crypto(format!("System time error: {e}")))?
        .as_millis();

    if duration > i64::MAX as u128 {
        return Err(BlockchainError::Crypto("Timestamp overflow".to_string()));
    }

    Ok(duration as i64)
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn ripemd160_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Generated key material: the PKCS#8 document plus the uncompressed public point.
pub struct GeneratedKeyPair {
    pub pkcs8: Vec<u8>,
    pub public_key: Vec<u8>,
}

pub fn new_key_pair() -> Result<GeneratedKeyPair> {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
        .map_err(|e| BlockchainError::Crypto(format!("Failed to generate ECDSA key pair: {e}")))?
        .as_ref()
        .to_vec();
    let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
        .map_err(|e| {
            BlockchainError::Crypto(format!("Failed to create key pair from PKCS8: {e}"))
        })?;
    let public_key = key_pair.public_key().as_ref().to_vec();
    Ok(GeneratedKeyPair { pkcs8, public_key })
}

/// Extract the raw private scalar from a ring-generated P-256 PKCS#8 document.
pub fn private_scalar_from_pkcs8(pkcs8: &[u8]) -> Result<Vec<u8>> {
    if pkcs8.len() != P256_PKCS8_LEN
        || pkcs8[P256_SCALAR_OFFSET - 2..P256_SCALAR_OFFSET] != [0x04, 0x20]
    {
        return Err(BlockchainError::Crypto(
            "Unexpected PKCS8 layout for a P-256 private key".to_string(),
        ));
    }
    Ok(pkcs8[P256_SCALAR_OFFSET..P256_SCALAR_OFFSET + P256_SCALAR_LEN].to_vec())
}
