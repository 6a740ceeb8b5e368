//! Wallet identities and addresses
//!
//! Address derivation and checking, the identity type that ties key material
//! to an address, and the node's account list.

pub mod address;
pub mod identity;
pub mod wallets;

pub use address::{
    convert_address, derive_address, hash_pub_key, verify_address, ADDRESS_CHECK_SUM_LEN,
};
pub use identity::Identity;
pub use wallets::Wallets;
