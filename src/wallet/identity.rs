use crate::core::monetary::conversions::format_base_units;
use crate::error::Result;
use crate::utils::{base58_encode, new_key_pair, private_scalar_from_pkcs8};
use crate::wallet::derive_address;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A wallet identity: key material plus the address derived from it.
///
/// The address is computed once in the constructors and has no setter, so
/// `address == derive_address(public_key)` holds for the lifetime of the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Identity {
    private_key: Option<String>,
    public_key: Vec<u8>,
    address: String,
    balance: u64,
    locked: bool,
}

impl Identity {
    /// Generate a fresh P-256 key pair.
    pub fn generate() -> Result<Identity> {
        let keys = new_key_pair()?;
        let scalar = private_scalar_from_pkcs8(&keys.pkcs8)?;
        Ok(Identity::from_keys(HEXLOWER.encode(&scalar), keys.public_key))
    }

    /// Import an existing key pair. The private key is stored as given.
    pub fn from_keys(private_key: String, public_key: Vec<u8>) -> Identity {
        Identity::with_balance(private_key, public_key, 0)
    }

    pub fn with_balance(private_key: String, public_key: Vec<u8>, balance: u64) -> Identity {
        let address = derive_address(&public_key);
        Identity {
            private_key: Some(private_key),
            public_key,
            address,
            balance,
            locked: false,
        }
    }

    /// An identity known only by its public key.
    pub fn watch_only(public_key: Vec<u8>) -> Identity {
        let address = derive_address(&public_key);
        Identity {
            private_key: None,
            public_key,
            address,
            balance: 0,
            locked: false,
        }
    }

    pub fn get_private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    pub fn get_public_key(&self) -> &[u8] {
        self.public_key.as_slice()
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_balance(&self) -> u64 {
        self.balance
    }

    pub fn set_balance(&mut self, balance: u64) {
        self.balance = balance;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }
}

// Keeps the private key out of logs.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &base58_encode(&self.public_key))
            .field("address", &self.address)
            .field("balance", &self.balance)
            .field("locked", &self.locked)
            .finish()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Address:     {}", self.address)?;
        writeln!(f, "Public key:  {}", base58_encode(&self.public_key))?;
        if let Some(private_key) = &self.private_key {
            writeln!(f, "Private key: {private_key}")?;
        }
        write!(f, "Balance:     {}", format_base_units(self.balance))?;
        if self.locked {
            write!(f, " (locked)")?;
        }
        Ok(())
    }
}
