use crate::error::{BlockchainError, Result};
use crate::storage::ChainStore;
use crate::wallet::{verify_address, Identity};
use log::info;

/// The accounts a node holds keys for, kept in the chain store.
///
/// The first account created on a node becomes its coinbase, so a node can
/// start mining right after `newaccount` without a separate `setcoinbase`.
pub struct Wallets {
    store: ChainStore,
}

impl Wallets {
    pub fn new(store: ChainStore) -> Wallets {
        Wallets { store }
    }

    pub fn create_wallet(&self) -> Result<Identity> {
        let identity = Identity::generate()?;
        self.store.put_account(&identity)?;
        if self.store.get_coinbase()?.is_none() {
            self.store.set_coinbase(identity.get_address())?;
            info!("Coinbase set to new account {}", identity.get_address());
        }
        Ok(identity)
    }

    pub fn get_addresses(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .list_accounts()?
            .into_iter()
            .map(|identity| identity.get_address().to_string())
            .collect())
    }

    pub fn get_wallet(&self, address: &str) -> Result<Option<Identity>> {
        self.store.get_account(address)
    }

    pub fn get_coinbase(&self) -> Result<Option<Identity>> {
        self.store.get_coinbase()
    }

    pub fn set_coinbase(&self, address: &str) -> Result<()> {
        if !verify_address(address) {
            return Err(BlockchainError::InvalidAddress(address.to_string()));
        }
        self.store.set_coinbase(address)?;
        info!("Coinbase set to {address}");
        Ok(())
    }
}
