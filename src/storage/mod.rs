//! Data storage and persistence
//!
//! The consensus engine and sync coordinator only see the traits in
//! `traits`; the node wires them to the sled-backed `ChainStore`, tests
//! usually to the in-memory handles.

pub mod chain_store;
pub mod memory;
pub mod traits;

pub use chain_store::ChainStore;
pub use memory::{FixedCoinbase, InMemoryHeight};
pub use traits::{ChainHeightStore, CoinbaseLookup};
