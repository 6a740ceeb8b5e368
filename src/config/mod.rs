//! Configuration management
//!
//! Node address, peers, data directory, proof-of-work target bits and the
//! mining flag, layered from defaults, a TOML file and the environment.

pub mod settings;

pub use settings::{Config, NodeSettings};
