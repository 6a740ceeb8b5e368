use crate::core::TARGET_BITS;
use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_PEERS_KEY: &str = "NODE_PEERS";
const NODE_DATA_DIR_KEY: &str = "NODE_DATA_DIR";
const POW_TARGET_BITS_KEY: &str = "POW_TARGET_BITS";

/// Node settings as they appear in a TOML config file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub node_addr: String,
    pub peers: Vec<String>,
    pub data_dir: Option<PathBuf>,
    pub target_bits: u32,
    pub mining: bool,
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings {
            node_addr: DEFAULT_NODE_ADDR.to_string(),
            peers: Vec::new(),
            data_dir: None,
            target_bits: TARGET_BITS,
            mining: false,
        }
    }
}

impl NodeSettings {
    /// Layer defaults, then the TOML text if any, then the variables `lookup` yields.
    pub fn from_sources<F>(toml_text: Option<&str>, lookup: F) -> Result<NodeSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match toml_text {
            Some(text) => toml::from_str(text)?,
            None => NodeSettings::default(),
        };

        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            settings.node_addr = addr;
        }
        if let Some(peers) = lookup(NODE_PEERS_KEY) {
            settings.peers = parse_peer_list(&peers);
        }
        if let Some(dir) = lookup(NODE_DATA_DIR_KEY) {
            settings.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(bits) = lookup(POW_TARGET_BITS_KEY) {
            settings.target_bits = bits.trim().parse().map_err(|e| {
                BlockchainError::Config(format!("{POW_TARGET_BITS_KEY} is not a number: {e}"))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=255).contains(&self.target_bits) {
            return Err(BlockchainError::Config(format!(
                "Target bits {} is outside valid range [1, 255]",
                self.target_bits
            )));
        }
        if self.node_addr.trim().is_empty() {
            return Err(BlockchainError::Config("Node address is empty".to_string()));
        }
        Ok(())
    }
}

fn parse_peer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// Runtime configuration handed to the node at start-up.
pub struct Config {
    inner: RwLock<NodeSettings>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(NodeSettings::default())
    }
}

impl Config {
    pub fn from_settings(settings: NodeSettings) -> Config {
        Config {
            inner: RwLock::new(settings),
        }
    }

    /// Load defaults, the optional config file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let text = match path {
            Some(path) => Some(fs::read_to_string(path).map_err(|e| {
                BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
            })?),
            None => None,
        };
        let settings = NodeSettings::from_sources(text.as_deref(), |key| env::var(key).ok())?;
        Ok(Config::from_settings(settings))
    }

    fn read(&self) -> RwLockReadGuard<'_, NodeSettings> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, NodeSettings> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_node_addr(&self) -> String {
        self.read().node_addr.clone()
    }

    pub fn set_node_addr(&self, addr: String) {
        self.write().node_addr = addr;
    }

    pub fn get_peers(&self) -> Vec<String> {
        self.read().peers.clone()
    }

    pub fn get_target_bits(&self) -> u32 {
        self.read().target_bits
    }

    pub fn is_miner(&self) -> bool {
        self.read().mining
    }

    pub fn set_mining(&self, mining: bool) {
        self.write().mining = mining;
    }

    /// The configured data directory, or `./data/node_<port>` so several
    /// nodes can share a working directory.
    pub fn get_data_dir(&self) -> PathBuf {
        match &self.read().data_dir {
            Some(dir) => dir.clone(),
            None => PathBuf::from("data").join(format!("node_{}", self.extract_node_id_from_addr())),
        }
    }

    /// Extract node ID from address (e.g., "127.0.0.1:2001" -> "2001")
    pub fn extract_node_id_from_addr(&self) -> String {
        let addr = self.get_node_addr();
        match addr.rsplit_once(':') {
            Some((_, port)) if !port.is_empty() => port.to_string(),
            _ => "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = NodeSettings::from_sources(None, env_of(&[])).unwrap();
        assert_eq!(settings, NodeSettings::default());

        let config = Config::from_settings(settings);
        assert_eq!(config.get_node_addr(), "127.0.0.1:2001");
        assert_eq!(config.get_target_bits(), 20);
        assert!(!config.is_miner());
        assert_eq!(config.get_data_dir(), PathBuf::from("data").join("node_2001"));
    }

    #[test]
    fn test_file_then_environment() {
        let toml_text = r#"
            node_addr = "127.0.0.1:3000"
            peers = ["127.0.0.1:3001"]
            target_bits = 12
            mining = true
        "#;
        let settings = NodeSettings::from_sources(
            Some(toml_text),
            env_of(&[
                ("NODE_PEERS", "127.0.0.1:4001, 127.0.0.1:4002,"),
                ("NODE_DATA_DIR", "/tmp/chain"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.node_addr, "127.0.0.1:3000");
        assert_eq!(settings.peers, vec!["127.0.0.1:4001", "127.0.0.1:4002"]);
        assert_eq!(settings.data_dir, Some(PathBuf::from("/tmp/chain")));
        assert_eq!(settings.target_bits, 12);
        assert!(settings.mining);
    }

    #[test]
    fn test_target_bits_are_bounded() {
        for bad in ["0", "256", "twenty"] {
            let result = NodeSettings::from_sources(None, env_of(&[("POW_TARGET_BITS", bad)]));
            assert!(matches!(result, Err(BlockchainError::Config(_))), "{bad}");
        }
        let ok = NodeSettings::from_sources(None, env_of(&[("POW_TARGET_BITS", "255")])).unwrap();
        assert_eq!(ok.target_bits, 255);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let result = NodeSettings::from_sources(Some("target_bits = \"x\""), env_of(&[]));
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_node_id_from_addr() {
        let config = Config::default();
        config.set_node_addr("localhost:4005".to_string());
        assert_eq!(config.extract_node_id_from_addr(), "4005");
        config.set_node_addr("localhost".to_string());
        assert_eq!(config.extract_node_id_from_addr(), "default");
    }
}
