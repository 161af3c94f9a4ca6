//! Configuration: CLI flags, JSON config file, and the merge between them.
//!
//! CLI flags always take precedence over values loaded from a config
//! file; a config file is optional.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::codec::Network;
use crate::error::{NodeError, Result};

#[derive(Debug, Parser)]
#[command(name = "spv-node", about = "A headers-only SPV Bitcoin peer")]
pub struct Cli {
    /// Path to a JSON config file.
    #[arg(long = "conf", value_name = "path")]
    pub conf: Option<PathBuf>,

    /// Host of the single peer to connect to.
    #[arg(long = "fullnode", value_name = "host")]
    pub fullnode: Option<String>,

    /// Port of the peer to connect to.
    #[arg(long = "port", value_name = "port")]
    pub port: Option<u16>,

    /// Network to speak: mainnet, testnet, testnet3, or regtest.
    #[arg(long = "network_type", value_name = "network")]
    pub network_type: Option<String>,
}

/// The JSON config file shape. All keys optional; unknown keys ignored
/// by `serde`'s default (non-deny-unknown-fields) behavior.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub fullnode: Option<String>,
    pub port: Option<String>,
    pub network_type: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    5
}

impl ConfigFile {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|_| NodeError::Config(format!("malformed config file: {}", path.display())))
    }
}

/// Fully resolved configuration: CLI flags merged over an optional
/// config file, with defaults filled in.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub fullnode: String,
    pub port: u16,
    pub network: Network,
    pub max_retries: u32,
    pub data_dir: PathBuf,
}

impl NodeConfig {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let file = match &cli.conf {
            Some(path) => Some(ConfigFile::load(path)?),
            None => None,
        };

        let fullnode = cli
            .fullnode
            .or_else(|| file.as_ref().and_then(|f| f.fullnode.clone()))
            .unwrap_or_else(|| "127.0.0.1".to_string());

        let network: Network = cli
            .network_type
            .or_else(|| file.as_ref().and_then(|f| f.network_type.clone()))
            .as_deref()
            .unwrap_or("mainnet")
            .parse()
            .map_err(|_| NodeError::Config("invalid network_type".into()))?;

        let port = if let Some(p) = cli.port {
            p
        } else if let Some(p) = file.as_ref().and_then(|f| f.port.as_deref()) {
            p.parse().map_err(|_| NodeError::Config("invalid port in config file".into()))?
        } else {
            network.default_port()
        };

        let max_retries = file.as_ref().map(|f| f.max_retries).unwrap_or_else(default_max_retries);

        Ok(NodeConfig { fullnode, port, network, max_retries, data_dir: PathBuf::from("./data/") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_specified() {
        let cli = Cli { conf: None, fullnode: None, port: None, network_type: None };
        let config = NodeConfig::from_cli(cli).unwrap();
        assert_eq!(config.fullnode, "127.0.0.1");
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.port, 8333);
        assert_eq!(config.max_retries, 5);
    }

    #[test]
    fn cli_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        std::fs::write(&path, r#"{"fullnode":"10.0.0.1","port":"18333","network_type":"testnet"}"#).unwrap();

        let cli = Cli {
            conf: Some(path),
            fullnode: Some("192.168.0.1".to_string()),
            port: None,
            network_type: None,
        };
        let config = NodeConfig::from_cli(cli).unwrap();
        assert_eq!(config.fullnode, "192.168.0.1");
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.port, 18333);
    }

    #[test]
    fn unknown_config_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.json");
        std::fs::write(&path, r#"{"fullnode":"10.0.0.1","unexpected_key":true}"#).unwrap();
        let file = ConfigFile::load(&path).unwrap();
        assert_eq!(file.fullnode.as_deref(), Some("10.0.0.1"));
        assert_eq!(file.max_retries, 5);
    }
}
