//! Network identifiers: magic bytes and default ports.

use std::fmt;
use std::str::FromStr;

use crate::error::NodeError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Mainnet,
    Testnet,
    Testnet3,
    Regtest,
}

impl Network {
    pub fn magic(&self) -> u32 {
        match self {
            Network::Mainnet => 0xD9B4_BEF9,
            Network::Testnet => 0xDAB5_BFFA,
            Network::Testnet3 => 0x0709_110B,
            Network::Regtest => 0xDAB5_BFFA,
        }
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            0xD9B4_BEF9 => Some(Network::Mainnet),
            0xDAB5_BFFA => Some(Network::Testnet),
            0x0709_110B => Some(Network::Testnet3),
            _ => None,
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Network::Mainnet => 8333,
            Network::Testnet => 18333,
            Network::Testnet3 => 18333,
            Network::Regtest => 18444,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
            Network::Testnet3 => "testnet3",
            Network::Regtest => "regtest",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Network {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "testnet" => Ok(Network::Testnet),
            "testnet3" => Ok(Network::Testnet3),
            "regtest" => Ok(Network::Regtest),
            other => Err(NodeError::Config(format!("unknown network type: {other}"))),
        }
    }
}
