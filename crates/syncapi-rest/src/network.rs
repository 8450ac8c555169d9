//! Network selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Ledger network the database indexes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network
    #[default]
    Mainnet,
    /// Pre-production testnet
    Preprod,
    /// Preview testnet
    Preview,
}

impl Network {
    /// Slots per epoch
    pub fn epoch_length(&self) -> i64 {
        match self {
            Network::Mainnet | Network::Preprod => 432_000,
            Network::Preview => 86_400,
        }
    }

    /// Whether addresses carry the mainnet network id
    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Mainnet)
    }

    /// Lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Preprod => "preprod",
            Network::Preview => "preview",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Network::Mainnet),
            "preprod" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            other => Err(format!("unknown network: {}", other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_length() {
        assert_eq!(Network::Mainnet.epoch_length(), 432_000);
        assert_eq!(Network::Preprod.epoch_length(), 432_000);
        assert_eq!(Network::Preview.epoch_length(), 86_400);
    }

    #[test]
    fn test_parse_and_display() {
        for network in [Network::Mainnet, Network::Preprod, Network::Preview] {
            assert_eq!(network.to_string().parse::<Network>().unwrap(), network);
        }
        assert!("testnet".parse::<Network>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let network: Network = serde_json::from_str("\"preview\"").unwrap();
        assert_eq!(network, Network::Preview);
        assert_eq!(serde_json::to_string(&Network::Mainnet).unwrap(), "\"mainnet\"");
    }
}
