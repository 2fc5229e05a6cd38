// common/src/network.rs
use serde::{Deserialize, Serialize};

/// Chains the platform knows by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    AbstractMainnet,
    AbstractTestnet,
}

impl Network {
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            2741 => Some(Self::AbstractMainnet),
            11124 => Some(Self::AbstractTestnet),
            _ => None,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::AbstractMainnet => 2741,
            Self::AbstractTestnet => 11124,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AbstractMainnet => "Abstract Mainnet",
            Self::AbstractTestnet => "Abstract Testnet",
        }
    }

    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::AbstractMainnet => "https://api.mainnet.abs.xyz",
            Self::AbstractTestnet => "https://api.testnet.abs.xyz",
        }
    }
}

/// Human readable chain name for logs
pub fn network_name(chain_id: u64) -> &'static str {
    Network::from_chain_id(chain_id)
        .map(|n| n.name())
        .unwrap_or("Unknown Network")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_networks() {
        for network in [Network::AbstractMainnet, Network::AbstractTestnet] {
            assert_eq!(Network::from_chain_id(network.chain_id()), Some(network));
        }
        assert_eq!(network_name(11124), "Abstract Testnet");
        assert_eq!(network_name(1), "Unknown Network");
    }
}
