//! Per-operation configuration.
//!
//! [`DeriveConfig`] drives mnemonic address listings and [`SpendConfig`]
//! drives transaction signing. Both are plain values with defaults and can
//! be built programmatically or deserialized from JSON.

use serde::{Deserialize, Serialize};

use gd_core::address::Network;
use gd_core::constants::{DEFAULT_ADDRESS_COUNT, DEFAULT_FEE_RATE};

use crate::path::PathPolicy;

/// Settings for deriving addresses from a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriveConfig {
    /// Which derivation path maps an index to a key.
    pub path_policy: PathPolicy,
    /// Network whose version bytes the addresses use.
    pub network: Network,
    /// How many indices to list, starting at 0.
    pub address_count: u32,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            path_policy: PathPolicy::Default,
            network: Network::Mainnet,
            address_count: DEFAULT_ADDRESS_COUNT,
        }
    }
}

/// Settings for building and signing a spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpendConfig {
    /// Fee rate in satoshis per byte of estimated size.
    pub fee_rate: u64,
    /// Network the destination address must belong to.
    pub network: Network,
}

impl Default for SpendConfig {
    fn default() -> Self {
        Self {
            fee_rate: DEFAULT_FEE_RATE,
            network: Network::Mainnet,
        }
    }
}
