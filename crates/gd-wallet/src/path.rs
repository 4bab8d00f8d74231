//! BIP-32 derivation paths and the two supported path policies.
//!
//! | policy    | path                      |
//! |-----------|---------------------------|
//! | `default` | `m/0'/0'/k`               |
//! | `bip44`   | `m/44'/coin'/0'/0/k`      |
//!
//! `coin` is 0 on mainnet and 1 on testnet. The address index `k` is always
//! a non-hardened step.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use gd_core::address::Network;

use crate::error::WalletError;

/// Bit marking a hardened child index.
pub const HARDENED_BIT: u32 = 0x8000_0000;

/// One step of a derivation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildNumber {
    Normal(u32),
    Hardened(u32),
}

impl ChildNumber {
    /// Build a non-hardened step. `index` must be below 2^31.
    pub fn normal(index: u32) -> Result<Self, WalletError> {
        if index & HARDENED_BIT != 0 {
            return Err(WalletError::UnsupportedPath(format!("index {index} out of range")));
        }
        Ok(ChildNumber::Normal(index))
    }

    /// Build a hardened step. `index` must be below 2^31.
    pub fn hardened(index: u32) -> Result<Self, WalletError> {
        if index & HARDENED_BIT != 0 {
            return Err(WalletError::UnsupportedPath(format!("index {index}' out of range")));
        }
        Ok(ChildNumber::Hardened(index))
    }

    /// Decode the 32-bit wire form.
    pub fn from_raw(raw: u32) -> Self {
        if raw & HARDENED_BIT != 0 {
            ChildNumber::Hardened(raw & !HARDENED_BIT)
        } else {
            ChildNumber::Normal(raw)
        }
    }

    /// The 32-bit wire form, with the hardened bit applied.
    pub fn to_raw(self) -> u32 {
        match self {
            ChildNumber::Normal(i) => i,
            ChildNumber::Hardened(i) => i | HARDENED_BIT,
        }
    }

    pub fn is_hardened(self) -> bool {
        matches!(self, ChildNumber::Hardened(_))
    }

    /// The next index with the same hardening, if it stays in range.
    pub fn successor(self) -> Option<Self> {
        let next = (self.to_raw() & !HARDENED_BIT)
            .checked_add(1)
            .filter(|n| n & HARDENED_BIT == 0)?;
        Some(if self.is_hardened() {
            ChildNumber::Hardened(next)
        } else {
            ChildNumber::Normal(next)
        })
    }
}

impl fmt::Display for ChildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildNumber::Normal(i) => write!(f, "{i}"),
            ChildNumber::Hardened(i) => write!(f, "{i}'"),
        }
    }
}

impl FromStr for ChildNumber {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digits, hardened) = match s.strip_suffix(['\'', 'h', 'H']) {
            Some(d) => (d, true),
            None => (s, false),
        };
        let index: u32 = digits
            .parse()
            .map_err(|_| WalletError::UnsupportedPath(format!("bad path component {s:?}")))?;
        if hardened {
            ChildNumber::hardened(index)
        } else {
            ChildNumber::normal(index)
        }
    }
}

/// A path from the master key, e.g. `m/44'/0'/0'/0/3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct DerivationPath(Vec<ChildNumber>);

impl DerivationPath {
    pub fn master() -> Self {
        Self(Vec::new())
    }

    pub fn steps(&self) -> &[ChildNumber] {
        &self.0
    }

    /// A new path with `child` appended.
    pub fn child(&self, child: ChildNumber) -> Self {
        let mut steps = self.0.clone();
        steps.push(child);
        Self(steps)
    }
}

impl From<Vec<ChildNumber>> for DerivationPath {
    fn from(steps: Vec<ChildNumber>) -> Self {
        Self(steps)
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("m")?;
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        if parts.next() != Some("m") {
            return Err(WalletError::UnsupportedPath(format!("path must start with m: {s:?}")));
        }
        parts.map(str::parse).collect::<Result<Vec<_>, _>>().map(Self)
    }
}

/// Which derivation scheme maps an address index to a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathPolicy {
    /// `m/0'/0'/k`
    #[default]
    Default,
    /// `m/44'/coin'/0'/0/k`
    Bip44,
}

impl PathPolicy {
    /// Path to the parent of every address key under this policy.
    pub fn branch(&self, network: Network) -> DerivationPath {
        use ChildNumber::{Hardened, Normal};
        match self {
            PathPolicy::Default => vec![Hardened(0), Hardened(0)].into(),
            PathPolicy::Bip44 => {
                vec![Hardened(44), Hardened(network.bip44_coin_type()), Hardened(0), Normal(0)].into()
            }
        }
    }

    /// Full path of the key at address `index`.
    pub fn path(&self, network: Network, index: u32) -> Result<DerivationPath, WalletError> {
        Ok(self.branch(network).child(ChildNumber::normal(index)?))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PathPolicy::Default => "default",
            PathPolicy::Bip44 => "bip44",
        }
    }
}

impl fmt::Display for PathPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PathPolicy {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(PathPolicy::Default),
            "bip44" => Ok(PathPolicy::Bip44),
            _ => Err(WalletError::UnsupportedPath(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_path() {
        let path = PathPolicy::Default.path(Network::Mainnet, 5).unwrap();
        assert_eq!(path.to_string(), "m/0'/0'/5");
    }

    #[test]
    fn bip44_coin_follows_network() {
        assert_eq!(
            PathPolicy::Bip44.path(Network::Mainnet, 0).unwrap().to_string(),
            "m/44'/0'/0'/0/0"
        );
        assert_eq!(
            PathPolicy::Bip44.path(Network::Testnet, 2).unwrap().to_string(),
            "m/44'/1'/0'/0/2"
        );
    }

    #[test]
    fn hardened_index_rejected_for_address() {
        assert!(matches!(
            PathPolicy::Default.path(Network::Mainnet, HARDENED_BIT).unwrap_err(),
            WalletError::UnsupportedPath(_)
        ));
    }

    #[test]
    fn unknown_policy_rejected() {
        assert_eq!("BIP44".parse::<PathPolicy>().unwrap(), PathPolicy::Bip44);
        assert!(matches!(
            "bip49".parse::<PathPolicy>().unwrap_err(),
            WalletError::UnsupportedPath(_)
        ));
    }

    #[test]
    fn policy_serde_lowercase() {
        assert_eq!(serde_json::to_string(&PathPolicy::Bip44).unwrap(), "\"bip44\"");
        let back: PathPolicy = serde_json::from_str("\"default\"").unwrap();
        assert_eq!(back, PathPolicy::Default);
    }

    #[test]
    fn path_parse_roundtrip() {
        let path: DerivationPath = "m/44'/0h/0H/0/7".parse().unwrap();
        assert_eq!(path.to_string(), "m/44'/0'/0'/0/7");
        assert_eq!(path.steps().len(), 5);
        assert_eq!("m".parse::<DerivationPath>().unwrap(), DerivationPath::master());
    }

    #[test]
    fn path_parse_rejects_garbage() {
        assert!("44'/0'".parse::<DerivationPath>().is_err());
        assert!("m/x".parse::<DerivationPath>().is_err());
        assert!("m/2147483648".parse::<DerivationPath>().is_err());
    }

    #[test]
    fn raw_roundtrip() {
        for child in [ChildNumber::Normal(3), ChildNumber::Hardened(3)] {
            assert_eq!(ChildNumber::from_raw(child.to_raw()), child);
        }
        assert_eq!(ChildNumber::Hardened(0).to_raw(), HARDENED_BIT);
    }

    #[test]
    fn successor_stops_at_range_end() {
        assert_eq!(ChildNumber::Normal(1).successor(), Some(ChildNumber::Normal(2)));
        assert_eq!(ChildNumber::Normal(HARDENED_BIT - 1).successor(), None);
        assert_eq!(ChildNumber::Hardened(HARDENED_BIT - 1).successor(), None);
    }
}
