//! Network profiles and Base58Check addresses.
//!
//! Every encode/decode in goodelivery takes a [`Network`] explicitly. The two
//! presets fix the version bytes used for:
//! - pay-to-pubkey-hash addresses (`1...` / `m...`, `n...`)
//! - pay-to-script-hash addresses (`3...` / `2...`)
//! - WIF private keys (`5...`, `K...`, `L...` / `9...`, `c...`)
//! - BIP38 encrypted keys (`6P...` on both networks)
//!
//! An address encodes a version byte and the 20-byte HASH160 of either a
//! public key or a redeem script.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::base58;
use crate::crypto::PublicKey;
use crate::error::AddressError;
use crate::script::{self, StandardScript};

/// Network profile selecting the version bytes for all encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet.
    #[default]
    Mainnet,
    /// Bitcoin testnet3.
    Testnet,
}

impl Network {
    /// Both supported presets.
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    /// Version byte for pay-to-pubkey-hash addresses.
    pub fn pubkey_hash_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    /// Version byte for pay-to-script-hash addresses.
    pub fn script_hash_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet => 0xc4,
        }
    }

    /// Version byte for WIF-encoded private keys.
    pub fn wif_version(&self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xef,
        }
    }

    /// Two-byte prefix of BIP38 encrypted keys.
    pub fn encrypted_key_prefix(&self) -> [u8; 2] {
        match self {
            Network::Mainnet | Network::Testnet => [0x01, 0x42],
        }
    }

    /// SLIP-44 coin type used at the second level of a BIP44 path.
    pub fn bip44_coin_type(&self) -> u32 {
        match self {
            Network::Mainnet => 0,
            Network::Testnet => 1,
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "testnet3" | "test" => Ok(Network::Testnet),
            _ => Err(AddressError::UnknownNetwork(s.to_string())),
        }
    }
}

/// What the 20-byte hash in an address commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// HASH160 of a public key (P2PKH).
    PubkeyHash,
    /// HASH160 of a redeem script (P2SH).
    ScriptHash,
}

/// A Base58Check address bound to a network.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address {
    network: Network,
    kind: AddressKind,
    hash: [u8; 20],
}

impl Address {
    /// Create a P2PKH address from a pubkey hash.
    pub fn from_pubkey_hash(hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::PubkeyHash,
            hash,
        }
    }

    /// Create a P2SH address from a script hash.
    pub fn from_script_hash(hash: [u8; 20], network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::ScriptHash,
            hash,
        }
    }

    /// Create a P2PKH address from a public key, honouring its compression.
    pub fn from_public_key(public_key: &PublicKey, network: Network) -> Self {
        Self::from_pubkey_hash(public_key.pubkey_hash(), network)
    }

    /// Recover the address a locking script pays to, if it is standard.
    pub fn from_script(script_pubkey: &[u8], network: Network) -> Option<Self> {
        match script::classify(script_pubkey)? {
            StandardScript::PubkeyHash(hash) => Some(Self::from_pubkey_hash(hash, network)),
            StandardScript::ScriptHash(hash) => Some(Self::from_script_hash(hash, network)),
        }
    }

    /// The 20-byte hash committed to by this address.
    pub fn hash(&self) -> &[u8; 20] {
        &self.hash
    }

    /// Whether the hash is of a public key or of a script.
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The network this address belongs to.
    pub fn network(&self) -> Network {
        self.network
    }

    /// The standard locking script paying to this address.
    pub fn script_pubkey(&self) -> Vec<u8> {
        match self.kind {
            AddressKind::PubkeyHash => script::p2pkh_script(&self.hash),
            AddressKind::ScriptHash => script::p2sh_script(&self.hash),
        }
    }

    fn version(&self) -> u8 {
        match self.kind {
            AddressKind::PubkeyHash => self.network.pubkey_hash_version(),
            AddressKind::ScriptHash => self.network.script_hash_version(),
        }
    }

    /// Encode as a Base58Check string.
    pub fn encode(&self) -> String {
        let mut payload = Vec::with_capacity(21);
        payload.push(self.version());
        payload.extend_from_slice(&self.hash);
        base58::encode_check(&payload)
    }

    /// Decode an address that must belong to `network`.
    pub fn decode(s: &str, network: Network) -> Result<Self, AddressError> {
        let address = Self::decode_any(s)?;
        if address.network != network {
            return Err(AddressError::NetworkMismatch {
                expected: network.to_string(),
                found: address.network.to_string(),
            });
        }
        Ok(address)
    }

    /// Decode an address of either network, inferring it from the version byte.
    pub fn decode_any(s: &str) -> Result<Self, AddressError> {
        let payload = base58::decode_check(s)?;
        if payload.len() != 21 {
            return Err(AddressError::InvalidLength(payload.len()));
        }
        let version = payload[0];
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);

        for network in Network::ALL {
            if version == network.pubkey_hash_version() {
                return Ok(Self::from_pubkey_hash(hash, network));
            }
            if version == network.script_hash_version() {
                return Ok(Self::from_script_hash(hash, network));
            }
        }
        Err(AddressError::InvalidVersion(version))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode_any(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode_any(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Base58Error;

    const GENESIS: &str = "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa";

    fn genesis_hash() -> [u8; 20] {
        let bytes = hex::decode("62e907b15cbf27d5425399ebf6f0fb50ebb88f18").unwrap();
        bytes.try_into().unwrap()
    }

    #[test]
    fn mainnet_p2pkh_roundtrip() {
        let addr = Address::decode(GENESIS, Network::Mainnet).unwrap();
        assert_eq!(addr.kind(), AddressKind::PubkeyHash);
        assert_eq!(addr.hash(), &genesis_hash());
        assert_eq!(addr.encode(), GENESIS);
    }

    #[test]
    fn testnet_prefix() {
        let addr = Address::from_pubkey_hash(genesis_hash(), Network::Testnet);
        let s = addr.encode();
        assert!(s.starts_with('m') || s.starts_with('n'), "got {s}");
        assert_eq!(Address::decode(&s, Network::Testnet).unwrap(), addr);
    }

    #[test]
    fn p2sh_prefixes() {
        let main = Address::from_script_hash([0x11; 20], Network::Mainnet).encode();
        let test = Address::from_script_hash([0x11; 20], Network::Testnet).encode();
        assert!(main.starts_with('3'), "got {main}");
        assert!(test.starts_with('2'), "got {test}");
    }

    #[test]
    fn wrong_network_rejected() {
        let err = Address::decode(GENESIS, Network::Testnet).unwrap_err();
        assert!(matches!(err, AddressError::NetworkMismatch { .. }));
    }

    #[test]
    fn unknown_version_rejected() {
        let mut payload = vec![0x30];
        payload.extend_from_slice(&[0u8; 20]);
        let s = base58::encode_check(&payload);
        assert_eq!(
            Address::decode_any(&s).unwrap_err(),
            AddressError::InvalidVersion(0x30)
        );
    }

    #[test]
    fn wrong_length_rejected() {
        let s = base58::encode_check(&[0x00; 10]);
        assert_eq!(
            Address::decode_any(&s).unwrap_err(),
            AddressError::InvalidLength(10)
        );
    }

    #[test]
    fn bad_checksum_rejected() {
        let err = Address::decode_any("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNb").unwrap_err();
        assert_eq!(err, AddressError::Base58(Base58Error::InvalidChecksum));
    }

    #[test]
    fn script_roundtrip_through_address() {
        let addr = Address::decode(GENESIS, Network::Mainnet).unwrap();
        let script = addr.script_pubkey();
        assert_eq!(Address::from_script(&script, Network::Mainnet), Some(addr));
    }

    #[test]
    fn nonstandard_script_has_no_address() {
        assert_eq!(Address::from_script(&[0x6a, 0x01, 0x00], Network::Mainnet), None);
    }

    #[test]
    fn network_from_str() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Mainnet);
        assert_eq!("TESTNET".parse::<Network>().unwrap(), Network::Testnet);
        assert!("regtest".parse::<Network>().is_err());
    }

    #[test]
    fn network_default_is_mainnet() {
        assert_eq!(Network::default(), Network::Mainnet);
    }

    #[test]
    fn address_serde_json_roundtrip() {
        let addr = Address::decode(GENESIS, Network::Mainnet).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{GENESIS}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
