//! BIP-38 passphrase-protected private keys (non-EC-multiplied mode).
//!
//! # Wire format
//! ```text
//! 0x01 0x42 || flag || address_hash (4) || encrypted_half1 (16) || encrypted_half2 (16)
//! ```
//! Base58Check-encoded, so 43 bytes once the checksum is appended. `flag`
//! is `0xc0`, with `0x20` added when the key is compressed.
//!
//! # Key schedule
//! 1. `address_hash` = first 4 bytes of double-SHA-256 of the key's address text
//! 2. `derived` = scrypt(passphrase, address_hash, N=16384, r=8, p=8, 64 bytes)
//! 3. `encrypted_halfN` = AES-256-ECB(key half N XOR `derived[0..32]` half N,
//!    key = `derived[32..64]`)
//!
//! Decryption checks the address hash against the recovered key, which is
//! how a wrong passphrase is detected.

use aes::Aes256;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use std::fmt;
use std::str::FromStr;
use tracing::debug;
use zeroize::Zeroizing;

use gd_core::address::Network;
use gd_core::base58;
use gd_core::crypto::{double_sha256, PrivateKey};

use crate::error::WalletError;

/// Decoded length without the Base58Check checksum.
pub const ENCRYPTED_KEY_LEN: usize = 39;

/// Flag bits marking the non-EC-multiplied mode.
pub const FLAG_NO_EC_MULTIPLY: u8 = 0xc0;

/// Flag bit marking a compressed-key record.
pub const FLAG_COMPRESSED: u8 = 0x20;

/// Prefix of EC-multiplied records, which are not supported.
const EC_MULTIPLY_PREFIX: [u8; 2] = [0x01, 0x43];

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 8;

/// A structurally valid BIP-38 record. Holds no secrets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedKey {
    flag: u8,
    address_hash: [u8; 4],
    encrypted_half1: [u8; 16],
    encrypted_half2: [u8; 16],
}

impl EncryptedKey {
    /// Validate a Base58Check record without touching the passphrase.
    pub fn parse(record: &str, network: Network) -> Result<Self, WalletError> {
        let payload = base58::decode_check(record).map_err(|e| WalletError::InvalidRecord(e.to_string()))?;
        if payload.len() != ENCRYPTED_KEY_LEN {
            return Err(WalletError::InvalidRecord(format!(
                "expected {ENCRYPTED_KEY_LEN} bytes, got {}",
                payload.len()
            )));
        }
        if payload[..2] == EC_MULTIPLY_PREFIX {
            return Err(WalletError::InvalidRecord("EC-multiplied records are not supported".into()));
        }
        if payload[..2] != network.encrypted_key_prefix() {
            return Err(WalletError::InvalidRecord(format!(
                "unknown prefix {}",
                hex::encode(&payload[..2])
            )));
        }
        let flag = payload[2];
        if flag & !FLAG_COMPRESSED != FLAG_NO_EC_MULTIPLY {
            return Err(WalletError::InvalidRecord(format!("unsupported flag {flag:#04x}")));
        }

        let mut address_hash = [0u8; 4];
        let mut encrypted_half1 = [0u8; 16];
        let mut encrypted_half2 = [0u8; 16];
        address_hash.copy_from_slice(&payload[3..7]);
        encrypted_half1.copy_from_slice(&payload[7..23]);
        encrypted_half2.copy_from_slice(&payload[23..39]);
        Ok(Self {
            flag,
            address_hash,
            encrypted_half1,
            encrypted_half2,
        })
    }

    /// Whether the protected key uses the compressed public key form.
    pub fn is_compressed(&self) -> bool {
        self.flag & FLAG_COMPRESSED != 0
    }

    pub fn address_hash(&self) -> &[u8; 4] {
        &self.address_hash
    }

    /// Base58Check text form.
    pub fn encode(&self, network: Network) -> String {
        let mut payload = Vec::with_capacity(ENCRYPTED_KEY_LEN);
        payload.extend_from_slice(&network.encrypted_key_prefix());
        payload.push(self.flag);
        payload.extend_from_slice(&self.address_hash);
        payload.extend_from_slice(&self.encrypted_half1);
        payload.extend_from_slice(&self.encrypted_half2);
        base58::encode_check(&payload)
    }
}

impl fmt::Display for EncryptedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the prefix is the same on every supported network
        f.write_str(&self.encode(Network::Mainnet))
    }
}

impl FromStr for EncryptedKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, Network::Mainnet)
    }
}

/// First four bytes of double-SHA-256 over the key's address text.
fn address_hash(key: &PrivateKey, network: Network) -> [u8; 4] {
    let digest = double_sha256(key.address(network).encode().as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest.as_bytes()[..4]);
    out
}

/// scrypt(passphrase, salt) stretched to 64 bytes.
fn stretch(passphrase: &str, salt: &[u8; 4]) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 64)
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
    let mut derived = Zeroizing::new([0u8; 64]);
    scrypt::scrypt(passphrase.as_bytes(), salt, &params, &mut derived[..])
        .map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
    Ok(derived)
}

/// Encrypt `key` under `passphrase`, returning the Base58Check record.
pub fn encrypt(key: &PrivateKey, passphrase: &str, network: Network) -> Result<String, WalletError> {
    let salt = address_hash(key, network);
    let derived = stretch(passphrase, &salt)?;
    let cipher = Aes256::new(GenericArray::from_slice(&derived[32..]));

    let secret = key.secret_bytes();
    let mut block = Zeroizing::new([0u8; 32]);
    for (i, byte) in block.iter_mut().enumerate() {
        *byte = secret[i] ^ derived[i];
    }
    let mut half1 = GenericArray::clone_from_slice(&block[..16]);
    let mut half2 = GenericArray::clone_from_slice(&block[16..]);
    cipher.encrypt_block(&mut half1);
    cipher.encrypt_block(&mut half2);

    let mut flag = FLAG_NO_EC_MULTIPLY;
    if key.is_compressed() {
        flag |= FLAG_COMPRESSED;
    }
    let mut record = EncryptedKey {
        flag,
        address_hash: salt,
        encrypted_half1: [0u8; 16],
        encrypted_half2: [0u8; 16],
    };
    record.encrypted_half1.copy_from_slice(&half1);
    record.encrypted_half2.copy_from_slice(&half2);
    debug!(%network, compressed = key.is_compressed(), "bip38: encrypted key");
    Ok(record.encode(network))
}

/// Decrypt a Base58Check record with `passphrase`.
///
/// The record is validated before any key stretching, so malformed input
/// fails fast with [`WalletError::InvalidRecord`]. A passphrase that does
/// not reproduce the record's address hash yields
/// [`WalletError::WrongPassphrase`].
pub fn decrypt(record: &str, passphrase: &str, network: Network) -> Result<PrivateKey, WalletError> {
    let parsed = EncryptedKey::parse(record, network)?;
    let derived = stretch(passphrase, &parsed.address_hash)?;
    let cipher = Aes256::new(GenericArray::from_slice(&derived[32..]));

    let mut half1 = GenericArray::clone_from_slice(&parsed.encrypted_half1);
    let mut half2 = GenericArray::clone_from_slice(&parsed.encrypted_half2);
    cipher.decrypt_block(&mut half1);
    cipher.decrypt_block(&mut half2);

    let mut secret = Zeroizing::new([0u8; 32]);
    for i in 0..16 {
        secret[i] = half1[i] ^ derived[i];
        secret[16 + i] = half2[i] ^ derived[16 + i];
    }
    half1.iter_mut().chain(half2.iter_mut()).for_each(|b| *b = 0);

    let key = PrivateKey::from_bytes(*secret, parsed.is_compressed()).map_err(|_| WalletError::WrongPassphrase)?;
    if address_hash(&key, network) != parsed.address_hash {
        return Err(WalletError::WrongPassphrase);
    }
    debug!(%network, compressed = key.is_compressed(), "bip38: decrypted key");
    Ok(key)
}
