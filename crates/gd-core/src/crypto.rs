//! secp256k1 keys, WIF encoding and P2PKH transaction signing.
//!
//! Keys carry a compression flag that decides both the WIF suffix and which
//! public key serialization feeds the address hash, so a single scalar maps
//! to two distinct addresses.
//!
//! # Signing scheme
//!
//! Inputs are signed with the legacy `SIGHASH_ALL` digest: a copy of the
//! transaction with every script_sig emptied except the one being signed,
//! which is replaced by the previous output's locking script, followed by the
//! 4-byte little-endian sighash type and hashed with double SHA-256.
//! Signatures are RFC6979 deterministic, low-S and strict DER.

use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{All, Message, Scalar, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::address::{Address, Network};
use crate::base58;
use crate::constants::{COMPRESSED_PUBKEY_LEN, SIGHASH_ALL, UNCOMPRESSED_PUBKEY_LEN};
use crate::error::{CryptoError, KeyError};
use crate::script;
use crate::types::{Hash256, Transaction};

/// Shared signing and verification context.
pub fn context() -> &'static Secp256k1<All> {
    static CONTEXT: OnceLock<Secp256k1<All>> = OnceLock::new();
    CONTEXT.get_or_init(Secp256k1::new)
}

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 applied twice.
pub fn double_sha256(data: &[u8]) -> Hash256 {
    Hash256(Sha256::digest(Sha256::digest(data)).into())
}

/// RIPEMD-160 of SHA-256, the hash committed to by addresses.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

/// A secp256k1 private key with its public key compression flag.
///
/// The scalar is erased on drop. `Debug` never prints it.
pub struct PrivateKey {
    inner: SecretKey,
    compressed: bool,
}

impl PrivateKey {
    /// Build a key from a raw scalar, rejecting zero and values >= n.
    pub fn from_bytes(bytes: [u8; 32], compressed: bool) -> Result<Self, KeyError> {
        let inner = SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self { inner, compressed })
    }

    /// Decode a WIF string for `network`.
    ///
    /// Layout: `version || scalar(32) [|| 0x01]`.
    pub fn from_wif(wif: &str, network: Network) -> Result<Self, KeyError> {
        let payload = base58::decode_check(wif)?;
        let compressed = match payload.len() {
            33 => false,
            34 => match payload[33] {
                0x01 => true,
                flag => return Err(KeyError::InvalidCompressionFlag(flag)),
            },
            len => return Err(KeyError::InvalidLength(len)),
        };
        if payload[0] != network.wif_version() {
            return Err(KeyError::WrongVersion {
                expected: network.wif_version(),
                got: payload[0],
            });
        }
        let inner = SecretKey::from_slice(&payload[1..33]).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self { inner, compressed })
    }

    /// Encode as WIF for `network`.
    pub fn to_wif(&self, network: Network) -> Zeroizing<String> {
        let mut payload = Zeroizing::new(Vec::with_capacity(34));
        payload.push(network.wif_version());
        payload.extend_from_slice(&*self.secret_bytes());
        if self.compressed {
            payload.push(0x01);
        }
        Zeroizing::new(base58::encode_check(&payload))
    }

    /// The raw 32-byte scalar. Handle with care.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.inner.secret_bytes())
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Same scalar with a different compression flag.
    pub fn with_compression(&self, compressed: bool) -> Self {
        Self {
            inner: self.inner,
            compressed,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(context(), &self.inner),
            compressed: self.compressed,
        }
    }

    /// The P2PKH address of this key on `network`.
    pub fn address(&self, network: Network) -> Address {
        Address::from_public_key(&self.public_key(), network)
    }

    /// Add `tweak` to the scalar modulo n.
    ///
    /// Fails if `tweak` is not below n or the sum is zero.
    pub fn add_tweak(&self, tweak: &[u8; 32]) -> Result<Self, KeyError> {
        let scalar = Scalar::from_be_bytes(*tweak).map_err(|_| KeyError::InvalidScalar)?;
        let inner = self.inner.add_tweak(&scalar).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self {
            inner,
            compressed: self.compressed,
        })
    }

    /// Sign a 32-byte digest, returning a low-S DER signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Vec<u8> {
        context()
            .sign_ecdsa(&Message::from_digest(*digest), &self.inner)
            .serialize_der()
            .to_vec()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.inner.non_secure_erase();
    }
}

impl ZeroizeOnDrop for PrivateKey {}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        self.with_compression(self.compressed)
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner && self.compressed == other.compressed
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("compressed", &self.compressed)
            .finish_non_exhaustive()
    }
}

/// A secp256k1 public key remembering its serialization form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey {
    inner: secp256k1::PublicKey,
    compressed: bool,
}

impl PublicKey {
    /// Parse a 33-byte compressed or 65-byte uncompressed SEC1 key.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let compressed = match bytes.len() {
            COMPRESSED_PUBKEY_LEN => true,
            UNCOMPRESSED_PUBKEY_LEN => false,
            _ => return Err(KeyError::InvalidPublicKey),
        };
        let inner = secp256k1::PublicKey::from_slice(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { inner, compressed })
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// SEC1 serialization in this key's form.
    pub fn serialize(&self) -> Vec<u8> {
        if self.compressed {
            self.inner.serialize().to_vec()
        } else {
            self.inner.serialize_uncompressed().to_vec()
        }
    }

    /// Add `tweak * G` to the point.
    ///
    /// Fails if `tweak` is not below n or the sum is the point at infinity.
    pub fn add_exp_tweak(&self, tweak: &[u8; 32]) -> Result<Self, KeyError> {
        let scalar = Scalar::from_be_bytes(*tweak).map_err(|_| KeyError::InvalidScalar)?;
        let inner = self
            .inner
            .add_exp_tweak(context(), &scalar)
            .map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self {
            inner,
            compressed: self.compressed,
        })
    }

    /// HASH160 of the serialized key.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.serialize())
    }

    /// Verify a strict-DER, low-S signature over a digest.
    pub fn verify(&self, digest: &[u8; 32], der: &[u8]) -> Result<(), CryptoError> {
        if !is_strict_der(der) {
            return Err(CryptoError::NonCanonicalSignature);
        }
        let signature = Signature::from_der(der).map_err(|_| CryptoError::InvalidSignature)?;
        context()
            .verify_ecdsa(&Message::from_digest(*digest), &signature, &self.inner)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.serialize()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.serialize()))
    }
}

/// Check the strict DER encoding rules of BIP66 on a bare signature
/// (without the trailing sighash byte).
pub fn is_strict_der(sig: &[u8]) -> bool {
    let len = sig.len();
    if !(8..=72).contains(&len) {
        return false;
    }
    if sig[0] != 0x30 || sig[1] as usize != len - 2 {
        return false;
    }

    let len_r = sig[3] as usize;
    if sig[2] != 0x02 || len_r == 0 || 5 + len_r >= len {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if sig[4 + len_r] != 0x02 || len_s == 0 || len_r + len_s + 6 != len {
        return false;
    }

    let r = &sig[4..4 + len_r];
    let s = &sig[6 + len_r..];
    is_minimal_positive(r) && is_minimal_positive(s)
}

fn is_minimal_positive(int: &[u8]) -> bool {
    match int {
        [first, ..] if first & 0x80 != 0 => false,
        [0x00, second, ..] if second & 0x80 == 0 => false,
        _ => true,
    }
}

/// Compute the legacy signature hash for one input.
///
/// Only `SIGHASH_ALL` is supported.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
    sighash_type: u8,
) -> Result<Hash256, CryptoError> {
    if sighash_type != SIGHASH_ALL {
        return Err(CryptoError::UnsupportedSighash(sighash_type));
    }
    if input_index >= tx.inputs.len() {
        return Err(CryptoError::InputIndexOutOfBounds {
            index: input_index,
            len: tx.inputs.len(),
        });
    }

    let mut copy = tx.clone();
    for (i, input) in copy.inputs.iter_mut().enumerate() {
        input.witness.clear();
        input.script_sig = if i == input_index {
            script_code.to_vec()
        } else {
            Vec::new()
        };
    }

    let mut data = copy.serialize_legacy();
    data.extend_from_slice(&u32::from(sighash_type).to_le_bytes());
    Ok(double_sha256(&data))
}

/// Sign input `input_index` spending a P2PKH output, returning its script_sig.
///
/// The key must hash to the pubkey hash locked by `script_pubkey`.
pub fn sign_input(
    tx: &Transaction,
    input_index: usize,
    key: &PrivateKey,
    script_pubkey: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let expected = script::p2pkh_hash(script_pubkey)?;
    let public_key = key.public_key();
    if public_key.pubkey_hash() != expected {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sighash = signature_hash(tx, input_index, script_pubkey, SIGHASH_ALL)?;
    let mut signature = key.sign_digest(sighash.as_bytes());
    if !is_strict_der(&signature) {
        return Err(CryptoError::NonCanonicalSignature);
    }
    signature.push(SIGHASH_ALL);

    Ok(script::p2pkh_unlocking_script(&signature, &public_key.serialize())?)
}

/// Verify a signed P2PKH input against the output it spends.
///
/// Checks that:
/// 1. The script_sig is exactly `<sig||hashtype> <pubkey>`
/// 2. The hashtype is `SIGHASH_ALL` and the signature is strict DER
/// 3. HASH160 of the pubkey matches the locking script
/// 4. The ECDSA signature verifies against the sighash
pub fn verify_input(tx: &Transaction, input_index: usize, script_pubkey: &[u8]) -> Result<(), CryptoError> {
    let input = tx.inputs.get(input_index).ok_or(CryptoError::InputIndexOutOfBounds {
        index: input_index,
        len: tx.inputs.len(),
    })?;
    let expected = script::p2pkh_hash(script_pubkey)?;

    let (signature, pubkey) = script::parse_p2pkh_unlocking(&input.script_sig)?;
    let (&hash_type, der) = signature.split_last().ok_or(CryptoError::InvalidSignature)?;
    if hash_type != SIGHASH_ALL {
        return Err(CryptoError::UnsupportedSighash(hash_type));
    }

    let public_key = PublicKey::from_slice(pubkey).map_err(|_| CryptoError::InvalidPublicKey)?;
    if public_key.pubkey_hash() != expected {
        return Err(CryptoError::PubkeyHashMismatch);
    }

    let sighash = signature_hash(tx, input_index, script_pubkey, SIGHASH_ALL)?;
    public_key.verify(sighash.as_bytes(), der)
}
