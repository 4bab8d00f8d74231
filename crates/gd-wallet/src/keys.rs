//! Seeds and BIP-32 hierarchical key derivation.
//!
//! The master key is `HMAC-SHA512("Bitcoin seed", seed)`. Each child step
//! computes `I = HMAC-SHA512(chain_code, data || index)` where `data` is
//! `0x00 || k` for hardened steps and the compressed parent public key
//! otherwise. The child key is `IL + k (mod n)` and the child chain code is
//! `IR`. When `IL >= n` or the child key is zero the step is retried with the
//! next index.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use gd_core::address::{Address, Network};
use gd_core::crypto::{PrivateKey, PublicKey};

use crate::config::DeriveConfig;
use crate::error::WalletError;
use crate::mnemonic::Mnemonic;
use crate::path::{ChildNumber, DerivationPath, PathPolicy};

type HmacSha512 = Hmac<Sha512>;

const MASTER_KEY_DOMAIN: &[u8] = b"Bitcoin seed";

/// A 64-byte seed stretched from a mnemonic.
///
/// Secret material is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Seed {
    bytes: [u8; 64],
}

impl Seed {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Get the raw seed bytes. Handle with care.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }
}

impl Clone for Seed {
    fn clone(&self) -> Self {
        Self { bytes: self.bytes }
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Seed").field("bytes", &"[REDACTED]").finish()
    }
}

/// Split an HMAC-SHA512 output into `(IL, IR)`.
fn hmac_split(key: &[u8], parts: &[&[u8]]) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), WalletError> {
    let mut mac = HmacSha512::new_from_slice(key).map_err(|e| WalletError::KeyDerivation(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = mac.finalize().into_bytes();
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    out.as_mut_slice().zeroize();
    Ok((left, right))
}

/// A private key with its chain code and position in the tree.
#[derive(Clone)]
pub struct ExtendedPrivKey {
    key: PrivateKey,
    chain_code: Zeroizing<[u8; 32]>,
    depth: u8,
    child_number: ChildNumber,
}

impl ExtendedPrivKey {
    /// Derive the master key from a seed.
    pub fn new_master(seed: &Seed) -> Result<Self, WalletError> {
        let (il, ir) = hmac_split(MASTER_KEY_DOMAIN, &[&seed.as_bytes()[..]])?;
        let key = PrivateKey::from_bytes(*il, true)
            .map_err(|_| WalletError::KeyDerivation("seed yields an invalid master key".into()))?;
        Ok(Self {
            key,
            chain_code: ir,
            depth: 0,
            child_number: ChildNumber::Normal(0),
        })
    }

    /// Derive one child. An invalid result moves on to the next index.
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| WalletError::KeyDerivation("maximum depth exceeded".into()))?;
        let public = self.key.public_key().serialize();

        let mut child = child;
        loop {
            let index = child.to_raw().to_be_bytes();
            let (il, ir) = if child.is_hardened() {
                let secret = self.key.secret_bytes();
                hmac_split(&self.chain_code[..], &[&[0x00][..], &secret[..], &index[..]])?
            } else {
                hmac_split(&self.chain_code[..], &[&public[..], &index[..]])?
            };
            if let Ok(key) = self.key.add_tweak(&il) {
                return Ok(Self {
                    key,
                    chain_code: ir,
                    depth,
                    child_number: child,
                });
            }
            debug!(%child, "bip32: invalid child, skipping index");
            child = child
                .successor()
                .ok_or_else(|| WalletError::KeyDerivation("child index space exhausted".into()))?;
        }
    }

    /// Derive along every step of `path` from this key.
    pub fn derive_path(&self, path: &DerivationPath) -> Result<Self, WalletError> {
        path.steps()
            .iter()
            .try_fold(self.clone(), |key, step| key.derive_child(*step))
    }

    /// The private key, always flagged compressed.
    pub fn private_key(&self) -> &PrivateKey {
        &self.key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// The child number this key was actually derived at.
    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }
}

impl fmt::Debug for ExtendedPrivKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendedPrivKey")
            .field("depth", &self.depth)
            .field("child_number", &self.child_number)
            .finish_non_exhaustive()
    }
}

/// A public key with its chain code, able to derive non-hardened children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedPubKey {
    key: PublicKey,
    chain_code: [u8; 32],
    depth: u8,
    child_number: ChildNumber,
}

impl ExtendedPubKey {
    pub fn from_private(xprv: &ExtendedPrivKey) -> Self {
        Self {
            key: xprv.key.public_key(),
            chain_code: *xprv.chain_code,
            depth: xprv.depth,
            child_number: xprv.child_number,
        }
    }

    /// Derive one non-hardened child. An invalid result moves on to the next index.
    pub fn derive_child(&self, child: ChildNumber) -> Result<Self, WalletError> {
        if child.is_hardened() {
            return Err(WalletError::KeyDerivation(format!(
                "hardened step {child} needs the private key"
            )));
        }
        let depth = self
            .depth
            .checked_add(1)
            .ok_or_else(|| WalletError::KeyDerivation("maximum depth exceeded".into()))?;
        let public = self.key.serialize();

        let mut child = child;
        loop {
            let index = child.to_raw().to_be_bytes();
            let (il, ir) = hmac_split(&self.chain_code, &[&public[..], &index[..]])?;
            if let Ok(key) = self.key.add_exp_tweak(&il) {
                return Ok(Self {
                    key,
                    chain_code: *ir,
                    depth,
                    child_number: child,
                });
            }
            debug!(%child, "bip32: invalid public child, skipping index");
            child = child
                .successor()
                .ok_or_else(|| WalletError::KeyDerivation("child index space exhausted".into()))?;
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_number(&self) -> ChildNumber {
        self.child_number
    }
}

/// One entry of an address listing.
#[derive(Clone, Debug)]
pub struct DerivedAddress {
    /// Requested address index `k` within the policy's branch.
    pub index: u32,
    /// The child step actually derived. Differs from `index` only when BIP-32
    /// skipped an invalid child.
    pub child_number: ChildNumber,
    pub address: Address,
    /// Present only when keys were requested.
    pub key: Option<PrivateKey>,
}

/// The branch key of a path policy, ready to derive address keys.
#[derive(Clone, Debug)]
pub struct KeyChain {
    branch: ExtendedPrivKey,
    policy: PathPolicy,
    network: Network,
}

impl KeyChain {
    /// Derive the policy's branch key from a seed.
    pub fn from_seed(seed: &Seed, policy: PathPolicy, network: Network) -> Result<Self, WalletError> {
        let master = ExtendedPrivKey::new_master(seed)?;
        let branch = master.derive_path(&policy.branch(network))?;
        debug!(%policy, %network, "keychain: derived branch key");
        Ok(Self {
            branch,
            policy,
            network,
        })
    }

    pub fn from_mnemonic(
        mnemonic: &Mnemonic,
        passphrase: &str,
        policy: PathPolicy,
        network: Network,
    ) -> Result<Self, WalletError> {
        Self::from_seed(&mnemonic.to_seed(passphrase), policy, network)
    }

    /// The extended key at address `index`, or at the next valid index.
    pub fn child_at(&self, index: u32) -> Result<ExtendedPrivKey, WalletError> {
        self.branch.derive_child(ChildNumber::normal(index)?)
    }

    /// The private key at address `index`.
    pub fn key_at(&self, index: u32) -> Result<PrivateKey, WalletError> {
        Ok(self.child_at(index)?.private_key().clone())
    }

    /// The address at `index`.
    pub fn address_at(&self, index: u32) -> Result<Address, WalletError> {
        Ok(self.key_at(index)?.address(self.network))
    }

    /// A lazy listing of the first `count` addresses, with keys if requested.
    pub fn addresses(&self, count: u32, with_keys: bool) -> Addresses {
        Addresses {
            chain: self.clone(),
            next: 0,
            count,
            with_keys,
        }
    }

    pub fn policy(&self) -> PathPolicy {
        self.policy
    }

    pub fn network(&self) -> Network {
        self.network
    }
}

/// Lazy, finite iterator over derived addresses. Clone it to restart.
#[derive(Clone, Debug)]
pub struct Addresses {
    chain: KeyChain,
    next: u32,
    count: u32,
    with_keys: bool,
}

impl Addresses {
    /// Rewind to index 0.
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for Addresses {
    type Item = Result<DerivedAddress, WalletError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let entry = self.chain.child_at(index).map(|child| {
            let key = child.private_key();
            DerivedAddress {
                index,
                child_number: child.child_number(),
                address: key.address(self.chain.network),
                key: self.with_keys.then(|| key.clone()),
            }
        });
        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.count - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Addresses {}

/// List addresses (and optionally keys) for a mnemonic under `config`.
pub fn decode(
    mnemonic: &Mnemonic,
    passphrase: &str,
    config: &DeriveConfig,
    derive_wif: bool,
) -> Result<Addresses, WalletError> {
    let chain = KeyChain::from_mnemonic(mnemonic, passphrase, config.path_policy, config.network)?;
    Ok(chain.addresses(config.address_count, derive_wif))
}
