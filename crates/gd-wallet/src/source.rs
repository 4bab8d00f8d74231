//! Where a signing key comes from.

use std::fmt;
use std::path::PathBuf;

use tracing::debug;
use zeroize::Zeroizing;

use gd_core::address::Network;
use gd_core::crypto::PrivateKey;

use crate::encryption;
use crate::error::WalletError;
use crate::keys::KeyChain;
use crate::mnemonic::Mnemonic;
use crate::path::PathPolicy;

/// A private key that has not been materialized yet.
///
/// Every variant resolves to exactly one [`PrivateKey`] for a network.
#[derive(Clone)]
pub enum KeySource {
    /// A WIF string given directly.
    InlineWif(Zeroizing<String>),
    /// A file whose first non-empty line is a WIF string.
    FileWif(PathBuf),
    /// The key at `index` of a mnemonic's address chain.
    DerivedFromMnemonic {
        phrase: Zeroizing<String>,
        passphrase: Zeroizing<String>,
        policy: PathPolicy,
        index: u32,
    },
    /// A BIP38 record and its passphrase.
    DecryptedFromRecord {
        record: String,
        passphrase: Zeroizing<String>,
    },
}

impl KeySource {
    fn label(&self) -> &'static str {
        match self {
            KeySource::InlineWif(_) => "inline-wif",
            KeySource::FileWif(_) => "file-wif",
            KeySource::DerivedFromMnemonic { .. } => "mnemonic",
            KeySource::DecryptedFromRecord { .. } => "bip38",
        }
    }

    /// Materialize the key for `network`.
    pub fn resolve(&self, network: Network) -> Result<PrivateKey, WalletError> {
        debug!(source = self.label(), %network, "source: resolving key");
        match self {
            KeySource::InlineWif(wif) => Ok(PrivateKey::from_wif(wif.trim(), network)?),
            KeySource::FileWif(path) => {
                let contents = Zeroizing::new(
                    std::fs::read_to_string(path).map_err(|e| WalletError::Io(format!("{}: {e}", path.display())))?,
                );
                let wif = contents
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .ok_or_else(|| WalletError::Io(format!("{}: no WIF found", path.display())))?;
                Ok(PrivateKey::from_wif(wif, network)?)
            }
            KeySource::DerivedFromMnemonic {
                phrase,
                passphrase,
                policy,
                index,
            } => {
                let mnemonic = Mnemonic::parse(phrase)?;
                KeyChain::from_mnemonic(&mnemonic, passphrase, *policy, network)?.key_at(*index)
            }
            KeySource::DecryptedFromRecord { record, passphrase } => {
                encryption::decrypt(record.trim(), passphrase, network)
            }
        }
    }
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::InlineWif(_) => f.write_str("InlineWif(..)"),
            KeySource::FileWif(path) => f.debug_tuple("FileWif").field(path).finish(),
            KeySource::DerivedFromMnemonic { policy, index, .. } => f
                .debug_struct("DerivedFromMnemonic")
                .field("policy", policy)
                .field("index", index)
                .finish_non_exhaustive(),
            KeySource::DecryptedFromRecord { record, .. } => f
                .debug_struct("DecryptedFromRecord")
                .field("record", record)
                .finish_non_exhaustive(),
        }
    }
}
