//! # gd-wallet
//! Cold-storage key handling and offline spending.
//!
//! Turns mnemonics into addresses and keys, protects keys with BIP38,
//! carries spendable outputs around as portxo records, and signs sweeps of
//! those records without touching the network.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` and its `ErrorKind` taxonomy
//! - [`mnemonic`]: BIP39 generation and parsing
//! - [`path`]: BIP32 child numbers, paths and the two path policies
//! - [`keys`]: Seed, extended keys, KeyChain and the lazy address listing
//! - [`encryption`]: BIP38 non-EC-multiplied key encryption
//! - [`portxo`]: portable unspent-output records
//! - [`builder`]: sweep construction and signing
//! - [`source`]: tagged key sources
//! - [`config`]: per-operation settings

pub mod builder;
pub mod config;
pub mod encryption;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod path;
pub mod portxo;
pub mod source;

pub use builder::{SignedTransaction, SpendPlan, TransactionSigner, UnsignedTransaction};
pub use config::{DeriveConfig, SpendConfig};
pub use encryption::{decrypt, encrypt, EncryptedKey};
pub use error::{ErrorKind, WalletError};
pub use keys::{decode, Addresses, DerivedAddress, KeyChain, Seed};
pub use mnemonic::Mnemonic;
pub use path::{ChildNumber, DerivationPath, PathPolicy};
pub use portxo::PortxoRecord;
pub use source::KeySource;
