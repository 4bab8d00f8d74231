//! Wallet error types and their failure taxonomy.

use gd_core::error::{AddressError, CryptoError, KeyError, ScriptError, TransactionError};
use gd_core::types::OutPoint;
use thiserror::Error;

/// Coarse failure class used by callers to decide how to report an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsupported input.
    Validation,
    /// A cryptographic check failed.
    Crypto,
    /// The supplied records cannot fund or authorize the operation.
    Resource,
    /// The environment failed underneath the operation.
    Fatal,
}

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Entropy size outside 128..=256 in steps of 32 bits.
    #[error("unsupported entropy size: {0} bits")]
    UnsupportedEntropy(usize),

    /// Mnemonic has a word count other than 12, 15, 18, 21 or 24.
    #[error("invalid mnemonic word count: {0}")]
    InvalidWordCount(usize),

    /// Mnemonic word not in the English list. Carries the word position.
    #[error("unknown mnemonic word at position {0}")]
    UnknownWord(usize),

    /// Mnemonic checksum bits do not match the entropy.
    #[error("mnemonic checksum mismatch")]
    InvalidChecksum,

    /// Any other mnemonic parse failure.
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// Unknown path policy or out-of-range derivation path.
    #[error("unsupported derivation path: {0}")]
    UnsupportedPath(String),

    /// Child key derivation failure.
    #[error("key derivation: {0}")]
    KeyDerivation(String),

    /// Encrypted key record is structurally invalid.
    #[error("invalid encrypted key record: {0}")]
    InvalidRecord(String),

    /// Decryption produced a key that does not match the record.
    #[error("wrong passphrase")]
    WrongPassphrase,

    /// The key does not control the record's locking script.
    #[error("key does not match the output's address")]
    KeyAddressMismatch,

    /// Portxo bytes or text are malformed.
    #[error("invalid portxo: {0}")]
    InvalidPortxo(String),

    /// A record selected for spending carries no key.
    #[error("no key for input {0}")]
    MissingKey(OutPoint),

    /// The same outpoint was supplied twice.
    #[error("duplicate input {0}")]
    DuplicateInput(OutPoint),

    /// Nothing to spend.
    #[error("no inputs to spend")]
    NoInputs,

    /// An unsigned transaction no longer agrees with its records or plan.
    #[error("inconsistent spend: {0}")]
    InconsistentSpend(String),

    /// Inputs do not cover the fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Sum of input values in satoshis.
        have: u64,
        /// Required fee in satoshis.
        need: u64,
    },

    /// The OS random source could not be read.
    #[error("entropy unavailable: {0}")]
    EntropyUnavailable(String),

    /// I/O error while reading a key source.
    #[error("I/O error: {0}")]
    Io(String),

    /// Address parsing or network mismatch.
    #[error(transparent)]
    Address(#[from] AddressError),

    /// WIF or raw key error.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Signing or verification error.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Script template error.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Raw transaction error.
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl WalletError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::UnsupportedEntropy(_)
            | WalletError::InvalidWordCount(_)
            | WalletError::UnknownWord(_)
            | WalletError::InvalidChecksum
            | WalletError::InvalidMnemonic(_)
            | WalletError::UnsupportedPath(_)
            | WalletError::InvalidRecord(_)
            | WalletError::InvalidPortxo(_)
            | WalletError::InconsistentSpend(_)
            | WalletError::Address(_)
            | WalletError::Key(_)
            | WalletError::Script(_)
            | WalletError::Transaction(_) => ErrorKind::Validation,

            WalletError::KeyDerivation(_)
            | WalletError::WrongPassphrase
            | WalletError::KeyAddressMismatch
            | WalletError::Crypto(_) => ErrorKind::Crypto,

            WalletError::MissingKey(_)
            | WalletError::DuplicateInput(_)
            | WalletError::NoInputs
            | WalletError::InsufficientFunds { .. } => ErrorKind::Resource,

            WalletError::EntropyUnavailable(_) | WalletError::Io(_) => ErrorKind::Fatal,
        }
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Io(err.to_string())
    }
}
