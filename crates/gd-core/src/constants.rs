//! Protocol constants. All monetary values in satoshis (1 BTC = 10^8 satoshis).

pub const COIN: u64 = 100_000_000;

/// Version written into every transaction this tool creates.
pub const TX_VERSION: u32 = 1;

/// Sequence number for inputs with no relative lock.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Sign-everything sighash type, the only one this tool produces.
pub const SIGHASH_ALL: u8 = 0x01;

/// Upper bound for a DER-encoded secp256k1 signature.
///
/// Two 33-byte integers (32 bytes plus a sign-padding byte) with their
/// tags and lengths, plus the sequence header.
pub const MAX_DER_SIGNATURE_LEN: usize = 72;

/// Compressed SEC1 public key length.
pub const COMPRESSED_PUBKEY_LEN: usize = 33;

/// Uncompressed SEC1 public key length.
pub const UNCOMPRESSED_PUBKEY_LEN: usize = 65;

/// Length of a pay-to-pubkey-hash locking script.
pub const P2PKH_SCRIPT_LEN: usize = 25;

/// Serialized size of an outpoint (txid + index).
pub const OUTPOINT_SIZE: u64 = 36;

/// Serialized size of an input sequence number.
pub const SEQUENCE_SIZE: u64 = 4;

/// Serialized size of a single P2PKH output (value + script length + script).
///
/// # Examples
///
/// ```
/// use gd_core::constants::P2PKH_OUTPUT_SIZE;
/// assert_eq!(P2PKH_OUTPUT_SIZE, 8 + 1 + 25);
/// ```
pub const P2PKH_OUTPUT_SIZE: u64 = 8 + 1 + P2PKH_SCRIPT_LEN as u64;

/// Version plus lock time.
pub const TX_FIXED_SIZE: u64 = 4 + 4;

/// Worst-case P2PKH input size for a public key of the given length.
///
/// outpoint + script length byte + push(sig || hashtype) + push(pubkey) + sequence.
///
/// # Examples
///
/// ```
/// use gd_core::constants::{p2pkh_input_size, COMPRESSED_PUBKEY_LEN, UNCOMPRESSED_PUBKEY_LEN};
/// assert_eq!(p2pkh_input_size(COMPRESSED_PUBKEY_LEN), 149);
/// assert_eq!(p2pkh_input_size(UNCOMPRESSED_PUBKEY_LEN), 181);
/// ```
pub const fn p2pkh_input_size(pubkey_len: usize) -> u64 {
    let script_sig = 1 + (MAX_DER_SIGNATURE_LEN + 1) + 1 + pubkey_len;
    OUTPOINT_SIZE + 1 + script_sig as u64 + SEQUENCE_SIZE
}

/// Default fee rate in satoshis per byte.
pub const DEFAULT_FEE_RATE: u64 = 21;

/// Default number of addresses listed from a mnemonic.
pub const DEFAULT_ADDRESS_COUNT: u32 = 21;

/// Default mnemonic entropy size in bits.
pub const DEFAULT_MNEMONIC_BITS: usize = 128;

/// Largest raw transaction accepted for parsing.
pub const MAX_TX_SIZE: usize = 4_000_000;
