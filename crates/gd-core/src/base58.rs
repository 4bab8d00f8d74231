//! Base58Check encoding shared by WIF keys, addresses and BIP38 records.
//!
//! A Base58Check string is `base58(payload || checksum)` where the checksum
//! is the first four bytes of double-SHA-256(payload). The payload always
//! starts with a version byte (or a two-byte prefix for BIP38).

use zeroize::Zeroizing;

use crate::error::Base58Error;

/// Encode a versioned payload with a 4-byte double-SHA-256 checksum.
pub fn encode_check(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Decode a Base58Check string, verifying and stripping the checksum.
///
/// The returned buffer is wiped on drop since it may hold key material.
pub fn decode_check(s: &str) -> Result<Zeroizing<Vec<u8>>, Base58Error> {
    bs58::decode(s.trim())
        .with_check(None)
        .into_vec()
        .map(Zeroizing::new)
        .map_err(map_decode_error)
}

fn map_decode_error(err: bs58::decode::Error) -> Base58Error {
    match err {
        bs58::decode::Error::InvalidCharacter { character, index } => {
            Base58Error::InvalidCharacter { character, index }
        }
        bs58::decode::Error::InvalidChecksum { .. } => Base58Error::InvalidChecksum,
        bs58::decode::Error::NoChecksum => Base58Error::MissingChecksum,
        other => Base58Error::Malformed(other.to_string()),
    }
}
