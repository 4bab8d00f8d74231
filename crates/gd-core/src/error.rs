//! Error types for goodelivery core primitives.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Base58Error {
    #[error("invalid base58 character {character:?} at {index}")] InvalidCharacter { character: char, index: usize },
    #[error("base58 checksum mismatch")] InvalidChecksum,
    #[error("base58 payload too short for checksum")] MissingChecksum,
    #[error("malformed base58: {0}")] Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error(transparent)] Base58(#[from] Base58Error),
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("unknown address version: {0:#04x}")] InvalidVersion(u8),
    #[error("address belongs to {found}, expected {expected}")] NetworkMismatch { expected: String, found: String },
    #[error("unknown network: {0}")] UnknownNetwork(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error(transparent)] Base58(#[from] Base58Error),
    #[error("invalid WIF length: {0}")] InvalidLength(usize),
    #[error("wrong WIF version: expected {expected:#04x}, got {got:#04x}")] WrongVersion { expected: u8, got: u8 },
    #[error("invalid compression marker: {0:#04x}")] InvalidCompressionFlag(u8),
    #[error("scalar out of range for secp256k1")] InvalidScalar,
    #[error("invalid public key bytes")] InvalidPublicKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature is not strict DER")] NonCanonicalSignature,
    #[error("unsupported sighash type: {0:#04x}")] UnsupportedSighash(u8),
    #[error("signature verification failed")] VerificationFailed,
    #[error("pubkey hash does not match expected")] PubkeyHashMismatch,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
    #[error(transparent)] Script(#[from] ScriptError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("not a standard pay-to-pubkey-hash script")] NotPayToPubkeyHash,
    #[error("push exceeds script length at offset {0}")] TruncatedPush(usize),
    #[error("non-push opcode {opcode:#04x} at offset {offset}")] NonPushOpcode { opcode: u8, offset: usize },
    #[error("expected {expected} pushes, got {got}")] UnexpectedPushCount { expected: usize, got: usize },
    #[error("push too large: {0} bytes")] PushTooLarge(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("truncated: needed {needed} bytes at offset {offset}")] Truncated { offset: usize, needed: usize },
    #[error("{0} trailing bytes after transaction")] TrailingBytes(usize),
    #[error("declared count {count} exceeds remaining {remaining} bytes")] ImplausibleCount { count: u64, remaining: usize },
    #[error("non-canonical varint at offset {0}")] NonCanonicalVarint(usize),
    #[error("unsupported segwit flag: {0:#04x}")] UnsupportedFlag(u8),
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("value overflow")] ValueOverflow,
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("output index {index} out of range ({len} outputs)")] OutputIndexOutOfRange { index: u32, len: usize },
}
