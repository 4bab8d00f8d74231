//! Transaction types and their standard wire serialization.
//!
//! All monetary values are in satoshis. The layout follows the reference
//! client exactly so raw transactions round-trip byte for byte:
//!
//! ```text
//! version u32 | [0x00 0x01] | varint n_in | inputs | varint n_out | outputs
//!             | [witnesses] | lock_time u32
//! ```
//!
//! The bracketed parts only appear in the segregated-witness form, which is
//! accepted when parsing but never produced by this tool's signer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::codec::{self, Reader};
use crate::constants::MAX_TX_SIZE;
use crate::crypto::double_sha256;
use crate::error::TransactionError;

/// Smallest possible encoded input: outpoint, empty script, sequence.
const MIN_INPUT_SIZE: usize = 36 + 1 + 4;

/// Smallest possible encoded output: value and empty script.
const MIN_OUTPUT_SIZE: usize = 8 + 1;

/// A 32-byte double-SHA-256 digest.
///
/// Stored in internal (wire) byte order. `Display` and `FromStr` use the
/// reversed order that block explorers show for txids.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().rev() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for Hash256 {
    type Err = TransactionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes: [u8; 32] = hex::decode(s.trim())
            .map_err(|e| TransactionError::InvalidHex(e.to_string()))?
            .try_into()
            .map_err(|v: Vec<u8>| TransactionError::InvalidHex(format!("expected 32 bytes, got {}", v.len())))?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// The outpoint being spent.
    pub previous_output: OutPoint,
    /// Unlocking script. Empty until signed.
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    /// Segregated witness stack; empty for legacy inputs.
    pub witness: Vec<Vec<u8>>,
}

/// A transaction output, creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in satoshis.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: Vec<u8>,
}

/// A transaction transferring value between scripts.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub lock_time: u32,
}

impl Transaction {
    /// Compute the transaction ID over the witness-stripped serialization.
    pub fn txid(&self) -> Hash256 {
        double_sha256(&self.serialize_legacy())
    }

    /// Whether any input carries witness data.
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Serialize without witness data.
    pub fn serialize_legacy(&self) -> Vec<u8> {
        self.encode(false)
    }

    /// Serialize in full, using the witness form only when needed.
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(self.has_witness())
    }

    /// Hex encoding of [`serialize`](Self::serialize).
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.inputs.len() * 150 + self.outputs.len() * 34);
        buf.extend_from_slice(&self.version.to_le_bytes());
        if with_witness {
            buf.push(0x00);
            buf.push(0x01);
        }

        codec::write_varint(&mut buf, self.inputs.len() as u64);
        for input in &self.inputs {
            buf.extend_from_slice(input.previous_output.txid.as_bytes());
            buf.extend_from_slice(&input.previous_output.index.to_le_bytes());
            codec::write_bytes(&mut buf, &input.script_sig);
            buf.extend_from_slice(&input.sequence.to_le_bytes());
        }

        codec::write_varint(&mut buf, self.outputs.len() as u64);
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_le_bytes());
            codec::write_bytes(&mut buf, &output.script_pubkey);
        }

        if with_witness {
            for input in &self.inputs {
                codec::write_varint(&mut buf, input.witness.len() as u64);
                for item in &input.witness {
                    codec::write_bytes(&mut buf, item);
                }
            }
        }

        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf
    }

    /// Parse a raw transaction, requiring the whole buffer to be consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        if bytes.len() > MAX_TX_SIZE {
            return Err(TransactionError::ImplausibleCount {
                count: bytes.len() as u64,
                remaining: MAX_TX_SIZE,
            });
        }
        let mut r = Reader::new(bytes);
        let version = r.read_u32_le()?;

        let segwit = match r.peek(2) {
            Some([0x00, 0x01]) => true,
            Some([0x00, flag]) => return Err(TransactionError::UnsupportedFlag(*flag)),
            _ => false,
        };
        if segwit {
            r.read_bytes(2)?;
        }

        let input_count = r.read_count(MIN_INPUT_SIZE)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            let txid = Hash256(r.read_array()?);
            let index = r.read_u32_le()?;
            let script_sig = r.read_var_bytes()?.to_vec();
            let sequence = r.read_u32_le()?;
            inputs.push(TxInput {
                previous_output: OutPoint { txid, index },
                script_sig,
                sequence,
                witness: Vec::new(),
            });
        }

        let output_count = r.read_count(MIN_OUTPUT_SIZE)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            let value = r.read_u64_le()?;
            let script_pubkey = r.read_var_bytes()?.to_vec();
            outputs.push(TxOutput { value, script_pubkey });
        }

        if segwit {
            for input in &mut inputs {
                let items = r.read_count(1)?;
                let mut witness = Vec::with_capacity(items);
                for _ in 0..items {
                    witness.push(r.read_var_bytes()?.to_vec());
                }
                input.witness = witness;
            }
        }

        let lock_time = r.read_u32_le()?;
        if r.remaining() != 0 {
            return Err(TransactionError::TrailingBytes(r.remaining()));
        }

        Ok(Self {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    /// Parse a hex-encoded raw transaction. Surrounding whitespace is ignored.
    pub fn from_hex(s: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(s.trim()).map_err(|e| TransactionError::InvalidHex(e.to_string()))?;
        Self::deserialize(&bytes)
    }
}
