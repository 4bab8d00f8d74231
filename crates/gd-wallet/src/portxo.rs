//! Portable unspent-output records ("portxos").
//!
//! A portxo carries everything needed to spend one output offline: where it
//! is, what it is worth, the script locking it, and optionally the key that
//! unlocks it.
//!
//! # Wire format
//! ```text
//! version (1) = 0x01
//! txid (32, internal byte order)
//! index (u32 BE)
//! value (u64 BE)
//! key_mode (1): 0x00 none, 0x01 compressed, 0x02 uncompressed
//! [scalar (32)]            present iff key_mode != 0
//! script_len (varint) || script
//! ```
//! Text form is the lowercase hex of those bytes, one record per line.

use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

use gd_core::address::{Address, Network};
use gd_core::codec::{self, Reader};
use gd_core::crypto::PrivateKey;
use gd_core::error::TransactionError;
use gd_core::script::{self, StandardScript};
use gd_core::types::{Hash256, OutPoint, Transaction};

use crate::error::WalletError;

/// Current record version byte.
pub const PORTXO_VERSION: u8 = 0x01;

const KEY_MODE_NONE: u8 = 0x00;
const KEY_MODE_COMPRESSED: u8 = 0x01;
const KEY_MODE_UNCOMPRESSED: u8 = 0x02;

/// One spendable output, optionally with its private key.
#[derive(Clone, PartialEq, Eq)]
pub struct PortxoRecord {
    pub outpoint: OutPoint,
    /// Value in satoshis.
    pub value: u64,
    pub script_pubkey: Vec<u8>,
    key: Option<PrivateKey>,
}

impl PortxoRecord {
    /// An unkeyed record.
    pub fn new(outpoint: OutPoint, value: u64, script_pubkey: Vec<u8>) -> Self {
        Self {
            outpoint,
            value,
            script_pubkey,
            key: None,
        }
    }

    pub fn key(&self) -> Option<&PrivateKey> {
        self.key.as_ref()
    }

    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// The address the locking script pays to, if it is standard.
    pub fn address(&self, network: Network) -> Option<Address> {
        Address::from_script(&self.script_pubkey, network)
    }

    /// Whether `key` controls this record's P2PKH script.
    pub fn key_matches(&self, key: &PrivateKey) -> bool {
        match script::classify(&self.script_pubkey) {
            Some(StandardScript::PubkeyHash(hash)) => key.public_key().pubkey_hash() == hash,
            _ => false,
        }
    }

    /// Return a copy of this record carrying `key`.
    ///
    /// Fails with [`WalletError::KeyAddressMismatch`] if the key does not hash
    /// to the script's pubkey hash, including for P2SH and non-standard
    /// scripts, which this tool can never key.
    pub fn insert_key(&self, key: &PrivateKey) -> Result<Self, WalletError> {
        if !self.key_matches(key) {
            return Err(WalletError::KeyAddressMismatch);
        }
        Ok(Self {
            key: Some(key.clone()),
            ..self.clone()
        })
    }

    /// Binary encoding. Wiped on drop since it may hold a key.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut buf = Zeroizing::new(Vec::with_capacity(1 + 32 + 4 + 8 + 1 + 32 + 1 + self.script_pubkey.len()));
        buf.push(PORTXO_VERSION);
        buf.extend_from_slice(self.outpoint.txid.as_bytes());
        buf.extend_from_slice(&self.outpoint.index.to_be_bytes());
        buf.extend_from_slice(&self.value.to_be_bytes());
        match &self.key {
            None => buf.push(KEY_MODE_NONE),
            Some(key) => {
                buf.push(if key.is_compressed() {
                    KEY_MODE_COMPRESSED
                } else {
                    KEY_MODE_UNCOMPRESSED
                });
                buf.extend_from_slice(&*key.secret_bytes());
            }
        }
        codec::write_bytes(&mut buf, &self.script_pubkey);
        buf
    }

    /// Decode the binary form, requiring every byte to be consumed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let mut r = Reader::new(bytes);
        let version = r.read_u8().map_err(truncated)?;
        if version != PORTXO_VERSION {
            return Err(WalletError::InvalidPortxo(format!("unknown version {version:#04x}")));
        }
        let txid = Hash256(r.read_array().map_err(truncated)?);
        let index = u32::from_be_bytes(r.read_array().map_err(truncated)?);
        let value = u64::from_be_bytes(r.read_array().map_err(truncated)?);

        let key = match r.read_u8().map_err(truncated)? {
            KEY_MODE_NONE => None,
            mode @ (KEY_MODE_COMPRESSED | KEY_MODE_UNCOMPRESSED) => {
                let scalar = Zeroizing::new(r.read_array::<32>().map_err(truncated)?);
                let key = PrivateKey::from_bytes(*scalar, mode == KEY_MODE_COMPRESSED)?;
                Some(key)
            }
            mode => return Err(WalletError::InvalidPortxo(format!("unknown key mode {mode:#04x}"))),
        };

        let script_pubkey = r.read_var_bytes().map_err(truncated)?.to_vec();
        if r.remaining() != 0 {
            return Err(WalletError::InvalidPortxo(format!("{} trailing bytes", r.remaining())));
        }

        let record = Self {
            outpoint: OutPoint::new(txid, index),
            value,
            script_pubkey,
            key: None,
        };
        match key {
            Some(key) => record.insert_key(&key),
            None => Ok(record),
        }
    }

    /// Lowercase hex text form.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&*self.to_bytes()))
    }

    /// Parse the hex text form. Surrounding whitespace is ignored.
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let bytes = Zeroizing::new(hex::decode(s.trim()).map_err(|e| WalletError::InvalidPortxo(e.to_string()))?);
        Self::from_bytes(&bytes)
    }
}

fn truncated(err: TransactionError) -> WalletError {
    WalletError::InvalidPortxo(err.to_string())
}

impl fmt::Debug for PortxoRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortxoRecord")
            .field("outpoint", &self.outpoint)
            .field("value", &self.value)
            .field("script_pubkey", &hex::encode(&self.script_pubkey))
            .field("keyed", &self.is_keyed())
            .finish()
    }
}

/// One unkeyed record per standard output whose address `owns` accepts.
///
/// Non-standard outputs are skipped.
pub fn extract_from<F>(tx: &Transaction, network: Network, owns: F) -> Vec<PortxoRecord>
where
    F: Fn(&Address) -> bool,
{
    let txid = tx.txid();
    let records: Vec<_> = tx
        .outputs
        .iter()
        .zip(0u32..)
        .filter(|(output, _)| Address::from_script(&output.script_pubkey, network).is_some_and(|a| owns(&a)))
        .map(|(output, index)| PortxoRecord::new(OutPoint::new(txid, index), output.value, output.script_pubkey.clone()))
        .collect();
    debug!(%txid, outputs = tx.outputs.len(), extracted = records.len(), "portxo: extracted records");
    records
}

/// The unkeyed record for output `index`, whatever its script.
pub fn extract_output(tx: &Transaction, index: u32) -> Result<PortxoRecord, WalletError> {
    let output = tx
        .outputs
        .get(index as usize)
        .ok_or(TransactionError::OutputIndexOutOfRange {
            index,
            len: tx.outputs.len(),
        })?;
    Ok(PortxoRecord::new(
        OutPoint::new(tx.txid(), index),
        output.value,
        output.script_pubkey.clone(),
    ))
}

/// Parse a raw transaction, then [`extract_from`] it.
pub fn extract_from_raw<F>(raw: &[u8], network: Network, owns: F) -> Result<Vec<PortxoRecord>, WalletError>
where
    F: Fn(&Address) -> bool,
{
    let tx = Transaction::deserialize(raw)?;
    Ok(extract_from(&tx, network, owns))
}

/// Parse a hex raw transaction, then [`extract_from`] it.
pub fn extract_from_hex<F>(raw_hex: &str, network: Network, owns: F) -> Result<Vec<PortxoRecord>, WalletError>
where
    F: Fn(&Address) -> bool,
{
    let tx = Transaction::from_hex(raw_hex)?;
    Ok(extract_from(&tx, network, owns))
}

/// Parse newline-separated hex records, skipping blank lines.
pub fn parse_records(text: &str) -> Result<Vec<PortxoRecord>, WalletError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            PortxoRecord::from_hex(line).map_err(|e| match e {
                WalletError::InvalidPortxo(msg) => WalletError::InvalidPortxo(format!("line {}: {msg}", n + 1)),
                other => other,
            })
        })
        .collect()
}

/// One hex record per line, each newline-terminated.
pub fn serialize_records(records: &[PortxoRecord]) -> Zeroizing<String> {
    let mut out = Zeroizing::new(String::new());
    for record in records {
        out.push_str(&record.to_hex());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use gd_core::constants::{SEQUENCE_FINAL, TX_VERSION};
    use gd_core::types::{TxInput, TxOutput};

    fn key(byte: u8) -> PrivateKey {
        PrivateKey::from_bytes([byte; 32], true).unwrap()
    }

    fn funding_tx(owner: &PrivateKey) -> Transaction {
        Transaction {
            version: TX_VERSION,
            inputs: vec![TxInput {
                previous_output: OutPoint::new(Hash256([0x99; 32]), 1),
                script_sig: vec![0x00],
                sequence: SEQUENCE_FINAL,
                witness: vec![],
            }],
            outputs: vec![
                TxOutput {
                    value: 100_000,
                    script_pubkey: owner.address(Network::Mainnet).script_pubkey(),
                },
                TxOutput {
                    value: 5,
                    script_pubkey: vec![0x6a, 0x01, 0x01],
                },
                TxOutput {
                    value: 7_000,
                    script_pubkey: script::p2sh_script(&[0x55; 20]),
                },
                TxOutput {
                    value: 8_000,
                    script_pubkey: key(0x21).address(Network::Mainnet).script_pubkey(),
                },
            ],
            lock_time: 0,
        }
    }

    #[test]
    fn extract_skips_nonstandard_and_filters_by_owner() {
        let owner = key(0x11);
        let tx = funding_tx(&owner);
        let mine = owner.address(Network::Mainnet);

        let all = extract_from(&tx, Network::Mainnet, |_| true);
        assert_eq!(all.len(), 3);
        assert_eq!(
            all.iter().map(|r| r.outpoint.index).collect::<Vec<_>>(),
            vec![0, 2, 3]
        );

        let owned = extract_from(&tx, Network::Mainnet, |a| *a == mine);
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].outpoint, OutPoint::new(tx.txid(), 0));
        assert_eq!(owned[0].value, 100_000);
        assert!(!owned[0].is_keyed());
        assert_eq!(owned[0].address(Network::Mainnet), Some(mine));
    }

    #[test]
    fn extract_output_by_index() {
        let tx = funding_tx(&key(0x11));
        let record = extract_output(&tx, 1).unwrap();
        assert_eq!(record.value, 5);
        assert_eq!(record.address(Network::Mainnet), None);
        assert!(matches!(
            extract_output(&tx, 4).unwrap_err(),
            WalletError::Transaction(TransactionError::OutputIndexOutOfRange { index: 4, len: 4 })
        ));
    }

    #[test]
    fn extract_from_raw_and_hex() {
        let tx = funding_tx(&key(0x11));
        let from_raw = extract_from_raw(&tx.serialize(), Network::Mainnet, |_| true).unwrap();
        let from_hex = extract_from_hex(&tx.to_hex(), Network::Mainnet, |_| true).unwrap();
        assert_eq!(from_raw, from_hex);
        assert!(extract_from_hex("00", Network::Mainnet, |_| true).is_err());
    }

    #[test]
    fn insert_key_checks_address() {
        let owner = key(0x11);
        let record = extract_output(&funding_tx(&owner), 0).unwrap();

        let keyed = record.insert_key(&owner).unwrap();
        assert_eq!(keyed.key(), Some(&owner));
        assert_eq!(keyed.outpoint, record.outpoint);

        assert_eq!(record.insert_key(&key(0x12)).unwrap_err(), WalletError::KeyAddressMismatch);
        assert!(!record.is_keyed());
    }

    #[test]
    fn insert_key_checks_compression() {
        let owner = key(0x11);
        let record = extract_output(&funding_tx(&owner), 0).unwrap();
        assert_eq!(
            record.insert_key(&owner.with_compression(false)).unwrap_err(),
            WalletError::KeyAddressMismatch
        );
    }

    #[test]
    fn p2sh_and_nonstandard_cannot_be_keyed() {
        let tx = funding_tx(&key(0x11));
        for index in [1, 2] {
            let record = extract_output(&tx, index).unwrap();
            assert_eq!(record.insert_key(&key(0x11)).unwrap_err(), WalletError::KeyAddressMismatch);
        }
    }

    #[test]
    fn hex_roundtrip_keyed_and_unkeyed() {
        let owner = key(0x11).with_compression(false);
        let mut tx = funding_tx(&key(0x11));
        tx.outputs[0].script_pubkey = owner.address(Network::Mainnet).script_pubkey();
        let unkeyed = extract_output(&tx, 0).unwrap();
        let keyed = unkeyed.insert_key(&owner).unwrap();

        for record in [&unkeyed, &keyed] {
            let text = record.to_hex();
            assert_eq!(text.as_str(), text.to_lowercase());
            assert_eq!(&PortxoRecord::from_hex(&text).unwrap(), record);
        }
        assert_eq!(keyed.to_bytes()[45], KEY_MODE_UNCOMPRESSED);
    }

    #[test]
    fn layout_is_big_endian() {
        let record = PortxoRecord::new(OutPoint::new(Hash256([0xAB; 32]), 2), 0x0102, vec![0x51]);
        let bytes = record.to_bytes();
        assert_eq!(bytes[0], PORTXO_VERSION);
        assert_eq!(&bytes[33..37], &[0, 0, 0, 2]);
        assert_eq!(&bytes[37..45], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(bytes[45], KEY_MODE_NONE);
        assert_eq!(&bytes[46..], &[0x01, 0x51]);
    }

    #[test]
    fn malformed_records_rejected() {
        let record = PortxoRecord::new(OutPoint::new(Hash256([1; 32]), 0), 1, vec![0x51]);
        let bytes = record.to_bytes();

        let mut bad_version = bytes.to_vec();
        bad_version[0] = 0x02;
        assert!(matches!(PortxoRecord::from_bytes(&bad_version), Err(WalletError::InvalidPortxo(_))));

        let mut bad_mode = bytes.to_vec();
        bad_mode[45] = 0x07;
        assert!(matches!(PortxoRecord::from_bytes(&bad_mode), Err(WalletError::InvalidPortxo(_))));

        for len in 0..bytes.len() {
            assert!(PortxoRecord::from_bytes(&bytes[..len]).is_err(), "prefix of {len} parsed");
        }

        let mut trailing = bytes.to_vec();
        trailing.push(0);
        assert!(matches!(PortxoRecord::from_bytes(&trailing), Err(WalletError::InvalidPortxo(_))));

        assert!(matches!(PortxoRecord::from_hex("zz"), Err(WalletError::InvalidPortxo(_))));
    }

    #[test]
    fn keyed_record_with_foreign_key_rejected() {
        let owner = key(0x11);
        let keyed = extract_output(&funding_tx(&owner), 0).unwrap().insert_key(&owner).unwrap();
        let mut bytes = keyed.to_bytes().to_vec();
        // swap the scalar for another valid one
        bytes[46..78].copy_from_slice(&[0x12; 32]);
        assert_eq!(PortxoRecord::from_bytes(&bytes).unwrap_err(), WalletError::KeyAddressMismatch);
    }

    #[test]
    fn multi_record_text() {
        let owner = key(0x11);
        let tx = funding_tx(&owner);
        let records = vec![
            extract_output(&tx, 0).unwrap().insert_key(&owner).unwrap(),
            extract_output(&tx, 1).unwrap(),
        ];
        let text = serialize_records(&records);
        assert_eq!(text.lines().count(), 2);

        let padded = format!("\n  {}\n\n", text.replace('\n', "\n\n"));
        assert_eq!(parse_records(&padded).unwrap(), records);
    }

    #[test]
    fn multi_record_error_names_line() {
        let err = parse_records("\n\nnothex\n").unwrap_err();
        assert!(err.to_string().contains("line 3"), "got {err}");
    }

    #[test]
    fn debug_hides_key() {
        let owner = key(0x11);
        let keyed = extract_output(&funding_tx(&owner), 0).unwrap().insert_key(&owner).unwrap();
        let debug = format!("{keyed:?}");
        assert!(debug.contains("keyed: true"));
        assert!(!debug.contains(&hex::encode([0x11u8; 32])));
    }
}
