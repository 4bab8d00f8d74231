//! Shared test helpers for E2E and adversarial tests.

use gd_core::address::Network;
use gd_core::crypto::PrivateKey;
use gd_core::types::{Hash256, OutPoint, Transaction, TxInput, TxOutput};
use gd_wallet::portxo::{self, PortxoRecord};

/// Deterministic compressed key from a seed byte.
pub fn key(seed: u8) -> PrivateKey {
    PrivateKey::from_bytes([seed; 32], true).expect("seed byte gives a valid scalar")
}

/// Locking script paying to `key` on `network`.
pub fn p2pkh(key: &PrivateKey, network: Network) -> Vec<u8> {
    key.address(network).script_pubkey()
}

/// A transaction that pays `outputs` from one unrelated input.
///
/// `marker` lands in the input's outpoint so distinct markers give distinct txids.
pub fn funding_tx(marker: u8, outputs: &[(u64, Vec<u8>)]) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::new(Hash256([marker; 32]), 0),
            script_sig: vec![0x51],
            sequence: 0xffff_ffff,
            witness: Vec::new(),
        }],
        outputs: outputs
            .iter()
            .map(|(value, script_pubkey)| TxOutput {
                value: *value,
                script_pubkey: script_pubkey.clone(),
            })
            .collect(),
        lock_time: 0,
    }
}

/// Fund `key` with `value` and return the keyed record for that output.
pub fn funded_record(key: &PrivateKey, value: u64, marker: u8, network: Network) -> PortxoRecord {
    let tx = funding_tx(marker, &[(value, p2pkh(key, network))]);
    let records = portxo::extract_from(&tx, network, |_| true);
    assert_eq!(records.len(), 1);
    records[0].insert_key(key).expect("key controls its own output")
}
