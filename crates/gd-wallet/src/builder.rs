//! Offline sweep transactions from keyed portxo records.
//!
//! Signing runs in five stages:
//! 1. Select: check the records are non-empty, keyed and distinct
//! 2. Plan: estimate the signed size and derive the fee
//! 3. Build: one input per record, one output to the destination
//! 4. Sign: legacy `SIGHASH_ALL` per input
//! 5. Emit: re-verify every input before releasing the bytes
//!
//! Every input value goes to the single output minus the fee. There is no
//! change output.

use std::collections::HashSet;
use tracing::debug;

use gd_core::address::Address;
use gd_core::codec::varint_len;
use gd_core::constants::{
    p2pkh_input_size, COMPRESSED_PUBKEY_LEN, P2PKH_OUTPUT_SIZE, SEQUENCE_FINAL, TX_FIXED_SIZE, TX_VERSION,
    UNCOMPRESSED_PUBKEY_LEN,
};
use gd_core::crypto::{self, PrivateKey};
use gd_core::error::{AddressError, TransactionError};
use gd_core::types::{Hash256, Transaction, TxInput, TxOutput};

use crate::config::SpendConfig;
use crate::error::WalletError;
use crate::portxo::PortxoRecord;

/// Worst-case signed size of a one-output transaction spending `records`.
///
/// Each input assumes a 73-byte signature push and the public key length
/// implied by its key's compression flag. Unkeyed records count as
/// compressed.
pub fn estimate_size(records: &[PortxoRecord]) -> u64 {
    let inputs: u64 = records
        .iter()
        .map(|r| {
            let pubkey_len = match r.key() {
                Some(key) if !key.is_compressed() => UNCOMPRESSED_PUBKEY_LEN,
                _ => COMPRESSED_PUBKEY_LEN,
            };
            p2pkh_input_size(pubkey_len)
        })
        .sum();
    TX_FIXED_SIZE + varint_len(records.len() as u64) + inputs + varint_len(1) + P2PKH_OUTPUT_SIZE
}

/// The fee arithmetic for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpendPlan {
    pub input_count: usize,
    /// Sum of input values in satoshis.
    pub total_in: u64,
    /// Estimated signed size in bytes.
    pub size: u64,
    pub fee: u64,
    /// Value of the single output: `total_in - fee`.
    pub output_value: u64,
}

/// A built transaction whose inputs are not yet signed.
///
/// Only [`TransactionSigner::build`] creates one, so input `i` always spends
/// record `i`.
#[derive(Debug)]
pub struct UnsignedTransaction {
    tx: Transaction,
    records: Vec<PortxoRecord>,
    plan: SpendPlan,
}

impl UnsignedTransaction {
    /// The transaction with empty script_sigs.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    /// The records spent, in input order.
    pub fn records(&self) -> &[PortxoRecord] {
        &self.records
    }

    pub fn plan(&self) -> &SpendPlan {
        &self.plan
    }

    /// Check that input `i` spends record `i` and nothing is left over.
    fn check_pairing(&self) -> Result<(), WalletError> {
        if self.records.len() != self.tx.inputs.len() {
            return Err(WalletError::InconsistentSpend(format!(
                "{} records for {} inputs",
                self.records.len(),
                self.tx.inputs.len()
            )));
        }
        for (i, (input, record)) in self.tx.inputs.iter().zip(&self.records).enumerate() {
            if input.previous_output != record.outpoint {
                return Err(WalletError::InconsistentSpend(format!(
                    "input {i} spends {} but record is {}",
                    input.previous_output, record.outpoint
                )));
            }
        }
        Ok(())
    }
}

/// A fully signed and verified transaction.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: Transaction,
    plan: SpendPlan,
}

impl SignedTransaction {
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    pub fn plan(&self) -> &SpendPlan {
        &self.plan
    }

    pub fn fee(&self) -> u64 {
        self.plan.fee
    }

    pub fn txid(&self) -> Hash256 {
        self.tx.txid()
    }

    /// Raw wire bytes, ready to broadcast.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.tx.serialize()
    }

    pub fn to_hex(&self) -> String {
        self.tx.to_hex()
    }
}

/// Builds and signs sweeps under a [`SpendConfig`].
///
/// # Example
/// ```ignore
/// let signer = TransactionSigner::new(SpendConfig::default());
/// let signed = signer.sweep(&records, &destination)?;
/// println!("{}", signed.to_hex());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionSigner {
    config: SpendConfig,
}

impl TransactionSigner {
    pub fn new(config: SpendConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SpendConfig {
        &self.config
    }

    /// Check `records` can be spent together: non-empty, all keyed, no
    /// outpoint twice, and each key matching its script.
    pub fn select(&self, records: &[PortxoRecord]) -> Result<(), WalletError> {
        if records.is_empty() {
            return Err(WalletError::NoInputs);
        }
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            let key = record.key().ok_or(WalletError::MissingKey(record.outpoint))?;
            if !seen.insert(record.outpoint) {
                return Err(WalletError::DuplicateInput(record.outpoint));
            }
            if !record.key_matches(key) {
                return Err(WalletError::KeyAddressMismatch);
            }
        }
        Ok(())
    }

    /// Select, then compute size, fee and output value.
    pub fn plan(&self, records: &[PortxoRecord]) -> Result<SpendPlan, WalletError> {
        self.select(records)?;
        let total_in = records
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(r.value))
            .ok_or(TransactionError::ValueOverflow)?;
        let size = estimate_size(records);
        let fee = size
            .checked_mul(self.config.fee_rate)
            .ok_or(TransactionError::ValueOverflow)?;
        if total_in < fee {
            return Err(WalletError::InsufficientFunds {
                have: total_in,
                need: fee,
            });
        }
        Ok(SpendPlan {
            input_count: records.len(),
            total_in,
            size,
            fee,
            output_value: total_in - fee,
        })
    }

    /// Build the unsigned transaction paying everything to `destination`.
    pub fn build(&self, records: &[PortxoRecord], destination: &Address) -> Result<UnsignedTransaction, WalletError> {
        if destination.network() != self.config.network {
            return Err(AddressError::NetworkMismatch {
                expected: self.config.network.to_string(),
                found: destination.network().to_string(),
            }
            .into());
        }
        let plan = self.plan(records)?;

        let inputs = records
            .iter()
            .map(|r| TxInput {
                previous_output: r.outpoint,
                script_sig: Vec::new(),
                sequence: SEQUENCE_FINAL,
                witness: Vec::new(),
            })
            .collect();
        let tx = Transaction {
            version: TX_VERSION,
            inputs,
            outputs: vec![TxOutput {
                value: plan.output_value,
                script_pubkey: destination.script_pubkey(),
            }],
            lock_time: 0,
        };

        Ok(UnsignedTransaction {
            tx,
            records: records.to_vec(),
            plan,
        })
    }

    /// Sign every input, then verify all of them before returning.
    ///
    /// Any failure discards the partially signed transaction.
    pub fn sign(&self, unsigned: UnsignedTransaction) -> Result<SignedTransaction, WalletError> {
        unsigned.check_pairing()?;
        let UnsignedTransaction { mut tx, records, plan } = unsigned;

        let script_sigs = records
            .iter()
            .enumerate()
            .map(|(i, record)| -> Result<Vec<u8>, WalletError> {
                let key: &PrivateKey = record.key().ok_or(WalletError::MissingKey(record.outpoint))?;
                Ok(crypto::sign_input(&tx, i, key, &record.script_pubkey)?)
            })
            .collect::<Result<Vec<_>, WalletError>>()?;
        for (input, script_sig) in tx.inputs.iter_mut().zip(script_sigs) {
            input.script_sig = script_sig;
        }

        for (i, record) in records.iter().enumerate() {
            crypto::verify_input(&tx, i, &record.script_pubkey)?;
        }
        let total_out = tx.total_output_value().ok_or(TransactionError::ValueOverflow)?;
        if total_out.checked_add(plan.fee) != Some(plan.total_in) {
            return Err(WalletError::InconsistentSpend(format!(
                "outputs {total_out} plus fee {} do not equal inputs {}",
                plan.fee, plan.total_in
            )));
        }

        let signed = SignedTransaction { tx, plan };
        debug!(
            txid = %signed.txid(),
            inputs = plan.input_count,
            fee = plan.fee,
            size = plan.size,
            "signer: signed sweep"
        );
        Ok(signed)
    }

    /// Build and sign in one step.
    pub fn sweep(&self, records: &[PortxoRecord], destination: &Address) -> Result<SignedTransaction, WalletError> {
        let unsigned = self.build(records, destination)?;
        self.sign(unsigned)
    }
}
