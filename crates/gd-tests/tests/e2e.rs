//! End-to-end tests for the offline cold-storage flow.
//!
//! Each test walks keys and outputs through several engines in sequence,
//! the way an operator would on an air-gapped machine: create a mnemonic,
//! derive an address, protect the key, capture the funding output as a
//! portxo record, insert the key and sign a sweep.

use std::io::Write;

use gd_core::address::{Address, Network};
use gd_core::crypto::{self, PrivateKey};
use gd_core::script;
use gd_core::types::Transaction;
use gd_tests::helpers::*;
use gd_wallet::portxo::{self, PortxoRecord};
use gd_wallet::{
    decode, decrypt, encrypt, DeriveConfig, ErrorKind, KeyChain, KeySource, Mnemonic, PathPolicy, SpendConfig,
    TransactionSigner, WalletError,
};
use zeroize::Zeroizing;

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

fn signer(fee_rate: u64, network: Network) -> TransactionSigner {
    TransactionSigner::new(SpendConfig { fee_rate, network })
}

fn assert_fully_signed(tx: &Transaction, records: &[PortxoRecord]) {
    assert_eq!(tx.inputs.len(), records.len());
    for (i, record) in records.iter().enumerate() {
        assert_eq!(tx.inputs[i].previous_output, record.outpoint);
        crypto::verify_input(tx, i, &record.script_pubkey).unwrap();
        let (sig, _) = script::parse_p2pkh_unlocking(&tx.inputs[i].script_sig).unwrap();
        let (hash_type, der) = sig.split_last().unwrap();
        assert_eq!(*hash_type, 0x01);
        assert!(crypto::is_strict_der(der));
    }
}

#[test]
fn mnemonic_to_signed_sweep() {
    let network = Network::Mainnet;

    // 1. new mnemonic, key at index 0 of the default policy
    let mnemonic = Mnemonic::generate(128).unwrap();
    assert_eq!(mnemonic.word_count(), 12);
    let reparsed = Mnemonic::parse(&mnemonic.to_string()).unwrap();
    let chain = KeyChain::from_mnemonic(&reparsed, "", PathPolicy::Default, network).unwrap();
    let key = chain.key_at(0).unwrap();
    let address = chain.address_at(0).unwrap();
    assert_eq!(key.address(network), address);

    // 2. BIP38 round trip
    let record = encrypt(&key, "test", network).unwrap();
    assert!(record.starts_with("6P"));
    let recovered = decrypt(&record, "test", network).unwrap();
    assert_eq!(recovered, key);

    // 3. funding output captured as a portxo record
    let funding = funding_tx(0x11, &[(100_000, address.script_pubkey())]);
    let funding = Transaction::from_hex(&funding.to_hex()).unwrap();
    let extracted = portxo::extract_from(&funding, network, |a| *a == address);
    assert_eq!(extracted.len(), 1);
    assert!(!extracted[0].is_keyed());

    // 4. key insertion, then the text form an operator would carry
    let keyed = extracted[0].insert_key(&recovered).unwrap();
    let text = portxo::serialize_records(std::slice::from_ref(&keyed));
    let records = portxo::parse_records(&text).unwrap();
    assert_eq!(records, vec![keyed]);

    // 5. sweep at 10 sat/byte
    let dest = key_for_dest();
    let signed = signer(10, network).sweep(&records, &dest).unwrap();
    let tx = signed.transaction();
    assert_eq!(tx.inputs.len(), 1);
    assert_eq!(tx.outputs.len(), 1);
    let size = 4 + 1 + 149 + 1 + 34 + 4;
    assert_eq!(signed.fee(), size * 10);
    assert_eq!(tx.outputs[0].value, 100_000 - size * 10);
    assert_fully_signed(tx, &records);

    let broadcast = Transaction::deserialize(&signed.to_bytes()).unwrap();
    assert_eq!(broadcast.txid(), signed.txid());
}

fn key_for_dest() -> Address {
    key(0x42).address(Network::Mainnet)
}

#[test]
fn total_equal_to_fee_leaves_zero_output() {
    let owner = key(1);
    let records = vec![funded_record(&owner, 193 * 10, 1, Network::Mainnet)];
    let signed = signer(10, Network::Mainnet).sweep(&records, &key_for_dest()).unwrap();
    assert_eq!(signed.transaction().outputs[0].value, 0);
    assert_fully_signed(signed.transaction(), &records);
}

#[test]
fn total_below_fee_is_insufficient() {
    let owner = key(2);
    let records = vec![funded_record(&owner, 193 * 10 - 1, 1, Network::Mainnet)];
    let err = signer(10, Network::Mainnet).sweep(&records, &key_for_dest()).unwrap_err();
    assert_eq!(err, WalletError::InsufficientFunds { have: 1_929, need: 1_930 });
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn sweep_many_records_mixed_compression() {
    let network = Network::Mainnet;
    let compressed = key(3);
    let uncompressed = key(4).with_compression(false);
    let funding = funding_tx(
        0x22,
        &[
            (50_000, p2pkh(&compressed, network)),
            (70_000, p2pkh(&uncompressed, network)),
            (30_000, p2pkh(&compressed, network)),
        ],
    );

    let records: Vec<PortxoRecord> = portxo::extract_from(&funding, network, |_| true)
        .into_iter()
        .map(|r| {
            if r.key_matches(&compressed) {
                r.insert_key(&compressed)
            } else {
                r.insert_key(&uncompressed)
            }
        })
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 3);

    let signed = signer(2, network).sweep(&records, &key_for_dest()).unwrap();
    let size = 4 + 1 + 149 + 181 + 149 + 1 + 34 + 4;
    assert_eq!(signed.fee(), size * 2);
    assert_eq!(signed.transaction().outputs[0].value, 150_000 - size * 2);
    assert!(signed.to_bytes().len() as u64 <= size);
    assert_fully_signed(signed.transaction(), &records);
}

#[test]
fn testnet_bip44_flow() {
    let network = Network::Testnet;
    let mnemonic = Mnemonic::parse(PHRASE).unwrap();
    let config = DeriveConfig {
        path_policy: PathPolicy::Bip44,
        network,
        address_count: 3,
    };
    let listing: Vec<_> = decode(&mnemonic, "", &config, true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(listing.len(), 3);
    for derived in &listing {
        let encoded = derived.address.to_string();
        assert!(encoded.starts_with('m') || encoded.starts_with('n'));
    }

    let key = listing[1].key.clone().unwrap();
    let record = funded_record(&key, 80_000, 0x33, network);
    let dest = key.address(network);
    let signed = signer(1, network).sweep(&[record.clone()], &dest).unwrap();
    assert_fully_signed(signed.transaction(), &[record]);

    // mainnet destination refused under a testnet config
    let record = funded_record(&key, 80_000, 0x34, network);
    assert!(matches!(
        signer(1, network).sweep(&[record], &key_for_dest()),
        Err(WalletError::Address(_))
    ));
}

#[test]
fn key_sources_feed_insertion() {
    let network = Network::Mainnet;
    let mnemonic = Mnemonic::parse(PHRASE).unwrap();
    let key = KeyChain::from_mnemonic(&mnemonic, "", PathPolicy::Default, network)
        .unwrap()
        .key_at(5)
        .unwrap();
    let funding = funding_tx(0x44, &[(10_000, p2pkh(&key, network))]);
    let unkeyed = portxo::extract_output(&funding, 0).unwrap();

    let mut wif_file = tempfile::NamedTempFile::new().unwrap();
    writeln!(wif_file, "{}", key.to_wif(network).as_str()).unwrap();
    let bip38 = encrypt(&key, "vault", network).unwrap();

    let sources = vec![
        KeySource::InlineWif(key.to_wif(network)),
        KeySource::FileWif(wif_file.path().to_path_buf()),
        KeySource::DerivedFromMnemonic {
            phrase: Zeroizing::new(PHRASE.to_string()),
            passphrase: Zeroizing::new(String::new()),
            policy: PathPolicy::Default,
            index: 5,
        },
        KeySource::DecryptedFromRecord {
            record: bip38,
            passphrase: Zeroizing::new("vault".to_string()),
        },
    ];
    for source in sources {
        let resolved = source.resolve(network).unwrap();
        let keyed = unkeyed.insert_key(&resolved).unwrap();
        assert_eq!(keyed.key(), Some(&key));
    }
}

#[test]
fn wrong_key_cannot_be_inserted() {
    let network = Network::Mainnet;
    let owner = key(5);
    let stranger = key(6);
    let funding = funding_tx(0x55, &[(10_000, p2pkh(&owner, network))]);
    let record = portxo::extract_output(&funding, 0).unwrap();
    let err = record.insert_key(&stranger).unwrap_err();
    assert_eq!(err, WalletError::KeyAddressMismatch);
    assert_eq!(err.kind(), ErrorKind::Crypto);

    // same scalar, other compression: a different address
    let err = record.insert_key(&owner.with_compression(false)).unwrap_err();
    assert_eq!(err, WalletError::KeyAddressMismatch);
}

#[test]
fn non_standard_output_is_extractable_but_not_spendable() {
    let network = Network::Mainnet;
    let p2sh = script::p2sh_script(&[0x99; 20]);
    let funding = funding_tx(0x66, &[(10_000, p2sh.clone())]);

    assert!(portxo::extract_from(&funding, network, |a| a.script_pubkey() != p2sh).is_empty());
    let record = portxo::extract_output(&funding, 0).unwrap();
    assert_eq!(record.script_pubkey, p2sh);
    assert!(record.insert_key(&key(7)).is_err());

    let err = signer(1, network).sweep(&[record], &key_for_dest()).unwrap_err();
    assert!(matches!(err, WalletError::MissingKey(_)));
}

#[test]
fn unkeyed_record_in_batch_rejected() {
    let network = Network::Mainnet;
    let owner = key(8);
    let keyed = funded_record(&owner, 20_000, 0x77, network);
    let funding = funding_tx(0x78, &[(20_000, p2pkh(&owner, network))]);
    let unkeyed = portxo::extract_output(&funding, 0).unwrap();

    let err = signer(1, network)
        .sweep(&[keyed, unkeyed.clone()], &key_for_dest())
        .unwrap_err();
    assert_eq!(err, WalletError::MissingKey(unkeyed.outpoint));
}

#[test]
fn keyed_record_text_carries_key_across_sessions() {
    let network = Network::Mainnet;
    let owner: PrivateKey = key(9);
    let record = funded_record(&owner, 5_000, 0x88, network);
    let line = record.to_hex();
    let restored = PortxoRecord::from_hex(&line).unwrap();
    assert_eq!(restored.key(), Some(&owner));
    assert_eq!(restored.address(network), Some(owner.address(network)));
}
