//! Cross-crate test suite for goodelivery.
//!
//! Integration tests drive the full cold-storage flow across `gd-core` and
//! `gd-wallet`: mnemonic to key, key through BIP38, output to portxo record,
//! record to signed sweep. Adversarial tests feed malformed and mutated
//! inputs to every parser.

pub mod helpers;
