//! # gd-core
//! Foundation types for goodelivery: network profiles, Base58Check,
//! addresses, secp256k1 keys, standard scripts, and the transaction
//! wire format with legacy signature hashing.

pub mod address;
pub mod base58;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod script;
pub mod types;
