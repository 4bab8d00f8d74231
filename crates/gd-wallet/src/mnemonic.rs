//! BIP-39 mnemonic phrases: generation, validation and seed stretching.

use bip39::Language;
use rand::RngCore;
use std::fmt;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::WalletError;
use crate::keys::Seed;

/// Entropy sizes accepted by [`Mnemonic::generate`].
pub const SUPPORTED_ENTROPY_BITS: [usize; 5] = [128, 160, 192, 224, 256];

/// A validated English BIP-39 mnemonic.
///
/// `Debug` is redacted; `Display` prints the phrase.
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic {
    inner: bip39::Mnemonic,
}

impl Mnemonic {
    /// Generate a new mnemonic from `bits` of OS entropy.
    pub fn generate(bits: usize) -> Result<Self, WalletError> {
        if !SUPPORTED_ENTROPY_BITS.contains(&bits) {
            return Err(WalletError::UnsupportedEntropy(bits));
        }
        let mut entropy = Zeroizing::new(vec![0u8; bits / 8]);
        rand::rngs::OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|e| WalletError::EntropyUnavailable(e.to_string()))?;
        debug!(bits, "mnemonic: generated entropy");
        Self::from_entropy(&entropy)
    }

    /// Encode raw entropy as a mnemonic.
    pub fn from_entropy(entropy: &[u8]) -> Result<Self, WalletError> {
        let bits = entropy.len() * 8;
        if !SUPPORTED_ENTROPY_BITS.contains(&bits) {
            return Err(WalletError::UnsupportedEntropy(bits));
        }
        bip39::Mnemonic::from_entropy_in(Language::English, entropy)
            .map(|inner| Self { inner })
            .map_err(map_bip39_error)
    }

    /// Parse a phrase, normalizing whitespace and case first.
    pub fn parse(phrase: &str) -> Result<Self, WalletError> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        );
        bip39::Mnemonic::parse_in(Language::English, normalized.as_str())
            .map(|inner| Self { inner })
            .map_err(map_bip39_error)
    }

    /// Stretch the phrase into a 64-byte seed. An empty passphrase is valid.
    pub fn to_seed(&self, passphrase: &str) -> Seed {
        Seed::from_bytes(self.inner.to_seed(passphrase))
    }

    /// The entropy the phrase encodes.
    pub fn entropy(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.inner.to_entropy())
    }

    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }
}

fn map_bip39_error(err: bip39::Error) -> WalletError {
    match err {
        bip39::Error::BadWordCount(n) => WalletError::InvalidWordCount(n),
        bip39::Error::UnknownWord(position) => WalletError::UnknownWord(position),
        bip39::Error::InvalidChecksum => WalletError::InvalidChecksum,
        bip39::Error::BadEntropyBitCount(bits) => WalletError::UnsupportedEntropy(bits),
        #[allow(unreachable_patterns)]
        other => WalletError::InvalidMnemonic(other.to_string()),
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.word_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ABANDON_ABOUT: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    /// Replace the last word with the one whose index differs in `bit`.
    /// The low bits of the last word's index are checksum bits.
    fn flip_last_word_bit(phrase: &str, bit: usize) -> String {
        let list = Language::English.word_list();
        let mut words: Vec<&str> = phrase.split(' ').collect();
        let last = words.len() - 1;
        let index = Language::English.find_word(words[last]).unwrap() as usize;
        words[last] = list[index ^ (1 << bit)];
        words.join(" ")
    }

    #[test]
    fn word_counts_match_entropy_sizes() {
        for (bits, words) in SUPPORTED_ENTROPY_BITS.iter().zip([12, 15, 18, 21, 24]) {
            let m = Mnemonic::generate(*bits).unwrap();
            assert_eq!(m.word_count(), words);
            assert_eq!(m.entropy().len() * 8, *bits);

            let parsed = Mnemonic::parse(&m.to_string()).unwrap();
            assert_eq!(*parsed.entropy(), *m.entropy(), "{bits} bits");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn entropy_roundtrips_through_text(
            size in 0usize..SUPPORTED_ENTROPY_BITS.len(),
            bytes in proptest::collection::vec(any::<u8>(), 32),
        ) {
            let bits = SUPPORTED_ENTROPY_BITS[size];
            let m = Mnemonic::from_entropy(&bytes[..bits / 8]).unwrap();
            let parsed = Mnemonic::parse(&m.to_string()).unwrap();
            prop_assert_eq!(&parsed.entropy()[..], &bytes[..bits / 8]);
        }

        #[test]
        fn every_checksum_bit_flip_rejected(
            size in 0usize..SUPPORTED_ENTROPY_BITS.len(),
            bytes in proptest::collection::vec(any::<u8>(), 32),
        ) {
            let bits = SUPPORTED_ENTROPY_BITS[size];
            let phrase = Mnemonic::from_entropy(&bytes[..bits / 8]).unwrap().to_string();
            for bit in 0..bits / 32 {
                let flipped = flip_last_word_bit(&phrase, bit);
                prop_assert_eq!(Mnemonic::parse(&flipped).unwrap_err(), WalletError::InvalidChecksum);
            }
        }
    }

    #[test]
    fn unsupported_bits_rejected() {
        assert_eq!(Mnemonic::generate(100).unwrap_err(), WalletError::UnsupportedEntropy(100));
        assert_eq!(Mnemonic::generate(512).unwrap_err(), WalletError::UnsupportedEntropy(512));
    }

    #[test]
    fn generated_phrases_differ() {
        let a = Mnemonic::generate(128).unwrap();
        let b = Mnemonic::generate(128).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn roundtrip_through_text() {
        let m = Mnemonic::generate(256).unwrap();
        let parsed = Mnemonic::parse(&m.to_string()).unwrap();
        assert_eq!(parsed, m);
        assert_eq!(*parsed.entropy(), *m.entropy());
    }

    #[test]
    fn zero_entropy_is_abandon_about() {
        let m = Mnemonic::from_entropy(&[0u8; 16]).unwrap();
        assert_eq!(m.to_string(), ABANDON_ABOUT);
    }

    #[test]
    fn trezor_seed_vector() {
        let m = Mnemonic::parse(ABANDON_ABOUT).unwrap();
        let seed = m.to_seed("TREZOR");
        assert_eq!(
            hex::encode(seed.as_bytes()),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn passphrase_changes_seed() {
        let m = Mnemonic::parse(ABANDON_ABOUT).unwrap();
        assert_ne!(m.to_seed("").as_bytes(), m.to_seed("x").as_bytes());
    }

    #[test]
    fn whitespace_and_case_normalized() {
        let messy = format!("  {}\n", ABANDON_ABOUT.to_uppercase().replace(' ', " \t "));
        let m = Mnemonic::parse(&messy).unwrap();
        assert_eq!(m.to_string(), ABANDON_ABOUT);
    }

    #[test]
    fn bad_checksum_rejected() {
        let phrase = ABANDON_ABOUT.replace("about", "abandon");
        assert_eq!(Mnemonic::parse(&phrase).unwrap_err(), WalletError::InvalidChecksum);
    }

    #[test]
    fn unknown_word_rejected() {
        let phrase = ABANDON_ABOUT.replacen("abandon", "abandonx", 1);
        assert_eq!(Mnemonic::parse(&phrase).unwrap_err(), WalletError::UnknownWord(0));
    }

    #[test]
    fn wrong_word_count_rejected() {
        assert_eq!(
            Mnemonic::parse("abandon abandon about").unwrap_err(),
            WalletError::InvalidWordCount(3)
        );
    }

    #[test]
    fn debug_hides_words() {
        let m = Mnemonic::parse(ABANDON_ABOUT).unwrap();
        let debug = format!("{m:?}");
        assert!(!debug.contains("abandon"));
        assert!(debug.contains("12"));
    }
}
