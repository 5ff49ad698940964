//! 25-word mnemonic encoding of a 256-bit seed.
//!
//! Every 4 bytes of the seed become 3 dictionary words, giving 24 words, and a 25th checksum word
//! is chosen by a CRC32 over the 3-letter prefixes of the first 24.

use super::wordlist::WORDS;

use std::collections::HashMap;
use std::sync::OnceLock;

pub const MNEMONIC_WORD_COUNT: usize = 25;
const PREFIX_LENGTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MnemonicError {
    #[error("Mnemonic seed is wrong length - It should be 25 words long, but it is {0} words long")]
    WrongWordCount(usize),

    #[error("Mnemonic seed has an invalid word - {0} is not in the English word list")]
    InvalidWord(String),

    #[error("Mnemonic seed has incorrect checksum")]
    InvalidChecksum,

    #[error("Mnemonic seed words do not encode a valid seed")]
    InvalidEncoding,
}

fn word_indices() -> &'static HashMap<&'static str, usize> {
    static INDICES: OnceLock<HashMap<&'static str, usize>> = OnceLock::new();
    INDICES.get_or_init(|| WORDS.iter().enumerate().map(|(i, w)| (*w, i)).collect())
}

fn prefix(word: &str) -> &str {
    match word.char_indices().nth(PREFIX_LENGTH) {
        Some((end, _)) => &word[..end],
        None => word,
    }
}

fn checksum_index<S: AsRef<str>>(words: &[S]) -> usize {
    let trimmed: String = words.iter().map(|w| prefix(w.as_ref())).collect();
    (crc32fast::hash(trimmed.as_bytes()) as usize) % words.len()
}

pub fn is_valid_mnemonic_word(word: &str) -> bool {
    word_indices().contains_key(word.to_lowercase().as_str())
}

pub fn seed_to_mnemonic(seed: &[u8; 32]) -> Vec<String> {
    let n = WORDS.len() as u64;
    let mut words = Vec::with_capacity(MNEMONIC_WORD_COUNT);

    for chunk in seed.chunks_exact(4) {
        let x = u64::from(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        let w1 = x % n;
        let w2 = (x / n + w1) % n;
        let w3 = (x / n / n + w2) % n;

        for index in [w1, w2, w3] {
            words.push(WORDS[index as usize].to_string());
        }
    }

    let checksum = words[checksum_index(&words)].clone();
    words.push(checksum);
    words
}

/// Decodes a whitespace-separated mnemonic phrase back into its 32-byte seed.
pub fn mnemonic_to_seed(phrase: &str) -> Result<[u8; 32], MnemonicError> {
    let words: Vec<String> = phrase.split_whitespace().map(str::to_lowercase).collect();

    if words.len() != MNEMONIC_WORD_COUNT {
        return Err(MnemonicError::WrongWordCount(words.len()));
    }

    let indices = word_indices();
    let mut positions = Vec::with_capacity(MNEMONIC_WORD_COUNT);
    for word in &words {
        match indices.get(word.as_str()) {
            Some(index) => positions.push(*index as u64),
            None => return Err(MnemonicError::InvalidWord(word.clone())),
        }
    }

    let expected = &words[checksum_index(&words[..MNEMONIC_WORD_COUNT - 1])];
    if prefix(expected) != prefix(&words[MNEMONIC_WORD_COUNT - 1]) {
        return Err(MnemonicError::InvalidChecksum);
    }

    let n = WORDS.len() as u64;
    let mut seed = [0u8; 32];

    for (i, triple) in positions[..MNEMONIC_WORD_COUNT - 1].chunks_exact(3).enumerate() {
        let (w1, w2, w3) = (triple[0], triple[1], triple[2]);
        let x = w1 + n * ((n - w1 + w2) % n) + n * n * ((n - w2 + w3) % n);

        if x % n != w1 || x > u64::from(u32::MAX) {
            return Err(MnemonicError::InvalidEncoding);
        }

        seed[i * 4..i * 4 + 4].copy_from_slice(&(x as u32).to_le_bytes());
    }

    Ok(seed)
}

/// Phrase-level validation without keeping the decoded seed. The error carries the reason.
pub fn is_valid_mnemonic(phrase: &str) -> Result<(), MnemonicError> {
    mnemonic_to_seed(phrase).map(|_| ())
}
