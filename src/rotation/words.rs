//! Pseudo-word generation for rotated sequences.
//!
//! Words alternate consonants and vowels so rotated knock paths look like
//! ordinary (if odd) page names rather than random tokens.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CONSONANTS: &[u8] = b"bcdfghjklmnprstvwz";
const VOWELS: &[u8] = b"aeiou";

/// Source of words for generated sequences.
pub trait WordSource: Send {
    /// Produce one word of `min_len..=max_len` characters.
    fn word(&mut self, min_len: usize, max_len: usize) -> String;
}

/// Pronounceable lowercase words built from alternating letters.
#[derive(Debug)]
pub struct SyllableWords {
    rng: StdRng,
}

impl SyllableWords {
    /// Generator seeded from the OS.
    pub fn new() -> Self {
        Self::with_seed(None)
    }

    /// Generator with an optional fixed seed for reproducible tests.
    pub fn with_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl Default for SyllableWords {
    fn default() -> Self {
        Self::new()
    }
}

impl WordSource for SyllableWords {
    fn word(&mut self, min_len: usize, max_len: usize) -> String {
        let len = self.rng.gen_range(min_len..=max_len.max(min_len));
        let mut vowel = self.rng.gen_bool(0.3);
        let mut word = String::with_capacity(len);

        for _ in 0..len {
            let pool = if vowel { VOWELS } else { CONSONANTS };
            word.push(pool[self.rng.gen_range(0..pool.len())] as char);
            vowel = !vowel;
        }
        word
    }
}
