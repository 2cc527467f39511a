use crate::error::GeneratorError;
use crate::Generator;
use rand::Rng;
use snip_core::Slug;

/// Symbols a generated slug is drawn from: `a-z` followed by `A-Z`.
pub const ALPHABET: &[u8; 52] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub const DEFAULT_SLUG_LENGTH: usize = 8;

/// Draws `length` symbols uniformly from [`ALPHABET`].
///
/// Uses the thread-local, non-cryptographic RNG. Fails with
/// [`GeneratorError::InvalidLength`] when `length` is zero.
pub fn generate(length: usize) -> Result<String, GeneratorError> {
    if length == 0 {
        return Err(GeneratorError::InvalidLength(length));
    }

    let mut rng = rand::rng();
    let token = (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();

    Ok(token)
}

/// Fixed-length random slug generator.
#[derive(Debug, Clone, Copy)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    /// Creates a generator producing slugs of `length` symbols.
    pub fn new(length: usize) -> Result<Self, GeneratorError> {
        if length == 0 {
            return Err(GeneratorError::InvalidLength(length));
        }
        Ok(Self { length })
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self {
            length: DEFAULT_SLUG_LENGTH,
        }
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> Result<Slug, GeneratorError> {
        generate(self.length).map(Slug::new_unchecked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn zero_length_is_rejected() {
        assert_eq!(generate(0), Err(GeneratorError::InvalidLength(0)));
        assert!(RandomGenerator::new(0).is_err());
    }

    #[test]
    fn produces_requested_length() {
        for length in [1, 8, 32] {
            assert_eq!(generate(length).unwrap().len(), length);
        }
    }

    #[test]
    fn only_alphabetic_symbols() {
        let token = generate(256).unwrap();
        assert!(token.bytes().all(|b| ALPHABET.contains(&b)));
    }

    #[test]
    fn alphabet_has_52_distinct_symbols() {
        let distinct: HashSet<_> = ALPHABET.iter().collect();
        assert_eq!(distinct.len(), 52);
    }

    #[test]
    fn default_generator_uses_eight_symbols() {
        let generator = RandomGenerator::default();
        assert_eq!(generator.length(), DEFAULT_SLUG_LENGTH);
        assert_eq!(generator.generate().unwrap().as_str().len(), 8);
    }

    #[test]
    fn consecutive_slugs_differ() {
        let generator = RandomGenerator::default();
        let slugs: HashSet<_> = (0..100).map(|_| generator.generate().unwrap()).collect();
        // 52^8 keyspace: a repeat within 100 draws would point at a broken RNG.
        assert_eq!(slugs.len(), 100);
    }

    #[test]
    fn generator_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RandomGenerator>();
    }
}
