//! Opaque key generation.
//!
//! Keys are fixed-length strings over `[a-zA-Z0-9]`, sampled from a
//! cryptographically secure generator. The generator makes no uniqueness
//! guarantee; the store's exclusive-create open is what catches the rare
//! collision.

use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("key length {0} is too short (minimum 2)")]
    LengthTooShort(usize),
}

/// Produces fresh content keys of a fixed configured length.
///
/// # Examples
///
/// ```rust
/// use bytedrop::token::TokenGenerator;
///
/// let tokens = TokenGenerator::new(7).unwrap();
/// let key = tokens.generate();
/// assert_eq!(key.len(), 7);
/// assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TokenGenerator {
    length: usize,
}

impl TokenGenerator {
    /// Creates a generator for keys of `length` characters.
    ///
    /// Lengths below 2 are rejected; at one character the keyspace is small
    /// enough that collisions stop being rare.
    pub fn new(length: usize) -> Result<Self, TokenError> {
        if length < 2 {
            return Err(TokenError::LengthTooShort(length));
        }
        Ok(Self { length })
    }

    /// Samples a fresh key. Uniform over the 62-character alphabet.
    pub fn generate(&self) -> String {
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_lengths() {
        assert!(matches!(
            TokenGenerator::new(0),
            Err(TokenError::LengthTooShort(0))
        ));
        assert!(matches!(
            TokenGenerator::new(1),
            Err(TokenError::LengthTooShort(1))
        ));
        assert!(TokenGenerator::new(2).is_ok());
    }

    #[test]
    fn keys_have_the_configured_shape() {
        let tokens = TokenGenerator::new(7).unwrap();
        for _ in 0..256 {
            let key = tokens.generate();
            assert_eq!(key.len(), 7);
            assert!(key.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn consecutive_keys_differ() {
        // 62^16 outcomes; a repeat here means the RNG is broken.
        let tokens = TokenGenerator::new(16).unwrap();
        assert_ne!(tokens.generate(), tokens.generate());
    }
}
