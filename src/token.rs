use rand::distributions::{Alphanumeric, DistString};
use std::fmt::{Debug, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

/// The default length of generated tokens, in characters.
///
/// With 62 possible characters, 32 characters carry more than 190 bits of entropy.
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// A type with the ability to generate tokens for sessions and password resets.
pub trait TokenGenerator: Debug + Send + Sync {
    /// Generate a token, i.e. a string that is a valid HTTP cookie value.
    fn generate_token(&self) -> String;
}

/// The default token generator with focus on security.
/// It uses [rand::thread_rng] as a random source and the [Alphanumeric] distribution to generate token strings.
/// This gives `log_2(26+26+10) ≥ 5.95` bits of entropy per character.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTokenGenerator<const TOKEN_LENGTH: usize = DEFAULT_TOKEN_LENGTH>;

impl<const TOKEN_LENGTH: usize> TokenGenerator for DefaultTokenGenerator<TOKEN_LENGTH> {
    fn generate_token(&self) -> String {
        // According to the docs of the rand crate, thread_rng() is cryptographically secure.
        let mut token = String::with_capacity(TOKEN_LENGTH);
        Alphanumeric.append_string(&mut rand::thread_rng(), &mut token, TOKEN_LENGTH);
        token
    }
}

/// A debug token generator that generates an ascending sequence of integers, formatted as strings padded with zeroes.
///
/// **This type is supposed to be used in tests only.**
#[derive(Debug, Default)]
pub struct DebugTokenGenerator<const TOKEN_LENGTH: usize = DEFAULT_TOKEN_LENGTH> {
    next_index: AtomicUsize,
}

impl<const TOKEN_LENGTH: usize> DebugTokenGenerator<TOKEN_LENGTH> {
    /// Create a debug generator whose first token encodes `next_index`.
    pub fn starting_at(next_index: usize) -> Self {
        Self {
            next_index: AtomicUsize::new(next_index),
        }
    }
}

impl<const TOKEN_LENGTH: usize> TokenGenerator for DebugTokenGenerator<TOKEN_LENGTH> {
    fn generate_token(&self) -> String {
        let index = self.next_index.fetch_add(1, Ordering::Relaxed);
        let mut token = String::with_capacity(TOKEN_LENGTH);
        write!(&mut token, "{index:0width$}", width = TOKEN_LENGTH)
            .expect("writing to a string cannot fail");
        token
    }
}

/// Shorten a token for log output.
pub(crate) fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(4).collect();
    format!("{prefix}***")
}
