//! ID generation utilities.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, RngCore};
use ulid::Ulid;

/// Alphabet for topic share codes.
pub const SHARE_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of a topic share code.
pub const SHARE_CODE_LENGTH: usize = 8;

/// ID generator for entities.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    _private: (),
}

impl IdGenerator {
    /// Create a new ID generator.
    #[must_use]
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// Generate a new ULID-based ID.
    ///
    /// ULIDs are lexicographically sortable by creation time, which gives
    /// list queries a stable tie-breaker.
    #[must_use]
    pub fn generate(&self) -> String {
        Ulid::new().to_string().to_lowercase()
    }

    /// Generate a random share code: 8 characters over `[A-Z0-9]`.
    ///
    /// Uniqueness is not guaranteed here; callers check against stored codes.
    #[must_use]
    pub fn generate_share_code(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..SHARE_CODE_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..SHARE_CODE_ALPHABET.len());
                char::from(SHARE_CODE_ALPHABET[idx])
            })
            .collect()
    }

    /// Generate a URL-safe random token (256 bits of entropy).
    #[must_use]
    pub fn generate_token(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

/// Returns whether `code` is shaped like a share code.
#[must_use]
pub fn is_valid_share_code(code: &str) -> bool {
    code.len() == SHARE_CODE_LENGTH && code.bytes().all(|b| SHARE_CODE_ALPHABET.contains(&b))
}
