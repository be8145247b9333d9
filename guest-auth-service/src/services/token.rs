//! Opaque token generation and hashing.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Raw token length in bytes; the hex form is twice as long.
pub const TOKEN_BYTES: usize = 32;

/// Generate 32 random bytes from the OS-seeded CSPRNG as lowercase hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// SHA-256 of a token, hex encoded. Used for session lookups at rest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// `^[a-f0-9]{64}$`
pub fn is_valid_token_format(token: &str) -> bool {
    token.len() == TOKEN_BYTES * 2
        && token
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// First characters of a token, safe to log.
pub fn token_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
