//! Verification token generation

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::{rngs::OsRng, RngCore};

const TOKEN_BYTES: usize = 32;

/// Generate a random verification token carrying `prefix`
pub fn generate_verification_token(prefix: &str) -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    format!("{}{}", prefix, URL_SAFE.encode(bytes))
}
