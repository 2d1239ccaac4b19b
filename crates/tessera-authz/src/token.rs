//! Opaque invitation tokens.
//!
//! The raw token only travels in the invitation email; storage keeps
//! its SHA-256 digest.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random invitation token
/// (32 bytes, base64url-encoded, no padding).
pub fn generate_invitation_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rand::Rng::random(&mut rng);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hash of a raw invitation token, hex-encoded. This is the
/// value stored as `invitation.token_hash`.
pub fn hash_invitation_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    hex::encode(hasher.finalize())
}
