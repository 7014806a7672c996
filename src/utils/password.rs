use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Fixed key for secret tags. Tags never leave the process; the HMAC only
/// exists so comparison goes through `verify_slice`, which is constant time.
const TAG_KEY: &[u8] = b"scam-report-hub/admin-credential/v1";

/// Hash a password using bcrypt
pub fn hash_password(password: &str) -> Result<String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).context("Failed to hash password")
}

/// Verify a password against a bcrypt hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).context("Failed to verify password")
}

/// Opaque fingerprint of a configured secret, compared with [`tag_matches`].
pub fn secret_tag(value: &str) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(TAG_KEY).context("Invalid HMAC key")?;
    mac.update(value.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time check of `candidate` against a tag from [`secret_tag`].
pub fn tag_matches(candidate: &str, tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(TAG_KEY) else {
        return false;
    };
    mac.update(candidate.as_bytes());
    mac.verify_slice(tag).is_ok()
}
