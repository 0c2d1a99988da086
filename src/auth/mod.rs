//! Credentials: bcrypt password hashing, HS256 access tokens, and
//! signing-secret provisioning.

use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// bcrypt work factor for stored password hashes.
const BCRYPT_COST: u32 = 12;

/// bcrypt only considers the first 72 bytes of input.
const BCRYPT_MAX_BYTES: usize = 72;

// ─── Signing secret ──────────────────────────────────────────────────────────

/// Return the token signing secret for this instance.
///
/// On first call, generates a random 32-character hex secret and writes it to
/// `{data_dir}/secret_key` with user-only read/write permissions (mode 0600
/// on Unix). On subsequent calls, reads and returns the existing secret.
///
/// Only used when no SECRET_KEY is configured — an operator-provided key
/// always wins (see `ShelfConfig::new`). The file must be kept secret: it is
/// the only thing standing between a forged token and the catalog.
pub fn get_or_create_secret(data_dir: &Path) -> Result<String> {
    let path = data_dir.join("secret_key");

    if path.exists() {
        let secret = std::fs::read_to_string(&path)?.trim().to_string();
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    // Generate a new secret (UUID v4, hex without dashes = 32 chars)
    let secret = Uuid::new_v4().to_string().replace('-', "");

    std::fs::create_dir_all(data_dir)?;
    std::fs::write(&path, &secret)?;

    // Restrict to owner read/write only on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(secret)
}

// ─── Password hashing ────────────────────────────────────────────────────────

fn bcrypt_input(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(BCRYPT_MAX_BYTES)]
}

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String> {
    Ok(bcrypt::hash(bcrypt_input(password), BCRYPT_COST)?)
}

/// Check a plaintext password against a stored hash.
/// Any verification failure (including a malformed hash) reads as a mismatch.
pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(bcrypt_input(password), hashed).unwrap_or(false)
}

// ─── Access tokens ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was minted for.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

/// Mint an HS256 access token for `username`, valid for `ttl_minutes`.
pub fn create_access_token(username: &str, secret: &str, ttl_minutes: i64) -> Result<String> {
    let claims = Claims {
        sub: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(ttl_minutes)).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Verify a token and return its claims, or `None` when the token is
/// malformed, tampered with, or expired.
pub fn verify_token(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .ok()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
