//! Randomness, hashing and constant-time comparison helpers.

use crate::error::PasswordHashError;
use crate::models::PkceMethod;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Compares two strings without leaking the position of the first mismatch.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// `len` random bytes, hex encoded.
pub fn random_hex(len: usize) -> String {
    hex::encode(random_bytes(len))
}

/// `len` random bytes, base64url encoded without padding.
pub fn random_token(len: usize) -> String {
    URL_SAFE_NO_PAD.encode(random_bytes(len))
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Hex SHA-256 digest.
pub fn sha256_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Challenge derived from a PKCE verifier.
pub fn pkce_challenge(verifier: &str, method: PkceMethod) -> String {
    match method {
        PkceMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
        PkceMethod::Plain => verifier.to_string(),
    }
}

/// Recomputes the challenge from `verifier` and compares it in constant time.
pub fn verify_pkce(challenge: &str, method: PkceMethod, verifier: &str) -> bool {
    constant_time_eq(&pkce_challenge(verifier, method), challenge)
}

/// Digest stored for a client secret.
pub fn hash_client_secret(secret: &str) -> String {
    sha256_hex(secret)
}

pub fn verify_client_secret(secret_hash: &str, presented: &str) -> bool {
    constant_time_eq(&hash_client_secret(presented), secret_hash)
}

/// Hashes a password into an Argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordHashError)?;
    Ok(hash.to_string())
}

/// Checks a password against a PHC string. Malformed hashes never verify.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
