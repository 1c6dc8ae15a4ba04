//
// Copyright (c) 2025 CUMULUS STORAGE CONTRIBUTORS
// This source code is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Project: cumulus — Personal cloud file storage.
//

//! Salted password hashing.
//!
//! Passwords are never stored or logged in cleartext. The stored form is
//! `base64(PBKDF2-HMAC-SHA256(password, salt, 10_000 iterations, 32 bytes))`
//! next to a base64-encoded 16-byte random salt.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::AuthError;

pub const PBKDF2_ITERATIONS: u32 = 10_000;
pub const SALT_LEN: usize = 16;
pub const HASH_LEN: usize = 32;

/// Generate a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

fn derive(password: &str, salt: &[u8]) -> [u8; HASH_LEN] {
    let mut derived = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut derived);
    derived
}

/// Hash a password with the given salt, returning the base64 stored form.
pub fn hash_password(password: &str, salt: &[u8]) -> String {
    BASE64.encode(derive(password, salt))
}

/// Encode a salt for storage.
pub fn encode_salt(salt: &[u8]) -> String {
    BASE64.encode(salt)
}

/// Recompute the hash for `password` under the stored salt and compare it
/// against the stored hash in constant time.
pub fn verify_password(
    password: &str,
    stored_hash_b64: &str,
    stored_salt_b64: &str,
) -> Result<bool, AuthError> {
    let salt = BASE64
        .decode(stored_salt_b64)
        .map_err(|e| AuthError::Store(format!("corrupt stored salt: {e}")))?;
    let stored = BASE64
        .decode(stored_hash_b64)
        .map_err(|e| AuthError::Store(format!("corrupt stored hash: {e}")))?;

    let candidate = derive(password, &salt);
    Ok(constant_time_eq(&candidate, &stored))
}

// Length leak is fine; both operands are fixed-width digests.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let salt = generate_salt();
        let hash = hash_password("p@ss", &salt);
        assert!(verify_password("p@ss", &hash, &encode_salt(&salt)).unwrap());
    }

    #[test]
    fn wrong_password_fails() {
        let salt = generate_salt();
        let hash = hash_password("p@ss", &salt);
        assert!(!verify_password("p@ss2", &hash, &encode_salt(&salt)).unwrap());
        assert!(!verify_password("", &hash, &encode_salt(&salt)).unwrap());
    }

    #[test]
    fn salts_are_unique_and_hash_is_salted() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
        assert_ne!(hash_password("p@ss", &a), hash_password("p@ss", &b));
    }

    #[test]
    fn stored_form_is_32_byte_digest() {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
        let salt = generate_salt();
        let decoded = BASE64.decode(hash_password("x", &salt)).unwrap();
        assert_eq!(decoded.len(), HASH_LEN);
    }

    #[test]
    fn corrupt_store_surfaces_error() {
        assert!(verify_password("x", "!!!", "also-not-base64").is_err());
    }
}
