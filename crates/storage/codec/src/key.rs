//! Password-based key derivation (PBKDF2-HMAC-SHA256).

use crate::encryption::EncryptionKey;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

/// Salt length, in bytes.
pub const SALT_LEN: usize = 32;
/// Iteration count used for every derived key.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Generates a fresh random salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derives a 32-byte key from `password` and `salt` via PBKDF2-HMAC-SHA256.
pub fn derive_key(password: &str, salt: &[u8; SALT_LEN]) -> EncryptionKey {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    EncryptionKey(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_password_and_salt_derive_the_same_key() {
        let salt = generate_salt();
        let a = derive_key("hunter2", &salt);
        let b = derive_key("hunter2", &salt);
        assert_eq!(a.0, b.0);
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = derive_key("hunter2", &[1u8; SALT_LEN]);
        let b = derive_key("hunter2", &[2u8; SALT_LEN]);
        assert_ne!(a.0, b.0);
    }
}
