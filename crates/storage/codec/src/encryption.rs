//! Encryption envelopes: `[algo:u8][orig_len:u32][nonce/iv][ciphertext]`.
//!
//! As with compression, tag `0` ("none") is the disabled sentinel a wrapper
//! still writes when encryption is turned off, so later enabling encryption
//! does not strand already-written pages.

use crate::errors::{CodecError, CodecResult};
use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

/// A 32-byte symmetric key. Zeroed on drop.
#[derive(Clone)]
pub struct EncryptionKey(pub [u8; 32]);

impl zeroize::Zeroize for EncryptionKey {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for EncryptionKey {
    fn drop(&mut self) {
        zeroize::Zeroize::zeroize(self);
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Encryption algorithm, mirroring the envelope's one-byte tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    /// No encryption; the envelope still carries the disabled sentinel tag.
    None,
    /// AES-256-GCM, authenticated, 12-byte nonce.
    Aes256Gcm,
    /// AES-256-CTR, unauthenticated stream cipher, 16-byte IV.
    Aes256Ctr,
}

impl Default for EncryptionAlgorithm {
    fn default() -> Self {
        Self::None
    }
}

const TAG_NONE: u8 = 0;
const TAG_AES_GCM: u8 = 1;
const TAG_AES_CTR: u8 = 2;

const GCM_NONCE_LEN: usize = 12;
const CTR_IV_LEN: usize = 16;

impl EncryptionAlgorithm {
    fn tag(self) -> u8 {
        match self {
            Self::None => TAG_NONE,
            Self::Aes256Gcm => TAG_AES_GCM,
            Self::Aes256Ctr => TAG_AES_CTR,
        }
    }
}

type Aes256CtrCipher = ctr::Ctr128BE<Aes256>;

/// Encrypts `plaintext` per `algo` and wraps it in a tagged envelope. `key`
/// is required unless `algo` is [`EncryptionAlgorithm::None`].
pub fn encode_envelope(
    plaintext: &[u8],
    algo: EncryptionAlgorithm,
    key: Option<&EncryptionKey>,
) -> CodecResult<Vec<u8>> {
    let mut out = vec![algo.tag()];
    out.extend_from_slice(&(plaintext.len() as u32).to_le_bytes());
    match algo {
        EncryptionAlgorithm::None => {
            out.extend_from_slice(plaintext);
        }
        EncryptionAlgorithm::Aes256Gcm => {
            let key = key.ok_or(CodecError::MissingKey)?;
            let cipher = Aes256Gcm::new_from_slice(&key.0).expect("32-byte key");
            let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
            rand::thread_rng().fill_bytes(&mut nonce_bytes);
            let ciphertext = cipher
                .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
                .map_err(|e| CodecError::Corruption(e.to_string()))?;
            out.extend_from_slice(&nonce_bytes);
            out.extend_from_slice(&ciphertext);
        }
        EncryptionAlgorithm::Aes256Ctr => {
            let key = key.ok_or(CodecError::MissingKey)?;
            let mut iv = [0u8; CTR_IV_LEN];
            rand::thread_rng().fill_bytes(&mut iv);
            let mut buf = plaintext.to_vec();
            let mut cipher = Aes256CtrCipher::new(key.0.as_slice().into(), iv.as_slice().into());
            cipher.apply_keystream(&mut buf);
            out.extend_from_slice(&iv);
            out.extend_from_slice(&buf);
        }
    }
    Ok(out)
}

/// Unwraps an encryption envelope produced by [`encode_envelope`], returning
/// the original plaintext bytes.
pub fn decode_envelope(
    bytes: &[u8],
    configured: EncryptionAlgorithm,
    key: Option<&EncryptionKey>,
) -> CodecResult<Vec<u8>> {
    if bytes.len() < 5 {
        return Err(CodecError::Corruption(
            "encryption envelope shorter than its own header".to_string(),
        ));
    }
    let tag = bytes[0];
    let orig_len = u32::from_le_bytes(bytes[1..5].try_into().unwrap()) as usize;
    let rest = &bytes[5..];

    if tag == TAG_NONE {
        return Ok(rest[..orig_len.min(rest.len())].to_vec());
    }
    if tag != configured.tag() {
        return Err(CodecError::AlgorithmMismatch {
            expected: configured.tag(),
            found: tag,
        });
    }

    match configured {
        EncryptionAlgorithm::None => unreachable!("None never reaches a non-sentinel tag check"),
        EncryptionAlgorithm::Aes256Gcm => {
            let key = key.ok_or(CodecError::MissingKey)?;
            if rest.len() < GCM_NONCE_LEN {
                return Err(CodecError::Corruption("gcm envelope missing nonce".to_string()));
            }
            let (nonce_bytes, ciphertext) = rest.split_at(GCM_NONCE_LEN);
            let cipher = Aes256Gcm::new_from_slice(&key.0).expect("32-byte key");
            let plaintext = cipher
                .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
                .map_err(|e| CodecError::Corruption(e.to_string()))?;
            Ok(plaintext)
        }
        EncryptionAlgorithm::Aes256Ctr => {
            let key = key.ok_or(CodecError::MissingKey)?;
            if rest.len() < CTR_IV_LEN {
                return Err(CodecError::Corruption("ctr envelope missing iv".to_string()));
            }
            let (iv, ciphertext) = rest.split_at(CTR_IV_LEN);
            let mut buf = ciphertext.to_vec();
            let mut cipher = Aes256CtrCipher::new(key.0.as_slice().into(), iv.into());
            cipher.apply_keystream(&mut buf);
            if buf.len() != orig_len {
                return Err(CodecError::Corruption(format!(
                    "decrypted {} bytes, envelope declared {orig_len}",
                    buf.len()
                )));
            }
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> EncryptionKey {
        EncryptionKey([7u8; 32])
    }

    #[test]
    fn none_round_trips() {
        let plaintext = b"hello world".to_vec();
        let envelope = encode_envelope(&plaintext, EncryptionAlgorithm::None, None).unwrap();
        let decoded = decode_envelope(&envelope, EncryptionAlgorithm::None, None).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn aes_gcm_round_trips() {
        let plaintext = b"a secret record payload".to_vec();
        let k = key();
        let envelope = encode_envelope(&plaintext, EncryptionAlgorithm::Aes256Gcm, Some(&k)).unwrap();
        assert_ne!(&envelope[5..], plaintext.as_slice());
        let decoded = decode_envelope(&envelope, EncryptionAlgorithm::Aes256Gcm, Some(&k)).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn aes_ctr_round_trips() {
        let plaintext = b"another secret record payload".to_vec();
        let k = key();
        let envelope = encode_envelope(&plaintext, EncryptionAlgorithm::Aes256Ctr, Some(&k)).unwrap();
        let decoded = decode_envelope(&envelope, EncryptionAlgorithm::Aes256Ctr, Some(&k)).unwrap();
        assert_eq!(decoded, plaintext);
    }

    #[test]
    fn gcm_tamper_is_detected() {
        let plaintext = b"integrity matters here".to_vec();
        let k = key();
        let mut envelope = encode_envelope(&plaintext, EncryptionAlgorithm::Aes256Gcm, Some(&k)).unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;
        assert!(decode_envelope(&envelope, EncryptionAlgorithm::Aes256Gcm, Some(&k)).is_err());
    }

    #[test]
    fn disabled_sentinel_passes_through_even_when_reconfigured() {
        let plaintext = b"written before encryption was turned on".to_vec();
        let envelope = encode_envelope(&plaintext, EncryptionAlgorithm::None, None).unwrap();
        let k = key();
        let decoded = decode_envelope(&envelope, EncryptionAlgorithm::Aes256Gcm, Some(&k)).unwrap();
        assert_eq!(decoded, plaintext);
    }
}
