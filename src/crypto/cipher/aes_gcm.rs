//! Support for [Tony Arcieri](https://github.com/tarcieri)'s
//! [aes-gcm](https://crates.io/crates/aes-gcm) crate.

use crate::crypto::cipher::{Cipher, NONCE_SIZE};
use crate::error::{Error, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

// -------------------------------------------------------------------------------------------------
//
/// AES-256-GCM (Galois/Counter Mode) authenticated encryption.
///
/// This engine uses a deterministic nonce (the engine's single global nonce, reused across every
/// encryption under the global key, and again across every value encrypted under a given subject
/// key) rather than a fresh random nonce per call. That sacrifices AES-GCM's usual semantic-security
/// guarantee — encrypting the same plaintext twice yields the same ciphertext — in exchange for the
/// property the KV layer actually needs: two callers encrypting the same shard name must get the
/// same ciphertext, so a shard can be located by prefix scan without ever decrypting a candidate
/// key. See [`crate::crypto::Manager`] for where the nonce comes from.
#[derive(Default, Debug)]
pub struct AesGcmCipher;

// -------------------------------------------------------------------------------------------------
//
// Trait Implementations

impl Cipher for AesGcmCipher {
    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| Error::CryptoError(format!("AES-256-GCM encryption failed: {e}")))
    }

    fn decrypt(&self, key: &[u8; 32], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::CryptoError(format!("AES-256-GCM decryption failed: {e}")))
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cipher = AesGcmCipher;
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_SIZE];
        let ciphertext = cipher.encrypt(&key, &nonce, b"hello subject").unwrap();
        assert_ne!(ciphertext, b"hello subject");
        let plaintext = cipher.decrypt(&key, &nonce, &ciphertext).unwrap();
        assert_eq!(plaintext, b"hello subject");
    }

    #[test]
    fn same_plaintext_same_nonce_is_deterministic() {
        let cipher = AesGcmCipher;
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_SIZE];
        let a = cipher.encrypt(&key, &nonce, b"shard-name").unwrap();
        let b = cipher.encrypt(&key, &nonce, b"shard-name").unwrap();
        assert_eq!(a, b, "deterministic nonce must make prefix lookups possible");
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let cipher = AesGcmCipher;
        let nonce = [1u8; NONCE_SIZE];
        let ciphertext = cipher.encrypt(&[1u8; 32], &nonce, b"hello").unwrap();
        assert!(cipher.decrypt(&[2u8; 32], &nonce, &ciphertext).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = AesGcmCipher;
        let key = [7u8; 32];
        let nonce = [1u8; NONCE_SIZE];
        let mut ciphertext = cipher.encrypt(&key, &nonce, b"hello").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(cipher.decrypt(&key, &nonce, &ciphertext).is_err());
    }
}
