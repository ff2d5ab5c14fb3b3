//! Support for [Artyom Pavlov](https://github.com/newpavlov)'s
//! [chacha20poly1305](https://crates.io/crates/chacha20poly1305) crate, an alternative to
//! [`crate::crypto::cipher::AesGcmCipher`] selected via the mutually-exclusive `encrypt-chacha20`
//! feature.

use crate::crypto::cipher::{Cipher, NONCE_SIZE};
use crate::error::{Error, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

// -------------------------------------------------------------------------------------------------
//
/// ChaCha20-Poly1305 authenticated encryption, under the same deterministic-nonce contract as
/// [`crate::crypto::cipher::AesGcmCipher`].
#[derive(Default, Debug)]
pub struct ChaCha20Cipher;

// -------------------------------------------------------------------------------------------------
//
// Trait Implementations

impl Cipher for ChaCha20Cipher {
    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|e| Error::CryptoError(format!("ChaCha20-Poly1305 encryption failed: {e}")))
    }

    fn decrypt(&self, key: &[u8; 32], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::CryptoError(format!("ChaCha20-Poly1305 decryption failed: {e}")))
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
