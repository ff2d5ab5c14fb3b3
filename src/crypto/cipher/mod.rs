//! Pluggable symmetric-cipher backends used by [`crate::crypto::Manager`].

#[cfg(feature = "encrypt-aes-gcm")]
mod aes_gcm;
#[cfg(feature = "encrypt-chacha20")]
mod chacha20;
mod plaintext;

#[cfg(feature = "encrypt-aes-gcm")]
pub use aes_gcm::AesGcmCipher;
#[cfg(feature = "encrypt-chacha20")]
pub use chacha20::ChaCha20Cipher;
pub use plaintext::PlaintextCipher;

use crate::error::Result;

/// Width, in bytes, of the nonce every backend in this crate uses. AES-256-GCM's standard nonce
/// size; the plaintext backend ignores it entirely but keeps the same width so callers never need
/// to branch on which backend is active.
pub const NONCE_SIZE: usize = 12;

// -------------------------------------------------------------------------------------------------
//
/// A symmetric authenticated cipher used to encrypt row values and composite-key fields.
///
/// Implementations are deliberately given a *fixed* nonce by the caller (see
/// [`crate::crypto::Manager`]'s rationale on deterministic nonces): this trait does not generate
/// nonces itself, unlike a typical AEAD wrapper, because equality-searchable ciphertext is a
/// requirement here, not an incidental convenience.
pub trait Cipher: Send + Sync {
    /// Encrypts `plaintext` under `key` and `nonce`, returning ciphertext with any authentication
    /// tag appended.
    ///
    /// # Errors
    /// Returns [`crate::error::Error::CryptoError`] on a backend failure.
    fn encrypt(&self, key: &[u8; 32], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Reverses [`Self::encrypt`].
    ///
    /// # Errors
    /// Returns [`crate::error::Error::CryptoError`] if the key is wrong or the ciphertext/tag has
    /// been tampered with.
    fn decrypt(&self, key: &[u8; 32], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>>;
}
