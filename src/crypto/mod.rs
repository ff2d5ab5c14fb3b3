//! Per-subject encryption manager (spec.md §4.2).
//!
//! Two keys are ever in play:
//! - a single **global key**, derived once from the engine's configured master secret
//!   ([`kdf::derive_global_key`]), used only to encrypt the shard-name and primary-key fields of a
//!   composite KV key so that equality/prefix lookups work without decrypting candidates;
//! - one **subject key** per shard, randomly generated on first insert and cached in a
//!   [`KeyRing`], used to encrypt the full row value.
//!
//! Both use a deterministic global nonce: encrypting the same shard name twice must yield the same
//! ciphertext, which is the whole point of supporting prefix scans over an encrypted key space. This
//! sacrifices AES-GCM/ChaCha20-Poly1305's usual semantic-security guarantee (spec.md §4.2's
//! documented tradeoff).

pub mod cipher;
pub mod kdf;
pub mod key_ring;

pub use cipher::Cipher;
pub use key_ring::KeyRing;

use crate::error::{Error, Result};
use crate::kv::key::CompositeKey;
use cipher::NONCE_SIZE;

/// Width, in bytes, of every key this crate hands to a [`Cipher`] backend.
pub const KEY_SIZE: usize = 32;

// -------------------------------------------------------------------------------------------------
//
/// Selects which [`Cipher`] backend a [`Manager`] encrypts under. Exposed so
/// [`crate::config::EngineConfig`] can pick a backend at runtime (SQL-level behavior must be
/// switchable per open connection, unlike the teacher crate's build-time feature gating).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum CryptoBackend {
    #[default]
    Aes256Gcm,
    ChaCha20,
    /// No-op passthrough for tests/dev; see spec.md §4.2.
    Plaintext,
}

impl CryptoBackend {
    fn build(self) -> Result<Box<dyn Cipher>> {
        match self {
            #[cfg(feature = "encrypt-aes-gcm")]
            Self::Aes256Gcm => Ok(Box::new(cipher::AesGcmCipher)),
            #[cfg(not(feature = "encrypt-aes-gcm"))]
            Self::Aes256Gcm => Err(Error::ConfigError(
                "CryptoBackend::Aes256Gcm selected but the `encrypt-aes-gcm` feature is disabled"
                    .into(),
            )),
            #[cfg(feature = "encrypt-chacha20")]
            Self::ChaCha20 => Ok(Box::new(cipher::ChaCha20Cipher)),
            #[cfg(not(feature = "encrypt-chacha20"))]
            Self::ChaCha20 => Err(Error::ConfigError(
                "CryptoBackend::ChaCha20 selected but the `encrypt-chacha20` feature is disabled"
                    .into(),
            )),
            Self::Plaintext => Ok(Box::new(cipher::PlaintextCipher)),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// The encryption manager: contract per spec.md §4.2 (`encrypt_key`, `decrypt_key`,
/// `encrypt_value`, `decrypt_value`, `encrypt_seek`).
pub struct Manager {
    cipher: Box<dyn Cipher>,
    global_key: [u8; KEY_SIZE],
    global_nonce: [u8; NONCE_SIZE],
    key_ring: KeyRing,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Manager {
    /// # Errors
    /// Returns [`Error::ConfigError`] if `backend` names a cipher whose feature is not compiled in.
    pub fn new(
        backend: CryptoBackend,
        master_secret: &[u8],
        global_nonce: [u8; NONCE_SIZE],
        key_ring: KeyRing,
    ) -> Result<Self> {
        Ok(Self {
            cipher: backend.build()?,
            global_key: kdf::derive_global_key(master_secret),
            global_nonce,
            key_ring,
        })
    }

    #[must_use]
    pub const fn key_ring(&self) -> &KeyRing {
        &self.key_ring
    }

    /// Encrypts `shard_name` and `pk_bytes` separately under the global key/nonce and assembles the
    /// resulting composite key.
    ///
    /// # Errors
    /// Returns [`Error::CryptoError`] on a backend failure.
    pub fn encrypt_key(&self, shard_name: &str, pk_bytes: &[u8]) -> Result<CompositeKey> {
        let shard_cipher = self.cipher.encrypt(&self.global_key, &self.global_nonce, shard_name.as_bytes())?;
        let pk_cipher = self.cipher.encrypt(&self.global_key, &self.global_nonce, pk_bytes)?;
        Ok(CompositeKey::assemble(&shard_cipher, &pk_cipher))
    }

    /// Inverse of [`Self::encrypt_key`]: returns the plaintext shard name and primary-key bytes.
    ///
    /// # Errors
    /// Returns [`Error::CryptoError`] on a backend failure, or [`Error::CodecError`] if the key's
    /// shard name is not valid UTF-8 (indicates corruption: every shard name written through
    /// [`Self::encrypt_key`] was UTF-8 to begin with).
    pub fn decrypt_key(&self, key: &CompositeKey) -> Result<(String, Vec<u8>)> {
        let (shard_cipher, pk_cipher) = key.split()?;
        let shard_name_bytes = self.cipher.decrypt(&self.global_key, &self.global_nonce, shard_cipher)?;
        let pk_bytes = self.cipher.decrypt(&self.global_key, &self.global_nonce, pk_cipher)?;
        let shard_name = String::from_utf8(shard_name_bytes)
            .map_err(|e| Error::CodecError(format!("decrypted shard name is not valid UTF-8: {e}")))?;
        Ok((shard_name, pk_bytes))
    }

    /// Encrypts just `shard_name`, for use as the lower bound of a shard-prefix scan (spec.md
    /// §4.3's `get_shard`). The caller derives the scan's exclusive upper bound from the result via
    /// [`CompositeKey::prefix_upper_bound`].
    ///
    /// # Errors
    /// Returns [`Error::CryptoError`] on a backend failure.
    pub fn encrypt_seek(&self, shard_name: &str) -> Result<Vec<u8>> {
        self.cipher.encrypt(&self.global_key, &self.global_nonce, shard_name.as_bytes())
    }

    /// Encrypts `plaintext_row` (an encoded [`crate::kv::sequence::SequenceWriter`] buffer) under
    /// `shard_name`'s subject key, creating that key if this is the shard's first write.
    ///
    /// Returns the ciphertext along with whether the subject key was freshly generated; when it
    /// was, the caller ([`crate::kv::Store`]) must persist the new key to the metadata table before
    /// the write is visible to a future process restart.
    ///
    /// # Errors
    /// Returns [`Error::CryptoError`] on a backend failure.
    pub fn encrypt_value(&self, shard_name: &str, plaintext_row: &[u8]) -> Result<(Vec<u8>, bool)> {
        let (key, fresh) = self.key_ring.get_or_create(shard_name);
        let cipher = self.cipher.encrypt(&key, &self.global_nonce, plaintext_row)?;
        Ok((cipher, fresh))
    }

    /// Decrypts a row value previously produced by [`Self::encrypt_value`].
    ///
    /// # Errors
    /// Returns [`Error::UnknownSubjectKey`] if `shard_name` has no key on file (DB corruption: a
    /// row exists under a shard whose key was lost without the shard being forgotten), or
    /// [`Error::CryptoError`] on a backend failure.
    pub fn decrypt_value(&self, shard_name: &str, cipher_bytes: &[u8]) -> Result<Vec<u8>> {
        let key = self
            .key_ring
            .get(shard_name)
            .ok_or_else(|| Error::UnknownSubjectKey(shard_name.to_owned()))?;
        self.cipher.decrypt(&key, &self.global_nonce, cipher_bytes)
    }

    /// Drops `shard_name`'s subject key from the in-memory ring. The caller must also erase the
    /// persisted `"K/<shard_name>"` metadata entry for the key to be truly gone.
    pub fn forget_subject(&self, shard_name: &str) {
        self.key_ring.forget(shard_name);
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
