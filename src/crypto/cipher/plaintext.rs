//! A no-op cipher backend for tests and development, matching spec.md §4.2's "an alternate no-op
//! mode is provided for test/dev; the public API is identical."

use crate::crypto::cipher::{Cipher, NONCE_SIZE};
use crate::error::Result;

// -------------------------------------------------------------------------------------------------
//
/// Returns the plaintext unchanged from both `encrypt` and `decrypt`. Useful for tests that want to
/// assert on cleartext row contents without threading a real key through, and for local development
/// where the overhead of AES-GCM is not worth it.
#[derive(Default, Debug)]
pub struct PlaintextCipher;

// -------------------------------------------------------------------------------------------------
//
// Trait Implementations

impl Cipher for PlaintextCipher {
    fn encrypt(&self, _key: &[u8; 32], _nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>> {
        Ok(plaintext.to_vec())
    }

    fn decrypt(&self, _key: &[u8; 32], _nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
        Ok(ciphertext.to_vec())
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
