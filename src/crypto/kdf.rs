//! Key Derivation Function (KDF): stretches whatever randomness the host OS hands back into a
//! 32-byte key, and derives the engine's global key from its configured master secret.
//!
//! Per-subject encryption keys are *not* derived from the master secret (see
//! [`crate::crypto::key_ring::KeyRing`] for why): this module only derives the one fixed global key
//! used by [`crate::crypto::Manager::encrypt_key`]/`encrypt_seek`, and generates fresh random
//! subject keys.

use crate::crypto::KEY_SIZE;

// -------------------------------------------------------------------------------------------------
//
// KDF Feature Guard
//
// Exactly one KDF backend may be compiled in, mirroring the mutual-exclusion the encryption
// manager already enforces between cipher backends.

macro_rules! count_features {
    ($($feat:literal),* $(,)?) => {
        0_usize $(+ cfg!(feature = $feat) as usize)*
    };
}

const _KDF_FEATURE_COUNT: usize = count_features!("kdf-blake3", "kdf-sha256");

const _: () = {
    assert!(
        _KDF_FEATURE_COUNT <= 1,
        "Multiple KDF features enabled! Enable only one of: `kdf-blake3`, `kdf-sha256`.",
    );
};

/// Context string permanently bound to the derived global key. Changing it would make every
/// previously encrypted database unreadable, so it must never change across a deployment's
/// lifetime.
const CONTEXT: &str = "k9shard:global-key:v1";

/// Derives the engine's single global key (used to encrypt shard-name and primary-key fields, see
/// spec.md §4.2) from an operator-supplied master secret.
///
/// This is the *only* key this module derives. Per-subject keys are randomly generated once per
/// shard and persisted (see [`crate::crypto::key_ring::KeyRing`]) rather than derived, so that
/// `FORGET` can make a key genuinely unrecoverable instead of merely uncached.
#[must_use]
pub fn derive_global_key(master_secret: &[u8]) -> [u8; KEY_SIZE] {
    #[cfg(feature = "kdf-blake3")]
    {
        let mut hasher = blake3::Hasher::new_derive_key(CONTEXT);
        hasher.update(master_secret);
        *hasher.finalize().as_bytes()
    }
    #[cfg(all(feature = "kdf-sha256", not(feature = "kdf-blake3")))]
    {
        use ring::hmac;
        let key = hmac::Key::new(hmac::HMAC_SHA256, master_secret);
        let tag = hmac::sign(&key, CONTEXT.as_bytes());
        tag.as_ref()
            .try_into()
            .expect("HMAC-SHA256 output is always 32 bytes")
    }
    #[cfg(not(any(feature = "kdf-blake3", feature = "kdf-sha256")))]
    {
        compile_error!("enable one of the `kdf-blake3` or `kdf-sha256` features");
    }
}

/// Generates a fresh, uniformly random 32-byte subject key using the OS CSPRNG.
///
/// Unlike [`derive_global_key`], this draws from `getrandom` rather than hashing anything
/// reproducible: once a subject is forgotten and this key is discarded (see
/// [`crate::crypto::key_ring::KeyRing::forget`]), there is nothing left from which to reconstruct
/// it, satisfying spec.md §8 invariant 3 ("the subject's encryption key is unrecoverable").
#[must_use]
pub fn generate_subject_key() -> [u8; KEY_SIZE] {
    use rand::RngCore;
    let mut key = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut key);
    key
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_key_derivation_is_deterministic() {
        let a = derive_global_key(b"master");
        let b = derive_global_key(b"master");
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_get_different_global_keys() {
        let a = derive_global_key(b"master-1");
        let b = derive_global_key(b"master-2");
        assert_ne!(a, b);
    }

    #[test]
    fn subject_keys_are_not_reproducible_from_each_other() {
        let a = generate_subject_key();
        let b = generate_subject_key();
        assert_ne!(a, b, "two random draws colliding would indicate a broken RNG");
    }
}
