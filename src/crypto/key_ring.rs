//! Caches the per-subject encryption keys used to encrypt row values, keyed by shard name.
//!
//! Unlike the engine's single global key (see [`crate::crypto::kdf::derive_global_key`]), subject
//! keys are never derived from anything: each is drawn fresh from the OS CSPRNG the first time its
//! shard is written to, so that discarding it on `FORGET` makes the shard's rows genuinely
//! unrecoverable (spec.md §8 invariant 3) rather than merely evicted from a cache that the master
//! secret could regenerate.

use crate::crypto::{kdf, KEY_SIZE};
use parking_lot::RwLock;
use std::collections::HashMap;

// -------------------------------------------------------------------------------------------------
//
/// Holds one 32-byte key per shard that has ever been written to.
///
/// Reads (the common case: encrypting/decrypting an existing shard's rows) take the shared lock.
/// The first write to a new shard takes the exclusive lock once to insert the freshly generated
/// key; per §5's "conditional upgrade for write" policy this is a drop-read/acquire-write-recheck
/// rather than a true upgrade, since `parking_lot` has no atomic upgrade primitive.
///
/// This cache is an in-memory mirror of the persisted `"K/<shard_name>"` entries in the metadata
/// table (spec.md §6); [`crate::kv::Store`] is responsible for writing a newly generated key back
/// to that table before releasing it from here, and for loading all persisted keys into a fresh
/// `KeyRing` on startup via [`Self::load`].
#[derive(Default)]
pub struct KeyRing {
    keys: RwLock<HashMap<String, [u8; KEY_SIZE]>>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl KeyRing {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a `KeyRing` from keys already persisted to disk (process restart).
    #[must_use]
    pub fn load(keys: HashMap<String, [u8; KEY_SIZE]>) -> Self {
        Self {
            keys: RwLock::new(keys),
        }
    }

    /// Returns the key for `shard_name` if one has already been created.
    #[must_use]
    pub fn get(&self, shard_name: &str) -> Option<[u8; KEY_SIZE]> {
        self.keys.read().get(shard_name).copied()
    }

    /// Returns the key for `shard_name`, generating and caching a fresh random one if this is the
    /// first time this shard has been written to. Returns the key along with whether it was freshly
    /// generated, so the caller (the KV store) knows whether it must persist it.
    #[must_use]
    pub fn get_or_create(&self, shard_name: &str) -> ([u8; KEY_SIZE], bool) {
        if let Some(key) = self.get(shard_name) {
            return (key, false);
        }
        let mut keys = self.keys.write();
        // Re-check: another writer may have created the key while we waited for the write lock.
        if let Some(key) = keys.get(shard_name) {
            return (*key, false);
        }
        let key = kdf::generate_subject_key();
        keys.insert(shard_name.to_owned(), key);
        (key, true)
    }

    /// Drops the cached key for a forgotten subject's shard. Combined with the caller deleting the
    /// persisted `"K/<shard_name>"` metadata entry, no copy of this key exists anywhere once this
    /// returns.
    pub fn forget(&self, shard_name: &str) {
        self.keys.write().remove(shard_name);
    }

    #[must_use]
    pub fn contains(&self, shard_name: &str) -> bool {
        self.keys.read().contains_key(shard_name)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent_and_only_fresh_once() {
        let ring = KeyRing::new();
        let (a, a_fresh) = ring.get_or_create("shard-1");
        let (b, b_fresh) = ring.get_or_create("shard-1");
        assert_eq!(a, b);
        assert!(a_fresh);
        assert!(!b_fresh);
    }

    #[test]
    fn different_shards_get_different_random_keys() {
        let ring = KeyRing::new();
        let (a, _) = ring.get_or_create("shard-1");
        let (b, _) = ring.get_or_create("shard-2");
        assert_ne!(a, b);
    }

    #[test]
    fn forget_removes_the_cached_key() {
        let ring = KeyRing::new();
        ring.get_or_create("shard-1");
        assert!(ring.contains("shard-1"));
        ring.forget("shard-1");
        assert!(!ring.contains("shard-1"));
    }
}
