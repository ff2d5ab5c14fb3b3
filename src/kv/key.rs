//! The composite key format used to address a row in the sharded KV store, and the ordering it
//! induces.
//!
//! A composite key is `ENC(shard_name) || ENC(primary_key) || u16_le(len(ENC(shard_name)))`, where
//! `ENC(...)` is whatever [`crate::crypto::Crypto`] backend is configured. Because the trailing
//! length field lets us recover exactly where the shard-cipher ends, a prefix scan over a shard can
//! be bounded without decrypting anything. Two keys sharing the same `shard_cipher` (i.e. within one
//! shard's prefix scan) compare in `pk_cipher` bytewise order, since the shared prefix cancels out of
//! the comparison; across different shard ciphers of unequal length, plain lexicographic order over
//! the whole byte string is *not* the same as `(shard_cipher, pk_cipher)` tuple order, so callers
//! must not rely on cross-shard key ordering beyond "each shard's keys form one contiguous range".

use crate::error::{Error, Result};

/// Width, in bytes, of the trailing shard-cipher-length field.
const LEN_FIELD_SIZE: usize = 2;

// -------------------------------------------------------------------------------------------------
//
/// An already-encrypted composite key, ready to be written to or read from the KV store.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CompositeKey(Vec<u8>);

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl CompositeKey {
    /// Assembles a composite key from an already-encrypted shard-name cipher and an
    /// already-encrypted primary-key cipher.
    ///
    /// # Panics
    /// Panics if `shard_cipher` is longer than `u16::MAX` bytes, which would overflow the trailing
    /// length field; no legitimate shard name ever produces a ciphertext that large.
    #[must_use]
    pub fn assemble(shard_cipher: &[u8], pk_cipher: &[u8]) -> Self {
        let shard_len: u16 = shard_cipher
            .len()
            .try_into()
            .expect("shard cipher length exceeds u16::MAX");
        let mut bytes = Vec::with_capacity(shard_cipher.len() + pk_cipher.len() + LEN_FIELD_SIZE);
        bytes.extend_from_slice(shard_cipher);
        bytes.extend_from_slice(pk_cipher);
        bytes.extend_from_slice(&shard_len.to_le_bytes());
        Self(bytes)
    }

    /// Wraps an already-assembled composite key's raw bytes, as read back from the store.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Splits this key back into its shard-cipher and primary-key-cipher regions.
    ///
    /// # Errors
    /// Returns [`Error::CodecError`] if the key is too short to contain a valid length field, or if
    /// the encoded shard-cipher length exceeds the key's own size.
    pub fn split(&self) -> Result<(&[u8], &[u8])> {
        if self.0.len() < LEN_FIELD_SIZE {
            return Err(Error::CodecError(
                "composite key shorter than length field".into(),
            ));
        }
        let (rest, len_bytes) = self.0.split_at(self.0.len() - LEN_FIELD_SIZE);
        let shard_len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if shard_len > rest.len() {
            return Err(Error::CodecError(
                "composite key's shard-cipher length exceeds key size".into(),
            ));
        }
        Ok(rest.split_at(shard_len))
    }

    /// Returns just the shard-cipher prefix, the region a `PrefixExtractor` would return for a
    /// range/prefix scan bounded to one shard.
    ///
    /// # Errors
    /// See [`Self::split`].
    pub fn shard_prefix(&self) -> Result<&[u8]> {
        self.split().map(|(shard, _)| shard)
    }

    /// Returns the smallest composite key byte string strictly greater than every key sharing
    /// `shard_cipher` as its prefix, i.e. the exclusive upper bound of a prefix scan. Returns `None`
    /// if `shard_cipher` is all `0xFF` bytes (no successor exists at this byte width); callers
    /// should then scan to the end of the table instead.
    #[must_use]
    pub fn prefix_upper_bound(shard_cipher: &[u8]) -> Option<Vec<u8>> {
        let mut upper = shard_cipher.to_vec();
        for byte in upper.iter_mut().rev() {
            if *byte != 0xFF {
                *byte += 1;
                return Some(upper);
            }
            *byte = 0x00;
        }
        None
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_then_split_recovers_both_ciphers() {
        let key = CompositeKey::assemble(b"shard-u1", b"pk-42");
        let (shard, pk) = key.split().unwrap();
        assert_eq!(shard, b"shard-u1");
        assert_eq!(pk, b"pk-42");
    }

    #[test]
    fn equal_length_shard_ciphers_order_shard_then_pk_bytewise() {
        // Equal-length shard ciphers are the only case where whole-key lexicographic order matches
        // `(shard_cipher, pk_cipher)` tuple order; see the module doc comment.
        let a = CompositeKey::assemble(b"aaa", b"zzz");
        let b = CompositeKey::assemble(b"aab", b"aaa");
        assert!(a < b, "shard prefix difference should dominate ordering");

        let c = CompositeKey::assemble(b"aaa", b"aaa");
        let d = CompositeKey::assemble(b"aaa", b"aab");
        assert!(c < d, "equal shard prefix falls back to pk-cipher order");
    }

    #[test]
    fn unequal_length_shard_ciphers_do_not_follow_tuple_order() {
        // Both keys' shard ciphers start with the same byte; the second byte ("b" vs "a") decides
        // whole-key order, so a key under shard cipher "ba" sorts before one under "bb" here even
        // though nothing about `(shard_cipher, pk_cipher)` tuple order requires that in general for
        // differently-sized shard ciphers. A prefix scan still works: each shard's own keys (sharing
        // one exact shard-cipher prefix) remain contiguous regardless.
        let under_bb = CompositeKey::assemble(b"bb", b"a");
        let under_ba = CompositeKey::assemble(b"ba", b"zzzzz");
        assert!(under_ba < under_bb);
    }

    #[test]
    fn prefix_upper_bound_increments_last_non_ff_byte() {
        let upper = CompositeKey::prefix_upper_bound(b"ab").unwrap();
        assert_eq!(upper, b"ac");
    }

    #[test]
    fn prefix_upper_bound_none_for_all_ff() {
        assert_eq!(CompositeKey::prefix_upper_bound(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn too_short_key_errors_on_split() {
        let bogus = CompositeKey(vec![0x00]);
        assert!(bogus.split().is_err());
    }
}
