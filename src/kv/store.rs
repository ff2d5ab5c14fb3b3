//! The sharded, encrypted key-value store (spec.md §4.3): one `redb` table per base table, keyed
//! by the composite key of §3, plus a reserved metadata table persisting the crypto manager's
//! secrets and per-subject keys.

use crate::crypto::{CryptoBackend, KeyRing, Manager};
use crate::error::{Error, Result};
use crate::kv::key::CompositeKey;
use crate::kv::sequence::{SequenceReader, SequenceWriter};
use crate::record::{Polarity, Record};
use crate::schema::Schema;
use crate::value::Value;
use std::sync::Arc;

/// The reserved shard that holds rows whose ownership has not yet been resolved.
pub const DEFAULT_SHARD: &str = "default";

/// Metadata table name. Stores the crypto manager's master secret and nonce, plus one
/// `"K/<shard_name>"` entry per persisted subject key (spec.md §6).
const META_TABLE: &str = "__meta__";
const META_MASTER_SECRET_KEY: &[u8] = b"master_secret";
const META_GLOBAL_NONCE_KEY: &[u8] = b"global_nonce";
const SUBJECT_KEY_PREFIX: &str = "K/";

// -------------------------------------------------------------------------------------------------
//
/// Binds a `redb::Database` to a [`Manager`], dynamically opening one table per base table by name.
pub struct Store {
    db: redb::Database,
    crypto: Manager,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Store {
    /// Opens (creating if absent) the `redb` database at `path`, loading or bootstrapping the
    /// crypto manager's secrets from the metadata table.
    ///
    /// # Errors
    /// Propagates `redb` open/transaction errors.
    pub fn open(path: impl AsRef<std::path::Path>, backend: CryptoBackend) -> Result<Self> {
        let db = redb::Database::create(path)?;
        let (master_secret, global_nonce, persisted_keys) = Self::load_or_bootstrap_secrets(&db)?;
        let global_nonce: [u8; crate::crypto::cipher::NONCE_SIZE] = global_nonce
            .try_into()
            .map_err(|_| Error::CodecError("persisted global nonce has the wrong width".into()))?;
        let crypto = Manager::new(backend, &master_secret, global_nonce, KeyRing::load(persisted_keys))?;
        Ok(Self { db, crypto })
    }

    /// Opens an in-memory database backed by nothing persisted on disk — used by tests and by the
    /// `Plaintext`/dev crypto backend.
    ///
    /// # Errors
    /// Propagates `redb` errors.
    pub fn open_in_memory(backend: CryptoBackend) -> Result<Self> {
        let db = redb::Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let (master_secret, global_nonce, persisted_keys) = Self::load_or_bootstrap_secrets(&db)?;
        let global_nonce: [u8; crate::crypto::cipher::NONCE_SIZE] = global_nonce
            .try_into()
            .map_err(|_| Error::CodecError("persisted global nonce has the wrong width".into()))?;
        let crypto = Manager::new(backend, &master_secret, global_nonce, KeyRing::load(persisted_keys))?;
        Ok(Self { db, crypto })
    }

    fn load_or_bootstrap_secrets(
        db: &redb::Database,
    ) -> Result<(Vec<u8>, Vec<u8>, std::collections::HashMap<String, [u8; crate::crypto::KEY_SIZE]>)> {
        use rand::RngCore;

        let txn = db.begin_write()?;
        let (master_secret, global_nonce) = {
            let mut table: redb::Table<&[u8], &[u8]> =
                txn.open_table(redb::TableDefinition::new(META_TABLE))?;
            let master_secret = match table.get(META_MASTER_SECRET_KEY)? {
                Some(v) => v.value().to_vec(),
                None => {
                    let mut secret = vec![0u8; crate::crypto::KEY_SIZE];
                    rand::rng().fill_bytes(&mut secret);
                    table.insert(META_MASTER_SECRET_KEY, secret.as_slice())?;
                    secret
                }
            };
            let global_nonce = match table.get(META_GLOBAL_NONCE_KEY)? {
                Some(v) => v.value().to_vec(),
                None => {
                    let mut nonce = vec![0u8; crate::crypto::cipher::NONCE_SIZE];
                    rand::rng().fill_bytes(&mut nonce);
                    table.insert(META_GLOBAL_NONCE_KEY, nonce.as_slice())?;
                    nonce
                }
            };
            (master_secret, global_nonce)
        };
        txn.commit()?;

        let read = db.begin_read()?;
        let mut persisted_keys = std::collections::HashMap::new();
        if let Ok(table) = read.open_table::<&[u8], &[u8]>(redb::TableDefinition::new(META_TABLE)) {
            for entry in table.iter()? {
                let (k, v) = entry?;
                if let Ok(key_str) = std::str::from_utf8(k.value()) {
                    if let Some(shard_name) = key_str.strip_prefix(SUBJECT_KEY_PREFIX) {
                        if let Ok(key_bytes) = <[u8; crate::crypto::KEY_SIZE]>::try_from(v.value()) {
                            persisted_keys.insert(shard_name.to_owned(), key_bytes);
                        }
                    }
                }
            }
        }
        Ok((master_secret, global_nonce, persisted_keys))
    }

    #[must_use]
    pub const fn crypto(&self) -> &Manager {
        &self.crypto
    }

    /// Starts a write batch: every `put`/`delete` within it is staged in a single
    /// `redb::WriteTransaction`, committed atomically when the caller calls
    /// [`WriteBatch::commit`] — the write-batch/staging requirement of spec.md §4.3.
    ///
    /// # Errors
    /// Propagates `redb` transaction-begin errors.
    pub fn begin_write(&self) -> Result<WriteBatch<'_>> {
        Ok(WriteBatch {
            store: self,
            txn: self.db.begin_write()?,
        })
    }

    /// Point lookups for `(shard, pk)` pairs, dropping any not found (spec.md §4.3 `get_direct`).
    ///
    /// # Errors
    /// Propagates `redb`/crypto/codec errors.
    pub fn get_direct(
        &self,
        table: &str,
        schema: &Arc<Schema>,
        lookups: &[(&str, &[Value])],
    ) -> Result<Vec<Record>> {
        let read = self.db.begin_read()?;
        let Ok(redb_table) = read.open_table::<&[u8], &[u8]>(redb::TableDefinition::new(table)) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(lookups.len());
        for (shard, pk_values) in lookups {
            let pk_bytes = encode_values(pk_values);
            let key = self.crypto.encrypt_key(shard, &pk_bytes)?;
            if let Some(raw) = redb_table.get(key.as_bytes())? {
                let plaintext = self.crypto.decrypt_value(shard, raw.value())?;
                out.push(decode_row(schema, &plaintext)?);
            }
        }
        Ok(out)
    }

    /// Presence check for a single `(shard, pk)` (spec.md §4.3 `exists`).
    ///
    /// # Errors
    /// Propagates `redb`/crypto errors.
    pub fn exists(&self, table: &str, shard: &str, pk_values: &[Value]) -> Result<bool> {
        let read = self.db.begin_read()?;
        let Ok(redb_table) = read.open_table::<&[u8], &[u8]>(redb::TableDefinition::new(table)) else {
            return Ok(false);
        };
        let pk_bytes = encode_values(pk_values);
        let key = self.crypto.encrypt_key(shard, &pk_bytes)?;
        Ok(redb_table.get(key.as_bytes())?.is_some())
    }

    /// Prefix scan over every row in `shard` (spec.md §4.3 `get_shard`).
    ///
    /// # Errors
    /// Propagates `redb`/crypto/codec errors.
    pub fn get_shard(&self, table: &str, schema: &Arc<Schema>, shard: &str) -> Result<Vec<Record>> {
        let read = self.db.begin_read()?;
        let Ok(redb_table) = read.open_table::<&[u8], &[u8]>(redb::TableDefinition::new(table)) else {
            return Ok(Vec::new());
        };
        let prefix = self.crypto.encrypt_seek(shard)?;
        let mut out = Vec::new();
        let range = match CompositeKey::prefix_upper_bound(&prefix) {
            Some(upper) => redb_table.range(prefix.as_slice()..upper.as_slice())?,
            None => redb_table.range(prefix.as_slice()..)?,
        };
        for entry in range {
            let (_, v) = entry?;
            let plaintext = self.crypto.decrypt_value(shard, v.value())?;
            out.push(decode_row(schema, &plaintext)?);
        }
        Ok(out)
    }

    /// Full table iteration (spec.md §4.3 `scan_all`), used for nested-view backfill.
    ///
    /// # Errors
    /// Propagates `redb`/crypto/codec errors. Rows belonging to shards whose key has been forgotten
    /// (a race with a concurrent `FORGET`) are skipped rather than erroring.
    pub fn scan_all(&self, table: &str, schema: &Arc<Schema>) -> Result<Vec<Record>> {
        let read = self.db.begin_read()?;
        let Ok(redb_table) = read.open_table::<&[u8], &[u8]>(redb::TableDefinition::new(table)) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for entry in redb_table.iter()? {
            let (k, v) = entry?;
            let key = CompositeKey::from_bytes(k.value());
            let (shard_name, _) = self.crypto.decrypt_key(&key)?;
            match self.crypto.decrypt_value(&shard_name, v.value()) {
                Ok(plaintext) => out.push(decode_row(schema, &plaintext)?),
                Err(Error::UnknownSubjectKey(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A single statement's atomic set of writes/deletes, staged in one `redb::WriteTransaction`.
pub struct WriteBatch<'s> {
    store: &'s Store,
    txn: redb::WriteTransaction,
}

impl WriteBatch<'_> {
    /// Encodes, encrypts, and writes `record` under `(table, shard)`. If this is the shard's first
    /// write, the freshly generated subject key is persisted to the metadata table within this same
    /// transaction.
    ///
    /// # Errors
    /// [`Error::ConstraintError`] if a row already exists at this `(shard, pk)` (primary-key
    /// conflict); propagates `redb`/crypto/codec errors otherwise.
    pub fn put(&mut self, table: &str, shard: &str, record: &Record) -> Result<()> {
        let pk_bytes = encode_values(&record.key_values());
        let key = self.store.crypto.encrypt_key(shard, &pk_bytes)?;
        let row_bytes = encode_values(record.values());
        let (cipher, fresh_key) = self.store.crypto.encrypt_value(shard, &row_bytes)?;

        if fresh_key {
            self.persist_subject_key(shard)?;
        }

        let mut redb_table: redb::Table<&[u8], &[u8]> =
            self.txn.open_table(redb::TableDefinition::new(table))?;
        if redb_table.get(key.as_bytes())?.is_some() {
            return Err(Error::ConstraintError { table: table.to_owned() });
        }
        redb_table.insert(key.as_bytes(), cipher.as_slice())?;
        Ok(())
    }

    /// Deletes the row at `(table, shard, pk)`, if present.
    ///
    /// # Errors
    /// Propagates `redb`/crypto errors.
    pub fn delete(&mut self, table: &str, shard: &str, pk_values: &[Value]) -> Result<()> {
        let pk_bytes = encode_values(pk_values);
        let key = self.store.crypto.encrypt_key(shard, &pk_bytes)?;
        let mut redb_table: redb::Table<&[u8], &[u8]> =
            self.txn.open_table(redb::TableDefinition::new(table))?;
        redb_table.remove(key.as_bytes())?;
        Ok(())
    }

    /// Persists a newly-minted subject key to the metadata table (`"K/<shard_name>"`).
    fn persist_subject_key(&mut self, shard: &str) -> Result<()> {
        let key = self
            .store
            .crypto
            .key_ring()
            .get(shard)
            .expect("caller just created this key");
        let mut meta: redb::Table<&[u8], &[u8]> =
            self.txn.open_table(redb::TableDefinition::new(META_TABLE))?;
        let meta_key = format!("{SUBJECT_KEY_PREFIX}{shard}");
        meta.insert(meta_key.as_bytes(), key.as_slice())?;
        Ok(())
    }

    /// Erases a forgotten subject's persisted key. Combined with [`Manager::forget_subject`]
    /// dropping it from the in-memory ring, no copy survives this transaction's commit.
    ///
    /// # Errors
    /// Propagates `redb` errors.
    pub fn forget_subject_key(&mut self, shard: &str) -> Result<()> {
        let mut meta: redb::Table<&[u8], &[u8]> =
            self.txn.open_table(redb::TableDefinition::new(META_TABLE))?;
        let meta_key = format!("{SUBJECT_KEY_PREFIX}{shard}");
        meta.remove(meta_key.as_bytes())?;
        Ok(())
    }

    /// Commits every staged write atomically.
    ///
    /// # Errors
    /// Propagates `redb::CommitError`.
    pub fn commit(self) -> Result<()> {
        Ok(self.txn.commit()?)
    }

    /// Discards every staged write.
    ///
    /// # Errors
    /// Propagates `redb` abort errors.
    pub fn abort(self) -> Result<()> {
        self.txn.abort()?;
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------
//
// Free functions: row <-> byte-sequence encoding shared by reads and writes.

fn encode_values(values: &[Value]) -> Vec<u8> {
    let mut writer = SequenceWriter::new();
    for value in values {
        writer.append_value(value);
    }
    writer.release()
}

fn decode_row(schema: &Arc<Schema>, bytes: &[u8]) -> Result<Record> {
    let reader = SequenceReader::parse(bytes);
    let mut values = Vec::with_capacity(schema.num_columns());
    for i in 0..schema.num_columns() {
        values.push(reader.value_at(i, schema.column_type(i))?);
    }
    Ok(Record::new(Arc::clone(schema), Polarity::Positive, values))
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ColumnType;
    use std::collections::BTreeSet;

    fn schema() -> Arc<Schema> {
        Schema::shared(
            vec![("id".into(), ColumnType::UInt), ("name".into(), ColumnType::Text)],
            BTreeSet::from([0]),
        )
    }

    fn record(id: u64, name: &str) -> Record {
        Record::positive(schema(), vec![Value::UInt(id), Value::Text(name.into())])
    }

    #[test]
    fn put_then_get_direct_round_trips() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        batch.put("users", "users#1", &record(1, "alice")).unwrap();
        batch.commit().unwrap();

        let rows = store
            .get_direct("users", &schema(), &[("users#1", &[Value::UInt(1)])])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].at(1).as_text(), "alice");
    }

    #[test]
    fn duplicate_primary_key_is_a_constraint_error() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        batch.put("users", "users#1", &record(1, "alice")).unwrap();
        let err = batch.put("users", "users#1", &record(1, "bob"));
        assert!(matches!(err, Err(Error::ConstraintError { .. })));
    }

    #[test]
    fn get_shard_returns_only_that_shards_rows() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        for i in 0..5u64 {
            batch.put("users", "users#1", &record(i, "a")).unwrap();
        }
        for i in 5..10u64 {
            batch.put("users", "users#2", &record(i, "b")).unwrap();
        }
        batch.commit().unwrap();

        assert_eq!(store.get_shard("users", &schema(), "users#1").unwrap().len(), 5);
        assert_eq!(store.get_shard("users", &schema(), "users#2").unwrap().len(), 5);
    }

    #[test]
    fn delete_removes_the_row() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        batch.put("users", "users#1", &record(1, "alice")).unwrap();
        batch.commit().unwrap();

        let mut batch = store.begin_write().unwrap();
        batch.delete("users", "users#1", &[Value::UInt(1)]).unwrap();
        batch.commit().unwrap();

        assert!(store.get_direct("users", &schema(), &[("users#1", &[Value::UInt(1)])]).unwrap().is_empty());
    }

    #[test]
    fn exists_reflects_presence() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        assert!(!store.exists("users", "users#1", &[Value::UInt(1)]).unwrap());
        let mut batch = store.begin_write().unwrap();
        batch.put("users", "users#1", &record(1, "alice")).unwrap();
        batch.commit().unwrap();
        assert!(store.exists("users", "users#1", &[Value::UInt(1)]).unwrap());
    }

    #[test]
    fn scan_all_sees_every_shard() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        batch.put("users", "users#1", &record(1, "a")).unwrap();
        batch.put("users", "users#2", &record(2, "b")).unwrap();
        batch.commit().unwrap();
        assert_eq!(store.scan_all("users", &schema()).unwrap().len(), 2);
    }
}
