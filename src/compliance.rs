//! Compliance transaction (spec.md §4.10): tracks every row moved out of a subject's shard into
//! the `default` shard while ownership is unresolved, so a statement cannot commit while leaving an
//! orphan behind. Grounded on `k9db`'s `ComplianceTransaction` state machine (checkpoint stack of
//! pending-orphan sets, `Commit` scanning the default shard as the final gate).

use crate::error::{Error, Result};
use crate::kv::store::{Store, DEFAULT_SHARD};
use crate::shards::TableName;
use crate::value::Value;
use std::collections::HashSet;

/// One orphaned row: the table it lives in and its primary-key values.
type Orphan = (TableName, Vec<Value>);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Idle,
    Open,
    Committed,
    RolledBack,
}

// -------------------------------------------------------------------------------------------------
//
/// `Idle -> Open -> (Checkpointed)* -> Open -> Committed|RolledBack`. Checked transitions: calling a
/// method from the wrong state returns [`Error::ComplianceState`] rather than panicking, since
/// callers may legitimately race a rollback against a commit attempt (spec.md §4.10).
pub struct ComplianceTransaction {
    state: State,
    /// Orphans accumulated directly against the open transaction (outside any checkpoint).
    orphans: HashSet<Orphan>,
    /// Nested checkpoint scopes; `commit_checkpoint` merges the top into its parent (or into
    /// `orphans` if it was the outermost), `rollback_checkpoint` discards it.
    checkpoints: Vec<HashSet<Orphan>>,
}

impl Default for ComplianceTransaction {
    fn default() -> Self {
        Self {
            state: State::Idle,
            orphans: HashSet::new(),
            checkpoints: Vec::new(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl ComplianceTransaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Moves `Idle -> Open`.
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if already open or already finished.
    pub fn begin(&mut self) -> Result<()> {
        if self.state != State::Idle {
            return Err(Error::ComplianceState("begin() requires the transaction to be Idle"));
        }
        self.state = State::Open;
        Ok(())
    }

    /// Pushes a new checkpoint scope onto the stack. Orphans recorded after this call via
    /// [`Self::add_orphan`] land in this scope until it is committed or rolled back.
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open.
    pub fn add_checkpoint(&mut self) -> Result<()> {
        self.require_open()?;
        self.checkpoints.push(HashSet::new());
        Ok(())
    }

    /// Pops the top checkpoint and merges its orphans into the parent scope (or the transaction's
    /// own orphan set if it was the outermost checkpoint).
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open or has no checkpoint to pop.
    pub fn commit_checkpoint(&mut self) -> Result<()> {
        self.require_open()?;
        let top = self
            .checkpoints
            .pop()
            .ok_or(Error::ComplianceState("commit_checkpoint() with an empty checkpoint stack"))?;
        match self.checkpoints.last_mut() {
            Some(parent) => parent.extend(top),
            None => self.orphans.extend(top),
        }
        Ok(())
    }

    /// Pops and discards the top checkpoint's orphans entirely (the statements that produced them
    /// are being undone, so their orphan bookkeeping is undone too).
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open or has no checkpoint to pop.
    pub fn rollback_checkpoint(&mut self) -> Result<()> {
        self.require_open()?;
        self.checkpoints
            .pop()
            .ok_or(Error::ComplianceState("rollback_checkpoint() with an empty checkpoint stack"))?;
        Ok(())
    }

    /// Records a single orphaned `(table, pk)` against the innermost checkpoint scope.
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open, or if there is no checkpoint
    /// currently open (spec.md §4.10: `AddOrphan` is "only legal inside a checkpoint").
    pub fn add_orphan(&mut self, table: TableName, pk_values: Vec<Value>) -> Result<()> {
        self.require_open()?;
        let scope = self
            .checkpoints
            .last_mut()
            .ok_or(Error::ComplianceState("add_orphan() requires an open checkpoint"))?;
        scope.insert((table, pk_values));
        Ok(())
    }

    /// Records every `(table, pk)` pair yielded by `orphans` against the innermost checkpoint scope.
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open, or if there is no checkpoint
    /// currently open (spec.md §4.10: `AddOrphans` is "only legal inside a checkpoint").
    pub fn add_orphans(&mut self, orphans: impl IntoIterator<Item = (TableName, Vec<Value>)>) -> Result<()> {
        self.require_open()?;
        let scope = self
            .checkpoints
            .last_mut()
            .ok_or(Error::ComplianceState("add_orphans() requires an open checkpoint"))?;
        scope.extend(orphans);
        Ok(())
    }

    /// Scans every outstanding orphan against the live KV `default` shard. Commits (moves
    /// `Open -> Committed`) only if none are still present there; otherwise leaves the transaction
    /// `Open` (so the caller may retry after resolving ownership) and returns
    /// [`Error::ComplianceError`] naming every row still orphaned.
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open (or has unpopped checkpoints).
    /// [`Error::ComplianceError`] if any orphan is still present in the default shard.
    pub fn commit(&mut self, store: &Store) -> Result<()> {
        let _span = tracing::info_span!(crate::telemetry::SPAN_COMPLIANCE_TXN, orphans = self.orphans.len()).entered();
        self.require_open()?;
        if !self.checkpoints.is_empty() {
            return Err(Error::ComplianceState("commit() requires every checkpoint to be resolved first"));
        }

        let mut still_orphaned = Vec::new();
        for (table, pk_values) in &self.orphans {
            if store.exists(table, DEFAULT_SHARD, pk_values)? {
                still_orphaned.push((table.clone(), encode_pk(pk_values)));
            }
        }
        if !still_orphaned.is_empty() {
            return Err(Error::ComplianceError { orphans: still_orphaned });
        }

        self.state = State::Committed;
        self.orphans.clear();
        Ok(())
    }

    /// Discards every tracked orphan and moves `Open -> RolledBack` without touching the store: the
    /// statements that produced these orphans are assumed to have already been undone by the
    /// caller.
    ///
    /// # Errors
    /// [`Error::ComplianceState`] if the transaction is not open.
    pub fn rollback(&mut self) -> Result<()> {
        self.require_open()?;
        self.checkpoints.clear();
        self.orphans.clear();
        self.state = State::RolledBack;
        Ok(())
    }

    fn require_open(&self) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::ComplianceState("operation requires an open compliance transaction"));
        }
        Ok(())
    }
}

fn encode_pk(pk_values: &[Value]) -> Vec<u8> {
    let mut writer = crate::kv::sequence::SequenceWriter::new();
    for value in pk_values {
        writer.append_value(value);
    }
    writer.release()
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::CryptoBackend;
    use crate::record::Record;
    use crate::schema::Schema;
    use crate::value::ColumnType;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn schema() -> Arc<Schema> {
        Schema::shared(
            vec![("id".into(), ColumnType::UInt), ("name".into(), ColumnType::Text)],
            BTreeSet::from([0]),
        )
    }

    #[test]
    fn commit_succeeds_when_no_orphans_remain_in_default_shard() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut txn = ComplianceTransaction::new();
        txn.begin().unwrap();
        txn.add_checkpoint().unwrap();
        txn.add_orphan("users".into(), vec![Value::UInt(1)]).unwrap();
        txn.commit_checkpoint().unwrap();
        // The row never actually landed in the default shard (it was routed straight to its
        // subject's shard), so commit succeeds and the orphan bookkeeping clears.
        txn.commit(&store).unwrap();
        assert!(txn.orphans.is_empty());
    }

    #[test]
    fn commit_fails_while_an_orphan_is_still_in_the_default_shard() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        let record = Record::positive(schema(), vec![Value::UInt(1), Value::Text("alice".into())]);
        batch.put("users", DEFAULT_SHARD, &record).unwrap();
        batch.commit().unwrap();

        let mut txn = ComplianceTransaction::new();
        txn.begin().unwrap();
        txn.add_checkpoint().unwrap();
        txn.add_orphan("users".into(), vec![Value::UInt(1)]).unwrap();
        txn.commit_checkpoint().unwrap();
        let err = txn.commit(&store);
        match err {
            Err(Error::ComplianceError { orphans }) => assert_eq!(orphans.len(), 1),
            other => panic!("expected ComplianceError, got {other:?}"),
        }
        // A failed commit leaves the transaction open so the caller can resolve and retry.
        assert!(txn.is_open());
    }

    #[test]
    fn checkpoint_rollback_discards_only_its_own_orphans() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut txn = ComplianceTransaction::new();
        txn.begin().unwrap();
        txn.add_checkpoint().unwrap();
        txn.add_orphan("users".into(), vec![Value::UInt(1)]).unwrap();
        txn.commit_checkpoint().unwrap();

        txn.add_checkpoint().unwrap();
        txn.add_orphan("posts".into(), vec![Value::UInt(2)]).unwrap();
        txn.rollback_checkpoint().unwrap();

        txn.commit(&store).unwrap();
    }

    #[test]
    fn checkpoint_commit_merges_into_parent_scope() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut batch = store.begin_write().unwrap();
        let record = Record::positive(schema(), vec![Value::UInt(2), Value::Text("bob".into())]);
        batch.put("posts", DEFAULT_SHARD, &record).unwrap();
        batch.commit().unwrap();

        let mut txn = ComplianceTransaction::new();
        txn.begin().unwrap();
        txn.add_checkpoint().unwrap();
        txn.add_orphan("posts".into(), vec![Value::UInt(2)]).unwrap();
        txn.commit_checkpoint().unwrap();

        let err = txn.commit(&store);
        assert!(matches!(err, Err(Error::ComplianceError { .. })));
    }

    #[test]
    fn operations_outside_open_state_are_rejected() {
        let mut txn = ComplianceTransaction::new();
        assert!(matches!(
            txn.add_orphan("users".into(), vec![Value::UInt(1)]),
            Err(Error::ComplianceState(_))
        ));
        txn.begin().unwrap();
        txn.rollback().unwrap();
        assert!(matches!(txn.begin(), Err(Error::ComplianceState(_))));
    }

    #[test]
    fn commit_requires_every_checkpoint_resolved_first() {
        let store = Store::open_in_memory(CryptoBackend::Plaintext).unwrap();
        let mut txn = ComplianceTransaction::new();
        txn.begin().unwrap();
        txn.add_checkpoint().unwrap();
        assert!(matches!(txn.commit(&store), Err(Error::ComplianceState(_))));
    }
}
