//! Shard/owner state (spec.md §4.5): table metadata, `OWNS`/`ACCESSES` descriptors, and per-subject
//! shard counts. Grounded on `k9db/shards/state.cc`'s `SharderState`.

use crate::error::{Error, Result};
use crate::schema::Schema;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// A table's name. Aliased rather than newtyped to match how freely the teacher and the original
/// pass table names around as plain strings.
pub type TableName = String;

/// The kind of data subject a shard belongs to (e.g. `"users"`). For a table that is the root of
/// its own shard (the common case — the `users` table owning the `users` shard), the shard kind
/// equals the table name.
pub type ShardKind = String;

/// A table's column name.
pub type ColumnName = String;

// -------------------------------------------------------------------------------------------------
//
/// Describes how a table relates to a shard kind, either as an owner (the row belongs to that
/// subject) or an accessor (that subject may read the row). Spec.md §3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShardDescriptor {
    /// This table's row carries the subject's id directly in `column`.
    Direct { shard_kind: ShardKind, column: usize },

    /// This table's row references `via_table` (through `via_column`), which in turn resolves
    /// (directly or transitively) to a subject of `shard_kind`.
    Transitive {
        shard_kind: ShardKind,
        via_table: TableName,
        via_column: usize,
    },

    /// The ownership relationship lives in a separate association table (`origin_table`, via
    /// `origin_column`); a row of this table may have zero or more owners/accessors of
    /// `shard_kind`.
    Variable {
        shard_kind: ShardKind,
        origin_table: TableName,
        origin_column: usize,
    },
}

impl ShardDescriptor {
    #[must_use]
    pub const fn shard_kind(&self) -> &ShardKind {
        match self {
            Self::Direct { shard_kind, .. }
            | Self::Transitive { shard_kind, .. }
            | Self::Variable { shard_kind, .. } => shard_kind,
        }
    }

    /// The column in *this* table's schema that a row's sharding decision is made from: the direct
    /// subject-id column, the foreign-key column pointing at `via_table`, or the local column of
    /// the association table that points back at this table's own primary key.
    #[must_use]
    pub const fn local_column(&self) -> usize {
        match self {
            Self::Direct { column, .. } => *column,
            Self::Transitive { via_column, .. } => *via_column,
            Self::Variable { origin_column, .. } => *origin_column,
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Table metadata: schema plus the owner/accessor descriptors that drive sharding, and the reverse
/// edges (`dependents`/`access_dependents`) other tables have registered against this one.
#[derive(Clone, Debug)]
pub struct TableMeta {
    pub name: TableName,
    pub schema: Arc<Schema>,
    pub owners: Vec<ShardDescriptor>,
    pub accessors: Vec<ShardDescriptor>,
    /// Tables that inherit ownership from this one: `(dependent_table, descriptor_on_dependent)`.
    pub dependents: Vec<(TableName, ShardDescriptor)>,
    pub access_dependents: Vec<(TableName, ShardDescriptor)>,
}

impl TableMeta {
    #[must_use]
    pub fn new(name: TableName, schema: Arc<Schema>) -> Self {
        Self {
            name,
            schema,
            owners: Vec::new(),
            accessors: Vec::new(),
            dependents: Vec::new(),
            access_dependents: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_owned(&self) -> bool {
        !self.owners.is_empty()
    }

    #[must_use]
    pub fn is_accessed(&self) -> bool {
        !self.owners.is_empty() || !self.accessors.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A shard kind's bookkeeping: the id column of its root table, and which tables own/accessor rows
/// under it.
#[derive(Clone, Debug)]
pub struct Shard {
    pub shard_kind: ShardKind,
    pub id_column: ColumnName,
    pub id_column_index: usize,
    pub owned_tables: BTreeSet<TableName>,
    pub accessor_tables: BTreeSet<TableName>,
    subject_count: u64,
}

impl Shard {
    #[must_use]
    pub const fn subject_count(&self) -> u64 {
        self.subject_count
    }
}

// -------------------------------------------------------------------------------------------------
//
struct Inner {
    tables: HashMap<TableName, TableMeta>,
    shards: HashMap<ShardKind, Shard>,
}

/// Shard/owner state (spec.md §4.5). Reads (schema/shard lookups on the hot statement-execution
/// path) take the shared lock; schema evolution (`add_table`, `add_table_owner`, `AddShardKind`)
/// takes the exclusive lock, matching §5's stated policy that such writes are infrequent and short.
#[derive(Default)]
pub struct ShardState {
    inner: RwLock<Inner>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            shards: HashMap::new(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl ShardState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new shard kind (e.g. when `CREATE TABLE users (id PK, ...)` establishes `users`
    /// as a shard root).
    pub fn add_shard_kind(&self, shard_kind: ShardKind, id_column: ColumnName, id_column_index: usize) {
        let mut inner = self.inner.write();
        inner.shards.entry(shard_kind.clone()).or_insert_with(|| Shard {
            shard_kind,
            id_column,
            id_column_index,
            owned_tables: BTreeSet::new(),
            accessor_tables: BTreeSet::new(),
            subject_count: 0,
        });
    }

    #[must_use]
    pub fn shard_kind_exists(&self, shard_kind: &str) -> bool {
        self.inner.read().shards.contains_key(shard_kind)
    }

    #[must_use]
    pub fn get_shard(&self, shard_kind: &str) -> Option<Shard> {
        self.inner.read().shards.get(shard_kind).cloned()
    }

    #[must_use]
    pub fn table_exists(&self, table_name: &str) -> bool {
        self.inner.read().tables.contains_key(table_name)
    }

    #[must_use]
    pub fn get_table(&self, table_name: &str) -> Option<TableMeta> {
        self.inner.read().tables.get(table_name).cloned()
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<TableName> {
        self.inner.read().tables.keys().cloned().collect()
    }

    /// Registers a new table, wiring its owner/accessor descriptors into the corresponding shards
    /// and registering back-edges (`dependents`/`access_dependents`) on the tables it resolves
    /// through. Grounded on `SharderState::AddTable`.
    ///
    /// # Errors
    /// [`Error::UnknownShardKind`] / [`Error::UnknownTable`] if a descriptor names a shard kind or
    /// referenced table that has not been registered yet.
    pub fn add_table(&self, table: TableMeta) -> Result<()> {
        let mut inner = self.inner.write();
        for descriptor in &table.owners {
            Self::wire_descriptor(&mut inner, &table.name, descriptor, true)?;
        }
        for descriptor in &table.accessors {
            Self::wire_descriptor(&mut inner, &table.name, descriptor, false)?;
        }
        inner.tables.insert(table.name.clone(), table);
        Ok(())
    }

    fn wire_descriptor(
        inner: &mut Inner,
        table_name: &TableName,
        descriptor: &ShardDescriptor,
        is_owner: bool,
    ) -> Result<()> {
        let shard = inner
            .shards
            .get_mut(descriptor.shard_kind())
            .ok_or_else(|| Error::UnknownShardKind(descriptor.shard_kind().clone()))?;
        if is_owner {
            shard.owned_tables.insert(table_name.clone());
        } else {
            shard.accessor_tables.insert(table_name.clone());
        }

        let parent_name = match descriptor {
            ShardDescriptor::Direct { shard_kind, .. } if shard_kind != table_name => {
                Some(shard_kind.clone())
            }
            ShardDescriptor::Direct { .. } => None,
            ShardDescriptor::Transitive { via_table, .. } => Some(via_table.clone()),
            ShardDescriptor::Variable { origin_table, .. } => Some(origin_table.clone()),
        };
        if let Some(parent_name) = parent_name {
            let parent = inner
                .tables
                .get_mut(&parent_name)
                .ok_or_else(|| Error::UnknownTable(parent_name.clone()))?;
            if is_owner {
                parent.dependents.push((table_name.clone(), descriptor.clone()));
            } else {
                parent.access_dependents.push((table_name.clone(), descriptor.clone()));
            }
        }
        Ok(())
    }

    /// Adds an `OWNS`/`ACCESSES` relationship to an already-existing table (a schema-evolution
    /// `ALTER`). Per spec.md §4.5, only legal via a `Variable` descriptor and only when the table
    /// has no existing dependents (we cannot retroactively re-shard a table already depended upon).
    ///
    /// # Errors
    /// [`Error::SchemaHasDependents`] if the table already has dependents; [`Error::SchemaError`]
    /// if any descriptor is not [`ShardDescriptor::Variable`].
    pub fn add_table_owner(&self, table_name: &str, owners: Vec<ShardDescriptor>) -> Result<()> {
        self.add_dependent_relationship(table_name, owners, true)
    }

    /// See [`Self::add_table_owner`]; registers accessors instead of owners.
    pub fn add_table_accessor(&self, table_name: &str, accessors: Vec<ShardDescriptor>) -> Result<()> {
        self.add_dependent_relationship(table_name, accessors, false)
    }

    fn add_dependent_relationship(
        &self,
        table_name: &str,
        descriptors: Vec<ShardDescriptor>,
        is_owner: bool,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        {
            let table = inner
                .tables
                .get(table_name)
                .ok_or_else(|| Error::UnknownTable(table_name.to_owned()))?;
            if !table.dependents.is_empty() || !table.access_dependents.is_empty() {
                return Err(Error::SchemaHasDependents {
                    table: table_name.to_owned(),
                    dependents: table.dependents.len() + table.access_dependents.len(),
                });
            }
        }
        for descriptor in &descriptors {
            if !matches!(descriptor, ShardDescriptor::Variable { .. }) {
                return Err(Error::SchemaError(format!(
                    "OWNS/ACCESSES on an existing table `{table_name}` requires a variable-ownership descriptor"
                )));
            }
            Self::wire_descriptor(&mut inner, &table_name.to_owned(), descriptor, is_owner)?;
        }
        let table = inner
            .tables
            .get_mut(table_name)
            .expect("checked to exist above");
        if is_owner {
            table.owners.extend(descriptors);
        } else {
            table.accessors.extend(descriptors);
        }
        Ok(())
    }

    /// Increments the live-subject count for `shard_kind` (a fresh subject's first insert).
    ///
    /// # Errors
    /// [`Error::UnknownShardKind`] if the kind is not registered.
    pub fn increment_subjects(&self, shard_kind: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let shard = inner
            .shards
            .get_mut(shard_kind)
            .ok_or_else(|| Error::UnknownShardKind(shard_kind.to_owned()))?;
        shard.subject_count += 1;
        Ok(())
    }

    /// Decrements the live-subject count for `shard_kind` (a `FORGET`).
    ///
    /// # Errors
    /// [`Error::UnknownShardKind`] if the kind is not registered.
    pub fn decrement_subjects(&self, shard_kind: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let shard = inner
            .shards
            .get_mut(shard_kind)
            .ok_or_else(|| Error::UnknownShardKind(shard_kind.to_owned()))?;
        shard.subject_count = shard.subject_count.saturating_sub(1);
        Ok(())
    }

    /// Debugging accessor: live-subject count per shard kind, mirroring `SharderState::NumShards`.
    #[must_use]
    pub fn num_shards(&self) -> Vec<(ShardKind, u64)> {
        self.inner
            .read()
            .shards
            .values()
            .map(|s| (s.shard_kind.clone(), s.subject_count))
            .collect()
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
