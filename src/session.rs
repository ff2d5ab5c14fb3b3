//! Session / executor (spec.md §4.11): binds one connection to the KV store, [`ShardState`], and
//! the dataflow engine, and routes statements per spec.md §4.11 steps 1-8.
//!
//! SQL/GDPR-syntax parsing is the external collaborator spec.md §6 calls out ("Parse to AST
//! (external)") — this module picks up one step after that, at the already-resolved [`Statement`]
//! boundary, mirroring how `original_source/pelton/shards/sqlexecutor/executable.h` separates a
//! parsed executable plan from the planner that produced it.

use crate::compliance::ComplianceTransaction;
use crate::config::EngineConfig;
use crate::crypto::CryptoBackend;
use crate::dataflow::graph::{GraphPartition, NodeIndex};
use crate::dataflow::worker::{FlowId, QueryKind, WorkerPool};
use crate::dataflow::ops::MatView;
use crate::error::{Error, Result};
use crate::kv::store::{Store, DEFAULT_SHARD};
use crate::record::Record;
use crate::schema::Schema;
use crate::shards::{ColumnName, ShardDescriptor, ShardKind, ShardState, TableMeta, TableName};
use crate::util::RankedLock;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Formats the shard name a subject's rows are stored under: `"<shard_kind>#<id>"` (matches the
/// convention already exercised by `kv::store`'s own tests).
#[must_use]
pub fn shard_name(kind: &str, subject_id: &Value) -> String {
    format!("{kind}#{}", display_value(subject_id))
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Text(v) | Value::DateTime(v) => v.clone(),
        Value::Null => "null".to_owned(),
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Combines the `WHERE`-clause patterns a view lookup can recognize (spec.md §4.11): `key = v`,
/// `key IN (v1..vn)` (represented as multiple `equality_keys`), `key > v`, and conjunctions of
/// these.
#[derive(Clone, Debug, Default)]
pub struct LookupCondition {
    /// One or more exact key tuples to look up (`IN` becomes multiple entries, `=` becomes one).
    pub equality_keys: Vec<Vec<Value>>,
    /// Column index a `greater_record` bound applies to.
    pub greater_key: Option<usize>,
    pub greater_record: Option<Value>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl LookupCondition {
    #[must_use]
    pub fn equals(key: Vec<Value>) -> Self {
        Self {
            equality_keys: vec![key],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn greater_than(column: usize, literal: Value) -> Self {
        Self {
            greater_key: Some(column),
            greater_record: Some(literal),
            ..Self::default()
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// The result of a `SELECT`/GDPR `GET`: a schema and the rows matching it (spec.md §6).
#[derive(Clone, Debug)]
pub struct ResultSet {
    pub schema: Arc<Schema>,
    pub rows: Vec<Record>,
}

/// A cached, already-resolved plan for repeated execution with new arguments (spec.md §6's
/// `Prepare`/`ExecPrepared`, grounded on `executable.h`'s parsed-plan/bound-execution split).
pub struct PreparedStatement {
    view: String,
    template: LookupCondition,
}

// -------------------------------------------------------------------------------------------------
//
struct FlowBinding {
    flow: FlowId,
    input_node: NodeIndex,
    hash_column: usize,
}

struct ViewInfo {
    flow: FlowId,
    node: NodeIndex,
    schema: Arc<Schema>,
}

/// Every row this engine has placed into a shard, indexed by its own primary key, so a dependent
/// table's `Transitive`/`Variable` descriptor can resolve which shard(s) a referenced row belongs
/// to without an unbounded scan (spec.md §4.11's "follow variable ownership" requirement).
#[derive(Default)]
struct OwnerIndex {
    entries: HashMap<TableName, HashMap<Vec<Value>, Vec<(ShardKind, String)>>>,
}

impl OwnerIndex {
    fn record(&mut self, table: &str, pk: Vec<Value>, shards: &[(ShardKind, String)]) {
        let bucket = self.entries.entry(table.to_owned()).or_default().entry(pk).or_default();
        for entry in shards {
            if !bucket.contains(entry) {
                bucket.push(entry.clone());
            }
        }
    }

    fn lookup(&self, table: &str, pk: &[Value]) -> Vec<(ShardKind, String)> {
        self.entries
            .get(table)
            .and_then(|pks| pks.get(pk))
            .cloned()
            .unwrap_or_default()
    }

    fn lookup_for_kind(&self, table: &str, pk: &[Value], kind: &str) -> Vec<String> {
        self.lookup(table, pk)
            .into_iter()
            .filter(|(k, _)| k == kind)
            .map(|(_, name)| name)
            .collect()
    }
}

/// Maps `(table, column)` -> `value -> [owning row's primary key]`, the reverse-FK index a
/// `Variable` descriptor's `origin_table`/`origin_column` needs to find which association rows
/// reference a given dependent row (spec.md §4.11).
#[derive(Default)]
struct ColumnIndex {
    entries: HashMap<(TableName, usize), HashMap<Value, Vec<Vec<Value>>>>,
}

impl ColumnIndex {
    fn record(&mut self, table: &str, column: usize, value: Value, pk: Vec<Value>) {
        let bucket = self
            .entries
            .entry((table.to_owned(), column))
            .or_default()
            .entry(value)
            .or_default();
        if !bucket.contains(&pk) {
            bucket.push(pk);
        }
    }

    fn lookup(&self, table: &str, column: usize, value: &Value) -> Vec<Vec<Value>> {
        self.entries
            .get(&(table.to_owned(), column))
            .and_then(|values| values.get(value))
            .cloned()
            .unwrap_or_default()
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Binds one connection to the KV store, shard/owner state, and dataflow engine (spec.md §4.11).
///
/// The four internal maps below are [`RankedLock`]s rather than bare `RwLock`s: `table_flows` (0)
/// < `views` (1) < `owner_index` (2) < `column_index` (3). No current code path holds more than
/// one at a time, but any future path that needs two must acquire them low-rank-first via
/// [`crate::util::lock_order`] to stay deadlock-free against every other path.
pub struct Session {
    store: Store,
    shards: ShardState,
    pool: Option<WorkerPool>,
    consistent: bool,
    table_flows: RankedLock<HashMap<TableName, Vec<FlowBinding>>>,
    views: RankedLock<HashMap<String, ViewInfo>>,
    owner_index: RankedLock<OwnerIndex>,
    column_index: RankedLock<ColumnIndex>,
    next_flow: AtomicU32,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Session {
    /// `Open(db_name) -> Connection` (spec.md §6).
    ///
    /// # Errors
    /// Propagates [`EngineConfig::validate`]'s errors, or storage errors opening the `redb` file at
    /// `config.db_path()`.
    pub fn open(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = Store::open(config.db_path(), config.crypto_backend.into())?;
        Ok(Self::from_parts(store, config.workers, config.consistent))
    }

    /// Opens an in-memory session, used by tests and by [`CryptoBackend::Plaintext`] development
    /// workflows.
    ///
    /// # Errors
    /// Propagates storage errors.
    pub fn open_in_memory(backend: CryptoBackend, workers: usize, consistent: bool) -> Result<Self> {
        let store = Store::open_in_memory(backend)?;
        Ok(Self::from_parts(store, workers, consistent))
    }

    fn from_parts(store: Store, workers: usize, consistent: bool) -> Self {
        Self {
            store,
            shards: ShardState::new(),
            pool: Some(WorkerPool::new(workers.max(1), 256)),
            consistent,
            table_flows: RankedLock::new(0, HashMap::new()),
            views: RankedLock::new(1, HashMap::new()),
            owner_index: RankedLock::new(2, OwnerIndex::default()),
            column_index: RankedLock::new(3, ColumnIndex::default()),
            next_flow: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub const fn shards(&self) -> &ShardState {
        &self.shards
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    // --- DDL (spec.md §4.11 step 2) ----------------------------------------------------------

    /// `CREATE TABLE`. If `shard_root` is given, this table is also registered as a new shard
    /// kind (its own rows are addressed by `id_column`).
    ///
    /// # Errors
    /// Propagates [`ShardState::add_table`] errors (unknown shard kind/table referenced by an
    /// owner/accessor descriptor).
    pub fn create_table(&self, mut meta: TableMeta, shard_root: Option<(ShardKind, ColumnName, usize)>) -> Result<bool> {
        if let Some((kind, id_column, id_column_index)) = shard_root {
            self.shards.add_shard_kind(kind.clone(), id_column, id_column_index);
            // A table that roots its own shard owns itself directly: inserting a row creates the
            // subject's shard (spec.md §4.11 example 1).
            meta.owners.push(ShardDescriptor::Direct {
                shard_kind: kind,
                column: id_column_index,
            });
        }
        self.shards.add_table(meta)?;
        Ok(true)
    }

    /// `ALTER TABLE ... OWNS`. Only legal via `Variable` descriptors on a table with no existing
    /// dependents (spec.md §4.11 step 2 / §4.5).
    ///
    /// # Errors
    /// See [`ShardState::add_table_owner`].
    pub fn add_table_owner(&self, table: &str, owners: Vec<ShardDescriptor>) -> Result<bool> {
        self.shards.add_table_owner(table, owners)?;
        Ok(true)
    }

    /// `ALTER TABLE ... ACCESSES`. See [`Self::add_table_owner`].
    ///
    /// # Errors
    /// See [`ShardState::add_table_accessor`].
    pub fn add_table_accessor(&self, table: &str, accessors: Vec<ShardDescriptor>) -> Result<bool> {
        self.shards.add_table_accessor(table, accessors)?;
        Ok(true)
    }

    /// Allocates a fresh [`FlowId`], installs `partitions` into the worker pool, and registers the
    /// `view_node` (a terminal [`MatView`]) under `name` for later lookup. `bindings` names which
    /// base tables feed this flow's input nodes, and at which column they must be hash-partitioned.
    ///
    /// # Panics
    /// Panics if no worker pool is installed (the session has already been shut down).
    pub fn register_view(
        &self,
        name: impl Into<String>,
        partitions: Vec<GraphPartition>,
        view_node: NodeIndex,
        view_schema: Arc<Schema>,
        bindings: Vec<(TableName, NodeIndex, usize)>,
    ) {
        let flow = self.next_flow.fetch_add(1, Ordering::Relaxed);
        self.pool
            .as_ref()
            .expect("session has already been shut down")
            .install(flow, partitions);

        let mut table_flows = self.table_flows.write();
        for (table, input_node, hash_column) in bindings {
            table_flows.entry(table).or_default().push(FlowBinding {
                flow,
                input_node,
                hash_column,
            });
        }
        self.views.write().insert(
            name.into(),
            ViewInfo {
                flow,
                node: view_node,
                schema: view_schema,
            },
        );
    }

    // --- DML (spec.md §4.11 steps 3-5) -------------------------------------------------------

    /// `INSERT`. Computes the owning shard(s) from `table`'s owner descriptors, writes the row
    /// under each (or `default` if none resolve yet), propagates variable ownership to any
    /// dependent table, pushes a positive delta to every dataflow flow bound to this table, and
    /// waits for the resulting [`crate::dataflow::future::Future`] in consistent mode.
    ///
    /// If `txn` is given, a row landing in the `default` shard is recorded as an orphan against it
    /// rather than silently persisting unresolved (spec.md §4.10).
    ///
    /// # Errors
    /// [`Error::UnknownTable`] if `table` is not registered; [`Error::ConstraintError`] on a
    /// primary-key collision; propagates storage/crypto errors.
    pub fn insert(&self, table: &str, values: Vec<Value>, mut txn: Option<&mut ComplianceTransaction>) -> Result<u64> {
        let _span = tracing::info_span!(crate::telemetry::SPAN_KV_STATEMENT, op = "insert", table).entered();
        let meta = self.shards.get_table(table).ok_or_else(|| Error::UnknownTable(table.to_owned()))?;
        let record = Record::positive(Arc::clone(&meta.schema), values);
        let pk = record.key_values();

        let mut resolved: Vec<(ShardKind, String)> = Vec::new();
        for descriptor in &meta.owners {
            resolved.extend(self.resolve_owner_shards(descriptor, &record)?);
        }
        let already_tracked = !self.owner_index.read().lookup(table, &pk).is_empty();

        let mut batch = self.store.begin_write()?;
        if resolved.is_empty() {
            batch.put(table, DEFAULT_SHARD, &record)?;
            if let Some(txn) = txn.as_deref_mut() {
                // `add_orphan` is only legal inside a checkpoint (spec.md §4.10); this statement's
                // own orphan bookkeeping is exactly one checkpoint scope wide.
                txn.add_checkpoint()?;
                txn.add_orphan(table.to_owned(), pk.clone())?;
                txn.commit_checkpoint()?;
            }
        } else {
            for (_, shard) in &resolved {
                batch.put(table, shard, &record)?;
            }
        }
        batch.commit()?;

        if !resolved.is_empty() {
            if !already_tracked {
                for (kind, _) in &resolved {
                    if meta.name == *kind {
                        self.shards.increment_subjects(kind)?;
                    }
                }
            }
            self.owner_index.write().record(table, pk.clone(), &resolved);
        }

        // Index every column of this row so later `Variable`/`Transitive` lookups naming this
        // table as `via_table`/`origin_table` can find it.
        {
            let mut column_index = self.column_index.write();
            for (index, value) in record.values().iter().enumerate() {
                if !value.is_null() {
                    column_index.record(table, index, value.clone(), pk.clone());
                }
            }
        }

        self.propagate_variable_ownership(&meta, &record, &resolved)?;
        self.push_delta(table, record)?;
        Ok(1)
    }

    /// Resolves which shard(s) a single owner descriptor contributes for `record`.
    fn resolve_owner_shards(&self, descriptor: &ShardDescriptor, record: &Record) -> Result<Vec<(ShardKind, String)>> {
        match descriptor {
            ShardDescriptor::Direct { shard_kind, column } => {
                let id = record.at(*column);
                Ok(vec![(shard_kind.clone(), shard_name(shard_kind, id))])
            }
            ShardDescriptor::Transitive {
                shard_kind,
                via_table,
                via_column,
            } => {
                let fk = record.at(*via_column).clone();
                let names = self.owner_index.read().lookup_for_kind(via_table, &[fk], shard_kind);
                Ok(names.into_iter().map(|name| (shard_kind.clone(), name)).collect())
            }
            ShardDescriptor::Variable {
                shard_kind,
                origin_table,
                origin_column,
            } => {
                // This descriptor lives on the dependent table directly (e.g. `posts OWNS users.id
                // VARIABLE OVER shares`): `origin_table`/`origin_column` name the association
                // table and the column of *this* row it keys off of. At insert time of the
                // dependent row itself there is usually no association yet; ownership normally
                // arrives later via `propagate_variable_ownership` when the association row is
                // inserted. Still resolve eagerly in case the association already exists.
                let fk = record.at(*origin_column).clone();
                let associations = self.column_index.read().lookup(origin_table, *origin_column, &fk);
                let mut names = Vec::new();
                for association_pk in associations {
                    names.extend(self.owner_index.read().lookup_for_kind(origin_table, &association_pk, shard_kind));
                }
                Ok(names.into_iter().map(|name| (shard_kind.clone(), name)).collect())
            }
        }
    }

    /// After inserting `record` into `table` (which just resolved to `resolved`), checks whether
    /// any other table declared a `Variable` ownership naming `table` as its `origin_table`: if so,
    /// the referenced dependent row must be copied into every newly resolved shard (spec.md §4.11
    /// example 2: inserting into the association table makes the referenced row reachable from the
    /// new owner too).
    fn propagate_variable_ownership(
        &self,
        table_meta: &TableMeta,
        record: &Record,
        resolved: &[(ShardKind, String)],
    ) -> Result<()> {
        if resolved.is_empty() {
            return Ok(());
        }
        for (dependent_name, descriptor) in &table_meta.dependents {
            let ShardDescriptor::Variable {
                shard_kind,
                origin_column,
                ..
            } = descriptor
            else {
                continue;
            };
            let dependent_pk = vec![record.at(*origin_column).clone()];
            let Some(dependent_meta) = self.shards.get_table(dependent_name) else {
                continue;
            };
            let existing_shards = self.owner_index.read().lookup(dependent_name, &dependent_pk);
            let Some((_, source_shard)) = existing_shards.first().cloned() else {
                continue;
            };
            let rows = self
                .store
                .get_direct(dependent_name, &dependent_meta.schema, &[(source_shard.as_str(), dependent_pk.as_slice())])?;
            let Some(dependent_row) = rows.into_iter().next() else {
                continue;
            };

            let mut newly_owned = Vec::new();
            for (kind, shard) in resolved {
                if kind != shard_kind {
                    continue;
                }
                if existing_shards.iter().any(|(_, s)| s == shard) {
                    continue;
                }
                newly_owned.push(shard.clone());
            }
            if newly_owned.is_empty() {
                continue;
            }

            let mut batch = self.store.begin_write()?;
            for shard in &newly_owned {
                batch.put(dependent_name, shard, &dependent_row)?;
            }
            batch.commit()?;

            let mut index = self.owner_index.write();
            let additions: Vec<(ShardKind, String)> = newly_owned.into_iter().map(|s| (shard_kind.clone(), s)).collect();
            index.record(dependent_name, dependent_pk, &additions);
            drop(index);

            self.push_delta(dependent_name, dependent_row)?;
        }
        Ok(())
    }

    fn push_delta(&self, table: &str, record: Record) -> Result<()> {
        let Some(pool) = self.pool.as_ref() else {
            return Ok(());
        };
        let bindings = self.table_flows.read();
        let Some(bindings) = bindings.get(table) else {
            return Ok(());
        };
        for binding in bindings {
            let future = pool.submit(binding.flow, binding.input_node, vec![record.clone()], binding.hash_column, self.consistent);
            let _span = tracing::info_span!(crate::telemetry::SPAN_DATAFLOW_WAIT, flow = binding.flow).entered();
            future.wait();
        }
        Ok(())
    }

    /// `DELETE`. Removes the row at `(table, shard, pk)`, emitting a negative delta to dataflow
    /// before removing it from the KV store (spec.md §4.11 step 4).
    ///
    /// # Errors
    /// [`Error::UnknownTable`] if `table` is not registered; propagates storage errors.
    pub fn delete(&self, table: &str, shard: &str, pk_values: &[Value]) -> Result<u64> {
        let _span = tracing::info_span!(crate::telemetry::SPAN_KV_STATEMENT, op = "delete", table).entered();
        let meta = self.shards.get_table(table).ok_or_else(|| Error::UnknownTable(table.to_owned()))?;
        let rows = self.store.get_direct(table, &meta.schema, &[(shard, pk_values)])?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(0);
        };

        self.push_delta(table, row.negated())?;

        let mut batch = self.store.begin_write()?;
        batch.delete(table, shard, pk_values)?;
        batch.commit()?;
        Ok(1)
    }

    /// `UPDATE`: delete then insert (spec.md §4.11 step 5).
    ///
    /// # Errors
    /// See [`Self::delete`] and [`Self::insert`].
    pub fn update(&self, table: &str, shard: &str, pk_values: &[Value], new_values: Vec<Value>) -> Result<u64> {
        self.delete(table, shard, pk_values)?;
        self.insert(table, new_values, None)
    }

    // --- SELECT (spec.md §4.11 step 6) -------------------------------------------------------

    /// `SELECT` against a base table: shard-scoped lookup if `shard` is known, else a full scan.
    ///
    /// # Errors
    /// [`Error::UnknownTable`] if `table` is not registered; propagates storage errors.
    pub fn select_table(&self, table: &str, shard: Option<&str>) -> Result<ResultSet> {
        let meta = self.shards.get_table(table).ok_or_else(|| Error::UnknownTable(table.to_owned()))?;
        let rows = match shard {
            Some(shard) => self.store.get_shard(table, &meta.schema, shard)?,
            None => self.store.scan_all(table, &meta.schema)?,
        };
        Ok(ResultSet {
            schema: meta.schema,
            rows,
        })
    }

    /// `SELECT` against a materialized view, applying `condition` (spec.md §4.11's
    /// `LookupCondition`).
    ///
    /// # Errors
    /// [`Error::UnknownTable`] if `view` has not been registered via [`Self::register_view`].
    pub fn select_view(&self, view: &str, condition: &LookupCondition) -> Result<ResultSet> {
        let views = self.views.read();
        let info = views.get(view).ok_or_else(|| Error::UnknownTable(view.to_owned()))?;
        let (flow, node, schema) = (info.flow, info.node, Arc::clone(&info.schema));
        drop(views);

        let pool = self.pool.as_ref().expect("session has already been shut down");
        let mut rows = if !condition.equality_keys.is_empty() {
            let mut matched = Vec::new();
            for key in &condition.equality_keys {
                matched.extend(pool.query(flow, node, QueryKind::Lookup(key.clone())));
            }
            matched
        } else if let (Some(column), Some(literal)) = (condition.greater_key, condition.greater_record.clone()) {
            pool.query(flow, node, QueryKind::GreaterThan(column, literal))
        } else {
            pool.query(flow, node, QueryKind::ScanAll)
        };
        rows = MatView::paginate(rows, condition.offset, condition.limit);
        Ok(ResultSet { schema, rows })
    }

    /// Caches a view lookup's shape for repeated execution (spec.md §6 `Prepare`).
    #[must_use]
    pub fn prepare_select(&self, view: impl Into<String>, template: LookupCondition) -> PreparedStatement {
        PreparedStatement {
            view: view.into(),
            template,
        }
    }

    /// `ExecPrepared`: substitutes `args` for the prepared template's equality keys (the common
    /// `key = ?` / `key IN (?...)` case) and re-runs the lookup.
    ///
    /// # Errors
    /// See [`Self::select_view`].
    pub fn exec_prepared(&self, stmt: &PreparedStatement, args: Vec<Vec<Value>>) -> Result<ResultSet> {
        let mut condition = stmt.template.clone();
        if !args.is_empty() {
            condition.equality_keys = args;
        }
        self.select_view(&stmt.view, &condition)
    }

    // --- GDPR (spec.md §4.11 steps 7-8) ------------------------------------------------------

    /// `GDPR GET <kind> <id>`: every row reachable from this subject, across every table that owns
    /// or accesses `kind` (spec.md §4.11 step 7). Variable ownership is already materialized by
    /// physical row copies at insert time (see [`Self::propagate_variable_ownership`]), so a plain
    /// per-table shard scan is sufficient here — no join against association tables is needed at
    /// read time.
    ///
    /// # Errors
    /// [`Error::UnknownShardKind`] if `kind` is not registered; propagates storage errors.
    pub fn gdpr_get(&self, kind: &str, subject_id: &Value) -> Result<HashMap<TableName, Vec<Record>>> {
        let shard = self.shards.get_shard(kind).ok_or_else(|| Error::UnknownShardKind(kind.to_owned()))?;
        let name = shard_name(kind, subject_id);
        let mut out = HashMap::new();
        for table in shard.owned_tables.iter().chain(shard.accessor_tables.iter()) {
            let Some(meta) = self.shards.get_table(table) else {
                continue;
            };
            let rows = self.store.get_shard(table, &meta.schema, &name)?;
            if !rows.is_empty() {
                out.insert(table.clone(), rows);
            }
        }
        Ok(out)
    }

    /// `GDPR FORGET <kind> <id>`: deletes every row reachable from this subject, emits a negative
    /// delta for each into dataflow, invalidates the subject's encryption key, and decrements the
    /// shard's live-subject count (spec.md §4.11 step 8).
    ///
    /// # Errors
    /// [`Error::UnknownShardKind`] if `kind` is not registered; propagates storage errors.
    pub fn gdpr_forget(&self, kind: &str, subject_id: &Value) -> Result<u64> {
        let shard = self.shards.get_shard(kind).ok_or_else(|| Error::UnknownShardKind(kind.to_owned()))?;
        let name = shard_name(kind, subject_id);
        let mut forgotten = 0u64;

        let mut batch = self.store.begin_write()?;
        for table in shard.owned_tables.iter().chain(shard.accessor_tables.iter()) {
            let Some(meta) = self.shards.get_table(table) else {
                continue;
            };
            let rows = self.store.get_shard(table, &meta.schema, &name)?;
            for row in rows {
                self.push_delta(table, row.negated())?;
                batch.delete(table, &name, &row.key_values())?;
                forgotten += 1;
            }
        }
        batch.forget_subject_key(&name)?;
        batch.commit()?;

        self.store.crypto().forget_subject(&name);
        self.shards.decrement_subjects(kind)?;
        Ok(forgotten)
    }

    /// `Shutdown()`: joins every worker thread. Further statements on this session fail.
    pub fn shutdown(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
