//! Dataflow operators (spec.md §4.6): the nine record-processing stages a [`crate::dataflow::graph::GraphPartition`]
//! wires into a DAG. Grounded on `original_source/dataflow/ops/*.{h,cc}`, with the virtual-dispatch
//! `Operator` base class replaced by a tagged enum per spec.md §9's REDESIGN note — one `process`
//! method, matched once per call instead of a vtable indirection per node.
//!
//! Every operator shares the contract from spec.md §4.6: `process(source_partition, input_deltas)
//! -> output_deltas`, preserving polarity and pure with respect to inputs plus private state.

use crate::record::{Polarity, Record};
use crate::schema::Schema;
use std::collections::HashMap;
use std::sync::Arc;

use crate::dataflow::graph::NodeIndex;

// -------------------------------------------------------------------------------------------------
//
/// One base-table input. Grounded on `dataflow/ops/input.{h,cc}`: swaps input to output unchanged,
/// tagging every node with which base table it represents so the session knows where to route
/// writes.
#[derive(Clone, Debug)]
pub struct Input {
    pub table: String,
}

impl Input {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Passes its input through unchanged. Grounded on `dataflow/ops/identity.{h,cc}`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Identity {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
    }
}

// -------------------------------------------------------------------------------------------------
//
/// A single conjunctive clause's comparison operator, mirroring `FilterOperator::Ops` in
/// `dataflow/ops/filter.h`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Comparison {
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
}

impl Comparison {
    fn matches(self, ordering: Option<std::cmp::Ordering>) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match (self, ordering) {
            (Self::Lt, Some(Less)) => true,
            (Self::LtEq, Some(Less | Equal)) => true,
            (Self::Gt, Some(Greater)) => true,
            (Self::GtEq, Some(Greater | Equal)) => true,
            (Self::Eq, Some(Equal)) => true,
            (Self::NotEq, Some(Less | Greater)) => true,
            (Self::NotEq, None) => true,
            _ => false,
        }
    }
}

/// One `(column, comparison, literal)` clause. `Filter` conjoins a list of these.
#[derive(Clone, Debug)]
pub struct FilterClause {
    pub column: usize,
    pub comparison: Comparison,
    pub literal: crate::value::Value,
}

/// Emits only rows satisfying every clause (spec.md §4.6: "parameterized by a list of (column,
/// comparison, literal); emits only rows satisfying all clauses (conjunctive)").
#[derive(Clone, Debug)]
pub struct Filter {
    pub clauses: Vec<FilterClause>,
}

impl Filter {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .filter(|record| {
                self.clauses.iter().all(|clause| {
                    let value = record.at(clause.column);
                    clause
                        .comparison
                        .matches(value.partial_cmp(&clause.literal))
                })
            })
            .collect()
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Emits a record over a subschema composed of chosen columns. Grounded on
/// `dataflow/ops/project.{h,cc}`.
#[derive(Clone, Debug)]
pub struct Project {
    pub indices: Vec<usize>,
    pub output_schema: Arc<Schema>,
}

impl Project {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
            .into_iter()
            .map(|record| record.project(Arc::clone(&self.output_schema), &self.indices))
            .collect()
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Passes every parent's output downstream unchanged (spec.md §4.6). Stateless: the graph wiring
/// already fans every parent's output into this node, so `process` has nothing to deduplicate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Union;

impl Union {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Which of the two parents (see spec.md §4.6) a batch of records arrived from. An `EquiJoin` node
/// has exactly two parents; [`crate::dataflow::graph::GraphPartition::process`] tells it which one
/// a given delta came from via the `source` argument to `process_and_forward`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum JoinSide {
    Left,
    Right,
}

/// Equijoin over `left_key`/`right_key` (one column per side). Grounded on
/// `dataflow/ops/equijoin.{h,cc}`: maintains a hash table per side keyed by the join value; state
/// grows monotonically per key under positive-only workloads, matching spec.md §4.6.
#[derive(Clone, Debug)]
pub struct EquiJoin {
    pub left_parent: NodeIndex,
    pub right_parent: NodeIndex,
    pub left_key: usize,
    pub right_key: usize,
    pub output_schema: Arc<Schema>,
    left_state: HashMap<crate::value::Value, Vec<Record>>,
    right_state: HashMap<crate::value::Value, Vec<Record>>,
}

impl EquiJoin {
    #[must_use]
    pub fn new(
        left_parent: NodeIndex,
        right_parent: NodeIndex,
        left_key: usize,
        right_key: usize,
        output_schema: Arc<Schema>,
    ) -> Self {
        Self {
            left_parent,
            right_parent,
            left_key,
            right_key,
            output_schema,
            left_state: HashMap::new(),
            right_state: HashMap::new(),
        }
    }

    fn side_of(&self, source: Option<NodeIndex>) -> JoinSide {
        match source {
            Some(index) if index == self.right_parent => JoinSide::Right,
            _ => JoinSide::Left,
        }
    }

    fn process(&mut self, source: Option<NodeIndex>, records: Vec<Record>) -> Vec<Record> {
        let side = self.side_of(source);
        let mut output = Vec::new();
        for record in records {
            match side {
                JoinSide::Left => {
                    let key = record.at(self.left_key).clone();
                    let matches = self.right_state.get(&key).cloned().unwrap_or_default();
                    for right in &matches {
                        output.push(self.emit(&record, right));
                    }
                    if record.is_positive() {
                        self.left_state.entry(key).or_default().push(record);
                    } else {
                        Self::retract(&mut self.left_state, &key, &record);
                    }
                }
                JoinSide::Right => {
                    let key = record.at(self.right_key).clone();
                    let matches = self.left_state.get(&key).cloned().unwrap_or_default();
                    for left in &matches {
                        output.push(self.emit(left, &record));
                    }
                    if record.is_positive() {
                        self.right_state.entry(key).or_default().push(record);
                    } else {
                        Self::retract(&mut self.right_state, &key, &record);
                    }
                }
            }
        }
        output
    }

    fn emit(&self, left: &Record, right: &Record) -> Record {
        left.join_with(right, Arc::clone(&self.output_schema), self.right_key)
    }

    /// Removes one occurrence matching `record`'s values from `key`'s bucket (a negative delta
    /// retracting a row previously seen on this side).
    fn retract(state: &mut HashMap<crate::value::Value, Vec<Record>>, key: &crate::value::Value, record: &Record) {
        if let Some(bucket) = state.get_mut(key) {
            if let Some(position) = bucket.iter().position(|r| r == record) {
                bucket.remove(position);
            }
            if bucket.is_empty() {
                state.remove(key);
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Aggregate function (spec.md §4.6): `{MIN, MAX, SUM, COUNT, AVG}`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AggFunc {
    Min,
    Max,
    Sum,
    Count,
    Avg,
}

/// Per-group running state. `Sum`/`Count`/`Avg` are invertible (a negative delta just subtracts);
/// `Min`/`Max` are not, so per spec.md §9's Open-Questions resolution this operator additionally
/// keeps each group's full multiset of contributing values and recomputes on a negative delta that
/// removes the current extremum. `Avg` is tracked as a `(sum, count)` pair rather than a separately
/// maintained float (SPEC_FULL.md §4.6 supplement), emitted as `sum / count` at read time.
#[derive(Clone, Debug, Default)]
struct GroupState {
    sum: f64,
    count: u64,
    multiset: Vec<crate::value::Value>,
}

/// Group-by aggregation. Grounded on `dataflow/ops/aggregate.{h,cc}`, generalized from the
/// original's MAX-only implementation to all five functions and to negative deltas, and emitting a
/// retraction of the prior output record alongside every insertion of a new one (spec.md §4.6).
#[derive(Clone, Debug)]
pub struct Aggregate {
    pub group_columns: Vec<usize>,
    pub agg_column: usize,
    pub func: AggFunc,
    pub output_schema: Arc<Schema>,
    state: HashMap<Vec<crate::value::Value>, GroupState>,
    /// The last record emitted for each group, so a change can retract it before inserting the new
    /// one (spec.md §4.6: "maintains ... the prior output record").
    last_output: HashMap<Vec<crate::value::Value>, Record>,
}

impl Aggregate {
    #[must_use]
    pub fn new(group_columns: Vec<usize>, agg_column: usize, func: AggFunc, output_schema: Arc<Schema>) -> Self {
        Self {
            group_columns,
            agg_column,
            func,
            output_schema,
            state: HashMap::new(),
            last_output: HashMap::new(),
        }
    }

    fn key_of(&self, record: &Record) -> Vec<crate::value::Value> {
        self.group_columns.iter().map(|&i| record.at(i).clone()).collect()
    }

    fn numeric(value: &crate::value::Value) -> f64 {
        match value {
            crate::value::Value::Int(v) => *v as f64,
            crate::value::Value::UInt(v) => *v as f64,
            _ => panic!("aggregate column must be numeric, got {value:?}"),
        }
    }

    /// Recomputes `Min`/`Max` from a group's multiset after a removal. Returns `None` if the group
    /// is now empty (the group itself should be dropped).
    fn recompute_extremum(multiset: &[crate::value::Value], func: AggFunc) -> Option<crate::value::Value> {
        match func {
            AggFunc::Max => multiset.iter().cloned().max_by(|a, b| a.partial_cmp(b).expect("numeric")),
            AggFunc::Min => multiset.iter().cloned().min_by(|a, b| a.partial_cmp(b).expect("numeric")),
            _ => unreachable!("recompute_extremum only called for MIN/MAX"),
        }
    }

    fn build_output(&self, key: &[crate::value::Value], value: crate::value::Value) -> Record {
        let mut values = key.to_vec();
        values.push(value);
        Record::positive(Arc::clone(&self.output_schema), values)
    }

    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        let mut touched: Vec<Vec<crate::value::Value>> = Vec::new();
        for record in records {
            let key = self.key_of(&record);
            let raw_value = record.at(self.agg_column).clone();
            let entry = self.state.entry(key.clone()).or_default();

            if record.is_positive() {
                entry.sum += Self::numeric(&raw_value);
                entry.count += 1;
                entry.multiset.push(raw_value);
            } else {
                // An aggregate receiving a negative that would take count below zero is a fatal
                // invariant violation (spec.md §8 boundary cases).
                assert!(
                    entry.count > 0,
                    "aggregate received more negative deltas than positive ones for a single group"
                );
                entry.sum -= Self::numeric(&raw_value);
                entry.count -= 1;
                if let Some(position) = entry.multiset.iter().position(|v| *v == raw_value) {
                    entry.multiset.remove(position);
                }
            }
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        let mut output = Vec::new();
        for key in touched {
            if let Some(prior) = self.last_output.remove(&key) {
                output.push(prior.negated());
            }

            let Some(entry) = self.state.get(&key) else { continue };
            if entry.count == 0 {
                self.state.remove(&key);
                continue;
            }

            let value = match self.func {
                AggFunc::Sum => crate::value::Value::Int(entry.sum as i64),
                AggFunc::Count => crate::value::Value::UInt(entry.count),
                AggFunc::Avg => crate::value::Value::Int((entry.sum / entry.count as f64) as i64),
                AggFunc::Min | AggFunc::Max => {
                    Self::recompute_extremum(&entry.multiset, self.func).expect("count > 0 implies non-empty multiset")
                }
            };
            let new_record = self.build_output(&key, value);
            output.push(new_record.clone());
            self.last_output.insert(key, new_record);
        }
        output
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Terminal sink keyed by one or more columns (spec.md §4.6). Grounded on
/// `dataflow/ops/matview.{h,cc}`: a map from key to an ordered list of records, supporting point
/// lookup, ordered "greater than" range lookup, full scan, limit, and offset.
#[derive(Clone, Debug)]
pub struct MatView {
    pub key_columns: Vec<usize>,
    pub schema: Arc<Schema>,
    contents: HashMap<Vec<crate::value::Value>, Vec<Record>>,
}

impl MatView {
    #[must_use]
    pub fn new(key_columns: Vec<usize>, schema: Arc<Schema>) -> Self {
        Self {
            key_columns,
            schema,
            contents: HashMap::new(),
        }
    }

    fn key_of(&self, record: &Record) -> Vec<crate::value::Value> {
        self.key_columns.iter().map(|&i| record.at(i).clone()).collect()
    }

    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        for record in records {
            let key = self.key_of(&record);
            if record.is_positive() {
                self.contents.entry(key).or_default().push(record);
            } else if let Some(bucket) = self.contents.get_mut(&key) {
                if let Some(position) = bucket.iter().position(|r| r == &record) {
                    bucket.remove(position);
                }
                if bucket.is_empty() {
                    self.contents.remove(&key);
                }
            }
        }
        // Terminal: nothing downstream consumes this operator's output.
        Vec::new()
    }

    /// Point lookup by exact key (spec.md §4.11's `LookupCondition { equality_keys, .. }`).
    #[must_use]
    pub fn lookup(&self, key: &[crate::value::Value]) -> Vec<Record> {
        self.contents.get(key).cloned().unwrap_or_default()
    }

    /// Ordered "greater than" range lookup over the first key column, used when the `WHERE` clause
    /// resolves to a `key > v` pattern.
    #[must_use]
    pub fn greater_than(&self, column: usize, literal: &crate::value::Value) -> Vec<Record> {
        self.scan_all()
            .into_iter()
            .filter(|r| matches!(r.at(column).partial_cmp(literal), Some(std::cmp::Ordering::Greater)))
            .collect()
    }

    #[must_use]
    pub fn scan_all(&self) -> Vec<Record> {
        self.contents.values().flatten().cloned().collect()
    }

    /// Applies `limit`/`offset` over an already-selected set of rows (spec.md §4.6).
    #[must_use]
    pub fn paginate(rows: Vec<Record>, offset: usize, limit: Option<usize>) -> Vec<Record> {
        let skipped = rows.into_iter().skip(offset);
        match limit {
            Some(limit) => skipped.take(limit).collect(),
            None => skipped.collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Exposes another graph's [`MatView`] contents as a base input, enabling nested views (spec.md
/// §4.6 `ForwardView`, §glossary). Per spec.md §9's deadlock-avoidance design note, a forward-view's
/// parent matview is replayed into it synchronously during graph installation (before the child's
/// input is enabled), so this operator never itself blocks on a future — it only ever receives
/// deltas pushed to it afterward, same as any other input.
#[derive(Clone, Debug)]
pub struct ForwardView {
    pub source_flow: String,
}

impl ForwardView {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Re-hashes and re-routes records across partitions for a join keyed on a column other than the
/// table's partition column (spec.md §4.7). At the single-partition level this operator is a
/// passthrough — the actual cross-partition routing happens one layer up, in
/// [`crate::dataflow::partition::route`], which consults this node's `hash_column` to decide which
/// partition's inbox a record belongs on.
#[derive(Clone, Debug)]
pub struct Exchange {
    pub hash_column: usize,
}

impl Exchange {
    fn process(&mut self, records: Vec<Record>) -> Vec<Record> {
        records
    }
}

// -------------------------------------------------------------------------------------------------
//
/// Tagged union over every operator kind (spec.md §9 REDESIGN note): a single `process` dispatch
/// replaces the teacher-style virtual method table, avoiding one heap allocation per node and
/// keeping the per-partition hot loop a flat match.
#[derive(Clone, Debug)]
pub enum Operator {
    Input(Input),
    Identity(Identity),
    Filter(Filter),
    Project(Project),
    Union(Union),
    EquiJoin(EquiJoin),
    Aggregate(Aggregate),
    MatView(MatView),
    ForwardView(ForwardView),
    Exchange(Exchange),
}

impl Operator {
    /// Dispatches to the operator's own `process`. `source` names which parent (by node index) the
    /// batch arrived from; only [`EquiJoin`] uses it to decide which side's hash table to consult.
    pub fn process(&mut self, source: Option<NodeIndex>, records: Vec<Record>) -> Vec<Record> {
        match self {
            Self::Input(op) => op.process(records),
            Self::Identity(op) => op.process(records),
            Self::Filter(op) => op.process(records),
            Self::Project(op) => op.process(records),
            Self::Union(op) => op.process(records),
            Self::EquiJoin(op) => op.process(source, records),
            Self::Aggregate(op) => op.process(records),
            Self::MatView(op) => op.process(records),
            Self::ForwardView(op) => op.process(records),
            Self::Exchange(op) => op.process(records),
        }
    }

    /// `true` for a node with no downstream consumer ([`MatView`] only); used by
    /// [`crate::dataflow::graph::GraphPartition`] to know where to stop recursing and collect
    /// output, though the structural check (no children) is the actual source of truth.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::MatView(_))
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ColumnType, Value};
    use std::collections::BTreeSet;

    fn schema(cols: &[(&str, ColumnType)]) -> Arc<Schema> {
        Schema::shared(cols.iter().map(|(n, t)| ((*n).to_owned(), *t)).collect(), BTreeSet::from([0]))
    }

    #[test]
    fn filter_keeps_only_matching_rows() {
        let schema = schema(&[("id", ColumnType::UInt), ("age", ColumnType::UInt)]);
        let mut filter = Filter {
            clauses: vec![FilterClause {
                column: 1,
                comparison: Comparison::GtEq,
                literal: Value::UInt(18),
            }],
        };
        let rows = vec![
            Record::positive(Arc::clone(&schema), vec![Value::UInt(1), Value::UInt(10)]),
            Record::positive(Arc::clone(&schema), vec![Value::UInt(2), Value::UInt(20)]),
        ];
        let out = filter.process(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].at(0), &Value::UInt(2));
    }

    #[test]
    fn empty_input_produces_empty_output_for_every_operator() {
        let schema = schema(&[("id", ColumnType::UInt)]);
        assert!(Identity.process(Vec::<Record>::new()).is_empty());
        assert!(Union.process(Vec::<Record>::new()).is_empty());
        let mut project = Project { indices: vec![0], output_schema: Arc::clone(&schema) };
        assert!(project.process(Vec::new()).is_empty());
    }

    #[test]
    fn equijoin_before_right_rows_arrive_retains_left_state_and_emits_nothing() {
        let left_schema = schema(&[("id", ColumnType::UInt), ("name", ColumnType::Text)]);
        let right_schema = schema(&[("order_id", ColumnType::UInt), ("user_id", ColumnType::UInt)]);
        let out_schema = left_schema.join_with(&right_schema, 1);
        let mut join = EquiJoin::new(NodeIndex(0), NodeIndex(1), 0, 1, Arc::new(out_schema));

        let left_row = Record::positive(Arc::clone(&left_schema), vec![Value::UInt(1), Value::Text("a".into())]);
        let out = join.process(Some(NodeIndex(0)), vec![left_row]);
        assert!(out.is_empty());
        assert_eq!(join.left_state.len(), 1);
    }

    #[test]
    fn equijoin_emits_on_matching_right_arrival() {
        let left_schema = schema(&[("id", ColumnType::UInt), ("name", ColumnType::Text)]);
        let right_schema = schema(&[("order_id", ColumnType::UInt), ("user_id", ColumnType::UInt)]);
        let out_schema = Arc::new(left_schema.join_with(&right_schema, 1));
        let mut join = EquiJoin::new(NodeIndex(0), NodeIndex(1), 0, 1, Arc::clone(&out_schema));

        let left_row = Record::positive(Arc::clone(&left_schema), vec![Value::UInt(1), Value::Text("a".into())]);
        join.process(Some(NodeIndex(0)), vec![left_row]);

        let right_row = Record::positive(Arc::clone(&right_schema), vec![Value::UInt(100), Value::UInt(1)]);
        let out = join.process(Some(NodeIndex(1)), vec![right_row]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].values().len(), 3);
    }

    #[test]
    fn aggregate_sum_emits_retraction_then_new_total_on_change() {
        let schema = schema(&[("customer", ColumnType::UInt), ("total", ColumnType::Int)]);
        let out_schema = Arc::new(Schema::new(
            vec![("customer".into(), ColumnType::UInt), ("sum".into(), ColumnType::Int)],
            BTreeSet::new(),
        ));
        let mut agg = Aggregate::new(vec![0], 1, AggFunc::Sum, out_schema);

        let first = agg.process(vec![Record::positive(Arc::clone(&schema), vec![Value::UInt(1), Value::Int(100)])]);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].at(1), &Value::Int(100));

        let second = agg.process(vec![Record::positive(Arc::clone(&schema), vec![Value::UInt(1), Value::Int(50)])]);
        assert_eq!(second.len(), 2, "expected a retraction of the old total plus the new one");
        assert!(!second[0].is_positive());
        assert_eq!(second[0].at(1), &Value::Int(100));
        assert!(second[1].is_positive());
        assert_eq!(second[1].at(1), &Value::Int(150));
    }

    #[test]
    fn aggregate_negative_delta_reduces_sum() {
        let schema = schema(&[("customer", ColumnType::UInt), ("total", ColumnType::Int)]);
        let out_schema = Arc::new(Schema::new(
            vec![("customer".into(), ColumnType::UInt), ("sum".into(), ColumnType::Int)],
            BTreeSet::new(),
        ));
        let mut agg = Aggregate::new(vec![0], 1, AggFunc::Sum, out_schema);
        agg.process(vec![
            Record::positive(Arc::clone(&schema), vec![Value::UInt(1), Value::Int(100)]),
            Record::positive(Arc::clone(&schema), vec![Value::UInt(1), Value::Int(50)]),
        ]);
        let out = agg.process(vec![Record::negative(schema, vec![Value::UInt(1), Value::Int(50)])]);
        assert!(out.iter().any(|r| r.is_positive() && r.at(1) == &Value::Int(100)));
    }

    #[test]
    #[should_panic(expected = "more negative deltas")]
    fn aggregate_negative_below_zero_count_is_fatal() {
        let schema = schema(&[("customer", ColumnType::UInt), ("total", ColumnType::Int)]);
        let out_schema = Arc::new(Schema::new(
            vec![("customer".into(), ColumnType::UInt), ("count".into(), ColumnType::UInt)],
            BTreeSet::new(),
        ));
        let mut agg = Aggregate::new(vec![0], 1, AggFunc::Count, out_schema);
        agg.process(vec![Record::negative(schema, vec![Value::UInt(1), Value::Int(1)])]);
        agg.process(vec![]);
    }

    #[test]
    fn matview_point_lookup_and_negative_removes_row() {
        let schema = schema(&[("id", ColumnType::UInt), ("name", ColumnType::Text)]);
        let mut view = MatView::new(vec![0], Arc::clone(&schema));
        let row = Record::positive(Arc::clone(&schema), vec![Value::UInt(1), Value::Text("a".into())]);
        view.process(vec![row.clone()]);
        assert_eq!(view.lookup(&[Value::UInt(1)]).len(), 1);

        view.process(vec![row.negated()]);
        assert!(view.lookup(&[Value::UInt(1)]).is_empty());
    }

    #[test]
    fn matview_greater_than_and_pagination() {
        let schema = schema(&[("id", ColumnType::UInt)]);
        let mut view = MatView::new(vec![0], Arc::clone(&schema));
        for i in 0..5u64 {
            view.process(vec![Record::positive(Arc::clone(&schema), vec![Value::UInt(i)])]);
        }
        let mut rows = view.greater_than(0, &Value::UInt(1));
        rows.sort_by_key(|r| r.at(0).as_uint());
        assert_eq!(rows.len(), 3);
        let paged = MatView::paginate(rows, 1, Some(1));
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].at(0), &Value::UInt(3));
    }
}
