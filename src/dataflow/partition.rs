//! Deterministic hash-based partitioning (spec.md §4.7): every base-table input is partitioned by
//! hashing a designated key column modulo `N`, and the same hash function is used everywhere so
//! that a record always routes to the same partition no matter which operator computed the hash
//! (spec.md §8's round-trip law: "two hash-partitioners applied to the same row with the same
//! partition count return the same partition").
//!
//! Grounded on nearcore's `account_id_to_shard_id`-style fixed-hasher wrapper: a single
//! `std::collections::hash_map::DefaultHasher`-derived function reused by every caller, rather than
//! each operator picking its own.

use crate::value::Value;
use std::hash::{Hash, Hasher};

/// Hashes a single [`Value`] the same way everywhere in the crate. Using
/// [`std::collections::hash_map::DefaultHasher`] rather than `Value`'s own `Hash` impl directly
/// would be equivalent, but naming this function keeps every partitioning call site visibly tied
/// to one fixed algorithm (spec.md §4.7: "the same hash function must be used everywhere").
#[must_use]
pub fn hash_value(value: &Value) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Returns which of `num_partitions` partitions a row keyed by `value` belongs to.
///
/// # Panics
/// Panics if `num_partitions` is zero.
#[must_use]
pub fn partition_of(value: &Value, num_partitions: usize) -> usize {
    assert!(num_partitions > 0, "a graph must have at least one partition");
    (hash_value(value) % num_partitions as u64) as usize
}

/// Partitions `records` by the column at `hash_column`, grouping each record with the partition
/// index it routes to. Used both for a fresh base-table write (spec.md §4.11 step 3) and for an
/// [`crate::dataflow::ops::Exchange`] node re-hashing records that must be routed by a non-partition
/// column (spec.md §4.7).
#[must_use]
pub fn route(records: Vec<crate::record::Record>, hash_column: usize, num_partitions: usize) -> Vec<Vec<crate::record::Record>> {
    let mut buckets: Vec<Vec<crate::record::Record>> = (0..num_partitions).map(|_| Vec::new()).collect();
    for record in records {
        let partition = partition_of(record.at(hash_column), num_partitions);
        buckets[partition].push(record);
    }
    buckets
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_value_and_partition_count_always_routes_identically() {
        let value = Value::UInt(42);
        let a = partition_of(&value, 5);
        let b = partition_of(&value, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn route_groups_records_by_partition() {
        use crate::record::Record;
        use crate::schema::Schema;
        use crate::value::ColumnType;
        use std::collections::BTreeSet;
        use std::sync::Arc;

        let schema = Schema::shared(vec![("id".into(), ColumnType::UInt)], BTreeSet::from([0]));
        let records: Vec<Record> = (0..20u64)
            .map(|i| Record::positive(Arc::clone(&schema), vec![Value::UInt(i)]))
            .collect();
        let buckets = route(records, 0, 3);
        assert_eq!(buckets.len(), 3);
        let total: usize = buckets.iter().map(Vec::len).sum();
        assert_eq!(total, 20);
        for record in buckets[0].iter() {
            assert_eq!(partition_of(record.at(0), 3), 0);
        }
    }
}
