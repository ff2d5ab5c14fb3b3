//! A `Schema` describes the ordered columns of a table or record, and which of those columns form
//! its primary key.

use crate::value::ColumnType;
use std::collections::BTreeSet;
use std::sync::Arc;

// -------------------------------------------------------------------------------------------------
//
/// An ordered list of `(column name, column type)` pairs plus the set of indices that form the
/// primary key.
///
/// Two schemas are equal iff their column lists are equal (key-column membership is derived from
/// the column list's annotations and so never differs for equal column lists). Schemas are meant to
/// be constructed once and shared by reference: see [`crate::record::Record`], which stores an
/// `Arc<Schema>` rather than a fresh copy per row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<(String, ColumnType)>,
    key_columns: BTreeSet<usize>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Schema {
    /// Builds a schema from a column list and the indices of the primary-key columns.
    ///
    /// # Panics
    /// Panics if any index in `key_columns` is out of bounds for `columns`.
    #[must_use]
    pub fn new(columns: Vec<(String, ColumnType)>, key_columns: BTreeSet<usize>) -> Self {
        for &index in &key_columns {
            assert!(
                index < columns.len(),
                "key column index {index} out of bounds for {} columns",
                columns.len()
            );
        }
        Self {
            columns,
            key_columns,
        }
    }

    /// Wraps [`Self::new`] in an `Arc`, the form tables and records actually hold.
    #[must_use]
    pub fn shared(columns: Vec<(String, ColumnType)>, key_columns: BTreeSet<usize>) -> Arc<Self> {
        Arc::new(Self::new(columns, key_columns))
    }

    #[inline]
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    #[must_use]
    pub fn column_name(&self, index: usize) -> &str {
        &self.columns[index].0
    }

    #[inline]
    #[must_use]
    pub fn column_type(&self, index: usize) -> ColumnType {
        self.columns[index].1
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _)| n == name)
    }

    #[inline]
    #[must_use]
    pub const fn key_columns(&self) -> &BTreeSet<usize> {
        &self.key_columns
    }

    #[inline]
    #[must_use]
    pub fn is_key_column(&self, index: usize) -> bool {
        self.key_columns.contains(&index)
    }

    #[must_use]
    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    /// Builds the subschema produced by projecting onto the given column indices, in the order
    /// given. Key-column status is not preserved: a projection's output is not addressable by
    /// primary key unless the caller re-declares one.
    #[must_use]
    pub fn project(&self, indices: &[usize]) -> Self {
        let columns = indices
            .iter()
            .map(|&i| self.columns[i].clone())
            .collect();
        Self::new(columns, BTreeSet::new())
    }

    /// Builds the schema produced by concatenating `self`'s columns with `other`'s columns, minus
    /// `other`'s column at `drop_other_index` (used by equijoin, which drops the right-hand join
    /// key from its output schema).
    #[must_use]
    pub fn join_with(&self, other: &Self, drop_other_index: usize) -> Self {
        let mut columns = self.columns.clone();
        for (i, column) in other.columns.iter().enumerate() {
            if i != drop_other_index {
                columns.push(column.clone());
            }
        }
        Self::new(columns, BTreeSet::new())
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new(
            vec![
                ("id".into(), ColumnType::UInt),
                ("name".into(), ColumnType::Text),
            ],
            BTreeSet::from([0]),
        )
    }

    #[test]
    fn equal_column_lists_are_equal_schemas() {
        assert_eq!(sample(), sample());
    }

    #[test]
    fn column_lookup_by_name() {
        let schema = sample();
        assert_eq!(schema.column_index("name"), Some(1));
        assert_eq!(schema.column_index("missing"), None);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn bad_key_column_index_panics() {
        Schema::new(vec![("id".into(), ColumnType::UInt)], BTreeSet::from([5]));
    }
}
