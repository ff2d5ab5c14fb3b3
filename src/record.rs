//! A `Record` is a single row flowing through the storage layer or the dataflow graph: a schema
//! reference, a polarity bit, and per-column values.

use crate::schema::Schema;
use crate::value::Value;
use std::sync::Arc;

// -------------------------------------------------------------------------------------------------
//
/// Whether a [`Record`] is an insertion (`Positive`) or a retraction (`Negative`) of a previously
/// seen row.
///
/// Retractions flow through the dataflow graph exactly like insertions, just tagged the other way;
/// every operator in [`crate::dataflow::ops`] preserves polarity on its outputs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

// -------------------------------------------------------------------------------------------------
//
/// A single row: a shared [`Schema`], a [`Polarity`], and one [`Value`] per column.
///
/// Hashing and equality only consider the non-null column values under the schema (mirroring the
/// original engine's `record_utils` comparison helpers) — polarity is deliberately excluded so that
/// a positive and negative copy of the same row compare equal, which is exactly the property
/// [`crate::dataflow::ops::MatView`] relies on to find the row a negative delta retracts.
#[derive(Clone, Debug)]
pub struct Record {
    schema: Arc<Schema>,
    polarity: Polarity,
    values: Vec<Value>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl Record {
    /// # Panics
    /// Panics if `values.len()` does not match `schema.num_columns()`.
    #[must_use]
    pub fn new(schema: Arc<Schema>, polarity: Polarity, values: Vec<Value>) -> Self {
        assert_eq!(
            values.len(),
            schema.num_columns(),
            "record has {} values but schema has {} columns",
            values.len(),
            schema.num_columns()
        );
        Self {
            schema,
            polarity,
            values,
        }
    }

    #[must_use]
    pub fn positive(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        Self::new(schema, Polarity::Positive, values)
    }

    #[must_use]
    pub fn negative(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        Self::new(schema, Polarity::Negative, values)
    }

    #[inline]
    #[must_use]
    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    #[must_use]
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    #[inline]
    #[must_use]
    pub const fn is_positive(&self) -> bool {
        matches!(self.polarity, Polarity::Positive)
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn at(&self, index: usize) -> &Value {
        &self.values[index]
    }

    /// Returns a record identical to `self` but with the opposite polarity. Used when a deleted row
    /// must be re-emitted as a retraction into the dataflow graph.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            polarity: match self.polarity {
                Polarity::Positive => Polarity::Negative,
                Polarity::Negative => Polarity::Positive,
            },
            values: self.values.clone(),
        }
    }

    /// Extracts the primary-key values, in schema column order, as owned `Value`s.
    #[must_use]
    pub fn key_values(&self) -> Vec<Value> {
        self.schema
            .key_columns()
            .iter()
            .map(|&i| self.values[i].clone())
            .collect()
    }

    /// Builds the record produced by projecting onto `indices`, preserving this record's polarity.
    #[must_use]
    pub fn project(&self, projected_schema: Arc<Schema>, indices: &[usize]) -> Self {
        let values = indices.iter().map(|&i| self.values[i].clone()).collect();
        Self::new(projected_schema, self.polarity, values)
    }

    /// Concatenates `self` with `other`, dropping `other`'s column at `drop_other_index` (used by
    /// equijoin to drop the duplicated join key from the right side). Polarity follows `self`'s —
    /// the caller must only ever join rows of matching polarity.
    #[must_use]
    pub fn join_with(
        &self,
        other: &Self,
        joined_schema: Arc<Schema>,
        drop_other_index: usize,
    ) -> Self {
        let mut values = self.values.clone();
        for (i, value) in other.values.iter().enumerate() {
            if i != drop_other_index {
                values.push(value.clone());
            }
        }
        Self::new(joined_schema, self.polarity, values)
    }
}

// -------------------------------------------------------------------------------------------------
//
// Trait Implementations

impl PartialEq for Record {
    /// Structural equality over non-null values under the schema; polarity is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.values == other.values
    }
}

impl Eq for Record {}

impl std::hash::Hash for Record {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        for value in &self.values {
            value.hash(state);
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
