//! Arena-of-indices dataflow graph. Each partition is a flat `Vec<OperatorNode>` indexed by
//! [`NodeIndex`]; edges are stored as index pairs rather than owning references, so a whole
//! [`GraphPartition`] can be moved into a worker thread's closure with no shared ownership
//! (spec.md §9 REDESIGN FLAGS: arena+indices instead of a pointer-linked DAG).

use crate::dataflow::ops::Operator;
use crate::record::Record;
use crate::schema::Schema;
use std::sync::Arc;

/// Index of an operator node within one [`GraphPartition`]. Indices are only comparable within the
/// same partition; every partition of a [`Graph`] shares the same node layout (cloned from one
/// logical plan), so an index means the same operator across all of them.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

// -------------------------------------------------------------------------------------------------
//
#[derive(Clone)]
pub struct OperatorNode {
    pub operator: Operator,
    pub schema: Arc<Schema>,
    pub parents: Vec<NodeIndex>,
    pub children: Vec<NodeIndex>,
}

// -------------------------------------------------------------------------------------------------
//
/// One partition's worth of the dataflow plan: every base table feeds a designated subset of
/// partitions (by hashing its sharding column), and the same operator graph is replicated across
/// every partition.
#[derive(Clone, Default)]
pub struct GraphPartition {
    nodes: Vec<OperatorNode>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl GraphPartition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new node wired to `parents`, returning its index. Registers the reverse `children`
    /// edge on each parent.
    ///
    /// # Panics
    /// Panics if any parent index is not yet present in this partition (nodes must be added in
    /// topological order).
    pub fn add_node(&mut self, operator: Operator, schema: Arc<Schema>, parents: Vec<NodeIndex>) -> NodeIndex {
        let index = NodeIndex(u32::try_from(self.nodes.len()).expect("graph partition has more than u32::MAX nodes"));
        for &parent in &parents {
            self.nodes[parent.0 as usize].children.push(index);
        }
        self.nodes.push(OperatorNode {
            operator,
            schema,
            parents,
            children: Vec::new(),
        });
        index
    }

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> &OperatorNode {
        &self.nodes[index.0 as usize]
    }

    pub fn node_mut(&mut self, index: NodeIndex) -> &mut OperatorNode {
        &mut self.nodes[index.0 as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Feeds `records` into the operator at `index` as deltas arriving from `source`, then
    /// recursively forwards the operator's output to every child, returning the deltas that reached
    /// a terminal node (one with no children — typically a [`crate::dataflow::ops::MatView`]).
    pub fn process(&mut self, index: NodeIndex, source: Option<NodeIndex>, records: Vec<Record>) -> Vec<Record> {
        let output = self.nodes[index.0 as usize].operator.process(source, records);
        if output.is_empty() {
            return Vec::new();
        }
        let children = self.nodes[index.0 as usize].children.clone();
        if children.is_empty() {
            return output;
        }
        let mut terminal = Vec::new();
        for child in children {
            terminal.extend(self.process(child, Some(index), output.clone()));
        }
        terminal
    }
}

// -------------------------------------------------------------------------------------------------
//
/// `N` replicas of one logical operator plan, one per dataflow partition.
pub struct Graph {
    partitions: Vec<GraphPartition>,
}

impl Graph {
    #[must_use]
    pub fn new(partitions: Vec<GraphPartition>) -> Self {
        Self { partitions }
    }

    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    #[must_use]
    pub fn partition(&self, index: usize) -> &GraphPartition {
        &self.partitions[index]
    }

    pub fn partition_mut(&mut self, index: usize) -> &mut GraphPartition {
        &mut self.partitions[index]
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
