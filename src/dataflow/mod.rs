//! Incremental dataflow engine (spec.md §4.7-4.9): operators are plain data (tagged enum, not
//! virtual dispatch), graphs are arenas of indices replicated per partition, and a fixed worker
//! pool drives deltas through them with an explicit consistency barrier for cross-partition joins.

pub mod future;
pub mod graph;
pub mod ops;
pub mod partition;
pub mod worker;

pub use future::{Future, Promise};
pub use graph::{Graph, GraphPartition, NodeIndex, OperatorNode};
pub use ops::Operator;
pub use worker::{FlowId, Message, QueryKind, WorkerPool};
