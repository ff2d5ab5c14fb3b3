//! Worker pool & channels (spec.md §4.8): a fixed pool of `N` OS threads, one per partition, each
//! draining a bounded MPMC inbox of [`Message`]s and driving them through that partition's
//! [`GraphPartition`]. Grounded on nearcore's actor/channel plumbing style (one inbox per logical
//! shard, a dedicated thread owning that shard's state with no cross-thread locking).
//!
//! Per-partition operator state is never shared: each worker thread owns its partitions'
//! [`GraphPartition`]s exclusively in a thread-local map, installed once via [`Command::Install`]
//! and never touched by any other thread (spec.md §5's "no locking on the hot path" policy).

use crate::dataflow::future::{Future, Promise};
use crate::dataflow::graph::{GraphPartition, NodeIndex};
use crate::dataflow::ops::Operator;
use crate::dataflow::partition;
use crate::record::Record;
use crate::value::Value;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Identifies one logical flow (a view's dataflow plan) among possibly several installed into the
/// same worker pool.
pub type FlowId = u32;

// -------------------------------------------------------------------------------------------------
//
/// One unit of work routed to a partition's inbox: deltas arriving at `target_op` from `source_op`
/// (`None` for a fresh base-table write), carrying the [`Promise`] that must be resolved once this
/// message's synchronous processing — including any further same-partition forwarding — completes.
pub struct Message {
    pub flow: FlowId,
    pub source_op: Option<NodeIndex>,
    pub target_op: NodeIndex,
    pub records: Vec<Record>,
    pub promise: Promise,
}

enum Command {
    Install(FlowId, GraphPartition),
    Process(Message),
    Query(FlowId, NodeIndex, QueryKind, Sender<Vec<Record>>),
    Shutdown,
}

/// A read against a [`crate::dataflow::ops::MatView`] node, fanned out to every partition since the
/// view's rows are spread across all of them by the flow's partitioning column (spec.md §4.11's
/// `LookupCondition`).
#[derive(Clone, Debug)]
pub enum QueryKind {
    Lookup(Vec<Value>),
    GreaterThan(usize, Value),
    ScanAll,
}

// -------------------------------------------------------------------------------------------------
//
/// A fixed pool of `N` worker threads, one per dataflow partition (spec.md §4.8).
pub struct WorkerPool {
    senders: Vec<Sender<Command>>,
    handles: Vec<Option<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
}

// -------------------------------------------------------------------------------------------------
//
// Method Implementations

impl WorkerPool {
    /// Spawns `num_partitions` worker threads, each given every other worker's sender so an
    /// [`crate::dataflow::ops::Exchange`] node can re-route records to a peer partition (spec.md
    /// §4.7).
    ///
    /// # Panics
    /// Panics if `num_partitions` is zero.
    #[must_use]
    pub fn new(num_partitions: usize, inbox_capacity: usize) -> Self {
        assert!(num_partitions > 0, "a worker pool needs at least one partition");
        let stop = Arc::new(AtomicBool::new(false));
        let channels: Vec<(Sender<Command>, Receiver<Command>)> =
            (0..num_partitions).map(|_| bounded(inbox_capacity)).collect();
        let peers: Vec<Sender<Command>> = channels.iter().map(|(s, _)| s.clone()).collect();

        let mut senders = Vec::with_capacity(num_partitions);
        let mut handles = Vec::with_capacity(num_partitions);
        for (partition_index, (sender, receiver)) in channels.into_iter().enumerate() {
            senders.push(sender);
            let peers = peers.clone();
            let handle = std::thread::Builder::new()
                .name(format!("dataflow-worker-{partition_index}"))
                .spawn(move || Self::run(receiver, &peers))
                .expect("failed to spawn dataflow worker thread");
            handles.push(Some(handle));
        }

        Self { senders, handles, stop }
    }

    #[must_use]
    pub fn num_partitions(&self) -> usize {
        self.senders.len()
    }

    /// Installs `partitions[i]` as the `GraphPartition` worker `i` owns for `flow`.
    ///
    /// # Panics
    /// Panics if `partitions.len()` does not equal [`Self::num_partitions`].
    pub fn install(&self, flow: FlowId, partitions: Vec<GraphPartition>) {
        assert_eq!(partitions.len(), self.senders.len(), "one GraphPartition per worker is required");
        for (sender, partition) in self.senders.iter().zip(partitions) {
            let _ = sender.send(Command::Install(flow, partition));
        }
    }

    /// Routes `records` to `input_node` of `flow`, hash-partitioning them by `hash_column`, and
    /// returns the [`Future`] that resolves once every downstream matview has absorbed them
    /// (spec.md §4.9). One promise is derived per non-empty destination partition; the barrier
    /// resolves as each partition finishes its synchronous chain of forwarding.
    pub fn submit(
        &self,
        flow: FlowId,
        input_node: NodeIndex,
        records: Vec<Record>,
        hash_column: usize,
        consistent: bool,
    ) -> Future {
        let future = Future::new(consistent);
        let initial_promise = future.promise();
        let buckets = partition::route(records, hash_column, self.senders.len());
        let nonempty: Vec<(usize, Vec<Record>)> = buckets
            .into_iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty())
            .collect();

        if nonempty.is_empty() {
            initial_promise.resolve();
            return future;
        }

        let mut promises: Vec<Promise> = (0..nonempty.len() - 1).map(|_| initial_promise.derive()).collect();
        promises.push(initial_promise);
        for ((partition_index, bucket), promise) in nonempty.into_iter().zip(promises) {
            let _ = self.senders[partition_index].send(Command::Process(Message {
                flow,
                source_op: None,
                target_op: input_node,
                records: bucket,
                promise,
            }));
        }
        future
    }

    /// Reads a [`crate::dataflow::ops::MatView`] node's contents, fanning the query out to every
    /// partition and concatenating their replies. Partitions whose flow is not installed, or whose
    /// node is not a `MatView`, contribute an empty result rather than erroring.
    #[must_use]
    pub fn query(&self, flow: FlowId, node: NodeIndex, kind: QueryKind) -> Vec<Record> {
        let (reply_tx, reply_rx) = bounded(self.senders.len());
        for sender in &self.senders {
            let _ = sender.send(Command::Query(flow, node, kind.clone(), reply_tx.clone()));
        }
        drop(reply_tx);
        let mut out = Vec::new();
        for _ in 0..self.senders.len() {
            if let Ok(rows) = reply_rx.recv() {
                out.extend(rows);
            }
        }
        out
    }

    /// Flips the stop flag, sends every worker an explicit shutdown command, and joins all
    /// threads. Queued work already in an inbox is drained (FIFO) before a worker sees its
    /// shutdown command (spec.md §4.8/§5).
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        for sender in &self.senders {
            let _ = sender.send(Command::Shutdown);
        }
        for handle in self.handles.drain(..) {
            if let Some(handle) = handle {
                let _ = handle.join();
            }
        }
    }

    fn run(receiver: Receiver<Command>, peers: &[Sender<Command>]) {
        let mut flows: HashMap<FlowId, GraphPartition> = HashMap::new();
        loop {
            match receiver.recv() {
                Ok(Command::Shutdown) | Err(_) => break,
                Ok(Command::Install(flow, partition)) => {
                    flows.insert(flow, partition);
                }
                Ok(Command::Process(message)) => {
                    if let Some(graph_partition) = flows.get_mut(&message.flow) {
                        Self::drive(
                            graph_partition,
                            message.flow,
                            message.target_op,
                            message.source_op,
                            message.records,
                            &message.promise,
                            peers,
                        );
                    }
                    message.promise.resolve();
                }
                Ok(Command::Query(flow, node, kind, reply)) => {
                    let rows = flows
                        .get(&flow)
                        .map(|graph_partition| Self::answer(graph_partition, node, &kind))
                        .unwrap_or_default();
                    let _ = reply.send(rows);
                }
            }
        }
    }

    /// Processes one node and recursively forwards its output to same-partition children,
    /// crossing into a peer's inbox (via a freshly derived [`Promise`]) whenever it meets an
    /// [`Operator::Exchange`] node that re-hashes records across partitions.
    fn drive(
        graph_partition: &mut GraphPartition,
        flow: FlowId,
        index: NodeIndex,
        source: Option<NodeIndex>,
        records: Vec<Record>,
        promise: &Promise,
        peers: &[Sender<Command>],
    ) {
        if records.is_empty() {
            return;
        }
        let is_exchange = matches!(graph_partition.node(index).operator, Operator::Exchange(_));
        let output = graph_partition.node_mut(index).operator.process(source, records);
        if output.is_empty() {
            return;
        }
        let children = graph_partition.node(index).children.clone();

        if is_exchange {
            let hash_column = match &graph_partition.node(index).operator {
                Operator::Exchange(exchange) => exchange.hash_column,
                _ => unreachable!("checked above"),
            };
            let buckets = partition::route(output, hash_column, peers.len());
            for (target_partition, bucket) in buckets.into_iter().enumerate() {
                if bucket.is_empty() {
                    continue;
                }
                for &child in &children {
                    let derived = promise.derive();
                    let _ = peers[target_partition].send(Command::Process(Message {
                        flow,
                        source_op: Some(index),
                        target_op: child,
                        records: bucket.clone(),
                        promise: derived,
                    }));
                }
            }
            return;
        }

        for child in children {
            Self::drive(graph_partition, flow, child, Some(index), output.clone(), promise, peers);
        }
    }

    fn answer(graph_partition: &GraphPartition, node: NodeIndex, kind: &QueryKind) -> Vec<Record> {
        let Operator::MatView(view) = &graph_partition.node(node).operator else {
            return Vec::new();
        };
        match kind {
            QueryKind::Lookup(key) => view.lookup(key),
            QueryKind::GreaterThan(column, literal) => view.greater_than(*column, literal),
            QueryKind::ScanAll => view.scan_all(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
//
// Tests
