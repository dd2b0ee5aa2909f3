//! Concurrent per-superstep node execution.
//!
//! The scheduler is handed the current frontier (the set of nodes due to
//! run this step), the node registry, and a read-only snapshot of state.
//! It runs every frontier node concurrently, bounded by a configured
//! concurrency limit, and hands the raw per-node outputs back to the
//! caller (`AppRunner`) for barrier merging. The scheduler itself never
//! mutates `VersionedState` — that stays the runner's job.

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::event_bus::EventEmitter;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::types::NodeKind;

/// Per-session scheduler state carried across supersteps.
///
/// Tracks, for each node, the channel versions it last observed. This is
/// currently informational bookkeeping consumed by checkpoint persistence;
/// the scheduler does not yet use it to skip re-running nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    pub versions_seen: FxHashMap<String, FxHashMap<String, u64>>,
}

/// Errors surfaced while running a superstep.
#[derive(Debug, Error, Diagnostic)]
pub enum SchedulerError {
    #[error("node {kind:?} failed at step {step}: {source}")]
    #[diagnostic(code(weavegraph::scheduler::node_run))]
    NodeRun {
        kind: NodeKind,
        step: u64,
        #[source]
        source: NodeError,
    },

    #[error("scheduler task join failed: {0}")]
    #[diagnostic(code(weavegraph::scheduler::join))]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of running one superstep.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStepResult {
    /// Raw node outputs, in completion order (not necessarily frontier order).
    pub outputs: Vec<(NodeKind, NodePartial)>,
    /// Nodes that actually executed this step (registered, non-virtual).
    pub ran_nodes: Vec<NodeKind>,
    /// Frontier entries skipped this step (Start/End, or unregistered).
    pub skipped_nodes: Vec<NodeKind>,
}

/// Runs frontier nodes concurrently, bounded by `concurrency_limit`.
#[derive(Debug, Clone)]
pub struct Scheduler {
    concurrency_limit: usize,
}

impl Scheduler {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            concurrency_limit: concurrency_limit.max(1),
        }
    }

    pub fn concurrency_limit(&self) -> usize {
        self.concurrency_limit
    }

    /// Execute every runnable node in `frontier` concurrently and collect
    /// their partial outputs.
    ///
    /// `Start` and `End` are virtual nodes and never dispatched; any
    /// frontier entry that isn't present in `nodes` is skipped rather than
    /// treated as an error, preserving forward progress on partial graphs.
    pub async fn superstep(
        &self,
        _scheduler_state: &mut SchedulerState,
        nodes: &FxHashMap<NodeKind, Arc<dyn Node>>,
        frontier: Vec<NodeKind>,
        snapshot: StateSnapshot,
        step: u64,
        emitter: Arc<dyn EventEmitter>,
    ) -> Result<SchedulerStepResult, SchedulerError> {
        let mut runnable: Vec<NodeKind> = Vec::new();
        let mut skipped: Vec<NodeKind> = Vec::new();

        for kind in frontier {
            if kind.is_start() || kind.is_end() {
                skipped.push(kind);
                continue;
            }
            if nodes.contains_key(&kind) {
                runnable.push(kind);
            } else {
                tracing::warn!(node = ?kind, "scheduler: skipping unregistered frontier node");
                skipped.push(kind);
            }
        }

        let mut outputs: Vec<(NodeKind, NodePartial)> = Vec::with_capacity(runnable.len());
        let mut ran_nodes: Vec<NodeKind> = Vec::with_capacity(runnable.len());

        let mut pending = runnable.into_iter();
        let mut in_flight: JoinSet<(NodeKind, Result<NodePartial, NodeError>)> = JoinSet::new();

        let spawn_next = |in_flight: &mut JoinSet<(NodeKind, Result<NodePartial, NodeError>)>,
                          pending: &mut std::vec::IntoIter<NodeKind>| {
            if let Some(kind) = pending.next() {
                let node = nodes
                    .get(&kind)
                    .expect("node presence checked before scheduling")
                    .clone();
                let ctx = NodeContext {
                    node_id: kind.encode().to_string(),
                    step,
                    event_emitter: emitter.clone(),
                };
                let snap = snapshot.clone();
                in_flight.spawn(async move {
                    let result = node.run(snap, ctx).await;
                    (kind, result)
                });
                true
            } else {
                false
            }
        };

        for _ in 0..self.concurrency_limit {
            if !spawn_next(&mut in_flight, &mut pending) {
                break;
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            let (kind, result) = joined?;
            spawn_next(&mut in_flight, &mut pending);

            match result {
                Ok(partial) => {
                    ran_nodes.push(kind.clone());
                    outputs.push((kind, partial));
                }
                Err(source) => {
                    return Err(SchedulerError::NodeRun { kind, step, source });
                }
            }
        }

        Ok(SchedulerStepResult {
            outputs,
            ran_nodes,
            skipped_nodes: skipped,
        })
    }
}
