//! Orchestration graph (C5): the deterministic state machine over a shared
//! [`GraphState`] with conditional edges, retry bounds, fallback tiers, cost
//! guards, and explicit halt/human-alert states (§4.4).
//!
//! `GraphState` is carried as a single serialized entry in
//! `VersionedState.extra["graph_state"]` rather than a parallel state
//! container, so it rides the engine's existing versioned-channel merge
//! machinery (`reducers::map_merge`). [`GraphStateNode`] is the uniform seam
//! every domain node implements against; [`GraphStateNodeAdapter`] wraps one
//! into a [`weavegraph::node::Node`] the generic `GraphBuilder` can register.

mod build;
mod nodes;

pub use build::build_orchestration_graph;
pub use nodes::{
    EnqueueColdStartNode, GenerateNode, HumanAlertNode, NormalizeRequestNode,
    ResolveJurisdictionNode, VaultLookupNode, VaultStoreNode,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::schemas::GraphState;
use crate::node::{Node, NodeContext, NodeError, NodePartial};
use crate::state::StateSnapshot;
use crate::utils::collections::new_extra_map;

/// The key under which [`GraphState`] is serialized into `state.extra`.
pub const GRAPH_STATE_KEY: &str = "graph_state";

/// Reads and deserializes the `GraphState` from a snapshot, initializing a
/// fresh one keyed by `request_id` if none exists yet (the first node in a
/// run).
pub fn read_graph_state(snapshot: &StateSnapshot, request_id: &str) -> GraphState {
    snapshot
        .extra
        .get(GRAPH_STATE_KEY)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_else(|| GraphState::new(request_id))
}

/// The uniform harness every domain node implements against (§4.4): marks
/// the node RUNNING, runs the body, and marks SUCCESS/FAILED with escalation
/// on failure, all against a single [`GraphState`] rather than the engine's
/// generic message/extra channels.
#[async_trait]
pub trait GraphStateNode: Send + Sync {
    /// The name recorded in `GraphState.node_history` and used to route
    /// conditional edges.
    fn name(&self) -> &'static str;

    /// Executes the node's body, mutating `state` in place. Returning `Err`
    /// marks the node FAILED with the given error code/message and, if the
    /// node still has attempts remaining, escalates the fallback tier.
    async fn execute(&self, state: &mut GraphState, ctx: &NodeContext) -> Result<(), GraphStateNodeError>;
}

/// Error surfaced by a [`GraphStateNode::execute`] body.
#[derive(Debug, Clone)]
pub struct GraphStateNodeError {
    pub code: String,
    pub retryable: bool,
    pub message: String,
}

impl GraphStateNodeError {
    pub fn new(code: impl Into<String>, retryable: bool, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            retryable,
            message: message.into(),
        }
    }
}

/// Adapts a [`GraphStateNode`] into a [`Node`] the generic `GraphBuilder`
/// can register, analogous to how the engine itself wraps arbitrary node
/// bodies with tracing and barrier merge.
pub struct GraphStateNodeAdapter<T>(pub T);

#[async_trait]
impl<T: GraphStateNode> Node for GraphStateNodeAdapter<T> {
    #[tracing::instrument(skip(self, snapshot, ctx), fields(node = self.0.name()))]
    async fn run(&self, snapshot: StateSnapshot, ctx: NodeContext) -> Result<NodePartial, NodeError> {
        let request_id = snapshot
            .extra
            .get(GRAPH_STATE_KEY)
            .and_then(|v| v.get("request_id"))
            .and_then(|v| v.as_str())
            .unwrap_or(&ctx.node_id)
            .to_string();
        let mut state = read_graph_state(&snapshot, &request_id);
        let now = Utc::now();
        state.record_node_start(self.0.name(), now);

        match self.0.execute(&mut state, &ctx).await {
            Ok(()) => {
                state.record_node_success(self.0.name(), Utc::now());
            }
            Err(err) => {
                state.record_node_failure(self.0.name(), Utc::now(), err.code, err.retryable, err.message);
            }
        }

        let mut extra = new_extra_map();
        extra.insert(
            GRAPH_STATE_KEY.to_string(),
            serde_json::to_value(&state).map_err(NodeError::Serde)?,
        );
        Ok(NodePartial::new().with_extra(extra))
    }
}

/// An [`weavegraph::graphs::EdgePredicate`]-compatible routing function that
/// reads the current `GraphState` out of the snapshot for dispatch. Falls
/// back to an empty route list if no graph state exists yet.
pub fn with_graph_state<F>(f: F) -> crate::graphs::EdgePredicate
where
    F: Fn(&GraphState) -> Vec<String> + Send + Sync + 'static,
{
    std::sync::Arc::new(move |snapshot: StateSnapshot| {
        match snapshot.extra.get(GRAPH_STATE_KEY) {
            Some(v) => match serde_json::from_value::<GraphState>(v.clone()) {
                Ok(state) => f(&state),
                Err(_) => Vec::new(),
            },
            None => Vec::new(),
        }
    })
}
