//! Wires every domain node onto a [`GraphBuilder`] per the orchestration
//! diagram (§4.4):
//!
//! ```text
//! NormalizeRequest → ResolveJurisdiction → VaultLookup
//!    ├── found (conf≥0.8)         → Generate → END | HumanAlert
//!    └── cold_start / low-conf    → EnqueueColdStart →
//!                                     Scout → Gatekeeper → Architect →
//!                                     Embedder → VaultStore → Generate
//!    (any node may route to HumanAlert or END)
//! ```
//!
//! Retryable node failures route back onto the same node until its 2-attempt
//! cap is spent (`GraphState::can_retry_node`); any non-retryable failure, or
//! a fresh error once `fallback_tier` has escalated to `Tier2`, short-circuits
//! through `GraphState::should_halt` straight to `HumanAlert` — mirroring the
//! way the teacher's conditional edges are pure functions of a snapshot's
//! state (`graphs::EdgePredicate`).

use std::sync::Arc;

use crate::app::App;
use crate::domain::harness::ProductionHarness;
use crate::domain::ingestion::{ArchitectAgent, EmbedderAgent, GatekeeperAgent, ScoutAgent};
use crate::domain::orchestration::{with_graph_state, GraphStateNodeAdapter};
use crate::domain::store::CurriculumStore;
use crate::graphs::{EdgePredicate, GraphBuilder};
use crate::types::NodeKind;

use super::nodes::{
    EnqueueColdStartNode, GenerateNode, HumanAlertNode, NormalizeRequestNode,
    ResolveJurisdictionNode, VaultLookupNode, VaultStoreNode,
};

fn node(name: &str) -> NodeKind {
    NodeKind::Custom(name.to_string())
}

/// Retries `this` node while attempts remain, halts to `HumanAlert` on a
/// non-retryable failure or cap exhaustion, and otherwise advances to `next`.
fn retry_or_advance(this: &'static str, next: &'static str) -> EdgePredicate {
    with_graph_state(move |state| {
        if state.should_halt() {
            return vec!["HumanAlert".to_string()];
        }
        if state.errors.has_error && state.errors.error_node.as_deref() == Some(this) {
            return if state.can_retry_node(this) {
                vec![this.to_string()]
            } else {
                vec!["HumanAlert".to_string()]
            };
        }
        vec![next.to_string()]
    })
}

/// The vault decision: `found ∧ conf ≥ 0.8 → Generate`, else `EnqueueColdStart`.
fn vault_decision() -> EdgePredicate {
    with_graph_state(|state| {
        if state.should_halt() {
            return vec!["HumanAlert".to_string()];
        }
        match &state.vault_lookup {
            Some(lookup) if lookup.serves_fresh() => vec!["Generate".to_string()],
            _ => vec!["EnqueueColdStart".to_string()],
        }
    })
}

/// Builds the compiled orchestration graph, injecting the outbound adapters
/// and stores every ingestion/infra node needs.
#[allow(clippy::too_many_arguments)]
pub fn build_orchestration_graph(
    search: Arc<dyn crate::domain::ingestion::scout::SearchAdapter>,
    fetcher: Arc<dyn crate::domain::ingestion::architect::DocumentFetcher>,
    extractor: Arc<dyn crate::domain::ingestion::architect::PdfTextExtractor>,
    model: Arc<dyn crate::domain::model_client::ModelClient>,
    cache: Arc<crate::domain::ingestion::DocumentCache>,
    store: Arc<dyn CurriculumStore>,
    harness: Arc<ProductionHarness>,
) -> App {
    GraphBuilder::new()
        .add_node(node("NormalizeRequest"), GraphStateNodeAdapter(NormalizeRequestNode))
        .add_node(node("ResolveJurisdiction"), GraphStateNodeAdapter(ResolveJurisdictionNode))
        .add_node(node("VaultLookup"), GraphStateNodeAdapter(VaultLookupNode::new(store.clone())))
        .add_node(node("EnqueueColdStart"), GraphStateNodeAdapter(EnqueueColdStartNode))
        .add_node(node("Scout"), GraphStateNodeAdapter(ScoutAgent::new(search)))
        .add_node(node("Gatekeeper"), GraphStateNodeAdapter(GatekeeperAgent::new()))
        .add_node(node("Architect"), GraphStateNodeAdapter(ArchitectAgent::new(fetcher, extractor, model.clone(), cache)))
        .add_node(node("Embedder"), GraphStateNodeAdapter(EmbedderAgent::new(model)))
        .add_node(node("VaultStore"), GraphStateNodeAdapter(VaultStoreNode::new(store.clone())))
        .add_node(node("Generate"), GraphStateNodeAdapter(GenerateNode::new(harness, store)))
        .add_node(node("HumanAlert"), GraphStateNodeAdapter(HumanAlertNode))
        .add_edge(NodeKind::Start, node("NormalizeRequest"))
        .add_conditional_edge(node("NormalizeRequest"), retry_or_advance("NormalizeRequest", "ResolveJurisdiction"))
        .add_conditional_edge(node("ResolveJurisdiction"), retry_or_advance("ResolveJurisdiction", "VaultLookup"))
        .add_conditional_edge(node("VaultLookup"), vault_decision())
        .add_edge(node("EnqueueColdStart"), node("Scout"))
        .add_conditional_edge(node("Scout"), retry_or_advance("Scout", "Gatekeeper"))
        .add_conditional_edge(node("Gatekeeper"), retry_or_advance("Gatekeeper", "Architect"))
        .add_conditional_edge(node("Architect"), retry_or_advance("Architect", "Embedder"))
        .add_conditional_edge(node("Embedder"), retry_or_advance("Embedder", "VaultStore"))
        .add_conditional_edge(node("VaultStore"), retry_or_advance("VaultStore", "Generate"))
        .add_conditional_edge(node("Generate"), retry_or_advance("Generate", "End"))
        .add_edge(node("HumanAlert"), NodeKind::End)
        .compile()
}
