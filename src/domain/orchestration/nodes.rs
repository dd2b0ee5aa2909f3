//! Infrastructure nodes of the orchestration graph (§4.4): everything that
//! isn't one of the C4 ingestion agents — intent normalization, jurisdiction
//! resolution, the vault lookup/store pair, the cold-start marker, the
//! generation call into the production harness, and the terminal human-alert
//! state.

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::errors::CoreError;
use crate::domain::harness::ProductionHarness;
use crate::domain::orchestration::{GraphStateNode, GraphStateNodeError};
use crate::domain::schemas::{
    AssumptionType, Curriculum, CurriculumMode, CurriculumStatus, GraphState, JurisdictionLevel,
    JurisdictionResolution, NormalizedRequest,
};
use crate::domain::store::CurriculumStore;
use crate::domain::validation::{check_confidence_threshold, ValidationStage};
use crate::node::NodeContext;

/// Confirms the pre-seeded [`NormalizedRequest`] clears the pipeline-level
/// intent-classification floor (0.85), stricter than the 0.7 floor
/// [`NormalizedRequest::new`] already enforces at construction (§4.1).
/// `CurriculumCore::generate` is responsible for classifying the raw prompt
/// and constructing the request before invoking the graph; this node is the
/// gate, not the classifier.
pub struct NormalizeRequestNode;

#[async_trait]
impl GraphStateNode for NormalizeRequestNode {
    fn name(&self) -> &'static str {
        "NormalizeRequest"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let request = state
            .normalized_request
            .as_ref()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no normalized request seeded"))?;
        check_confidence_threshold(request.confidence, ValidationStage::IntentClassification).map_err(|err| {
            GraphStateNodeError::new("E_LOW_INTENT_CONFIDENCE", false, err.to_string())
        })
    }
}

/// Resolves the jurisdiction for a request from its explicit fields,
/// enforcing the schema's ambiguity-score invariants (§4.1, §4.4). Explicit
/// institution/department context yields a low-ambiguity `Explicit`
/// resolution; its absence falls back to a country-level `Assumed` one.
fn resolve_jurisdiction(request: &NormalizedRequest) -> Result<JurisdictionResolution, CoreError> {
    let (level, assumption_type, jas, confidence) = match (&request.institution, request.mode) {
        (Some(_), CurriculumMode::Syllabus) => (JurisdictionLevel::University, AssumptionType::Explicit, 0.1, 0.95),
        (None, CurriculumMode::Syllabus) => (JurisdictionLevel::University, AssumptionType::UserConfirmed, 0.3, 0.85),
        (_, CurriculumMode::K12) => (JurisdictionLevel::National, AssumptionType::Assumed, 0.2, 0.9),
    };
    let mut resolution = JurisdictionResolution::new(request.id.clone(), level, jas, assumption_type, confidence)?;
    resolution.name = Some(request.country_name.clone());
    Ok(resolution)
}

pub struct ResolveJurisdictionNode;

#[async_trait]
impl GraphStateNode for ResolveJurisdictionNode {
    fn name(&self) -> &'static str {
        "ResolveJurisdiction"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let request = state
            .normalized_request
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no normalized request"))?;
        let resolution = resolve_jurisdiction(&request)
            .map_err(|err| GraphStateNodeError::new("E_JURISDICTION_REJECTED", false, err.to_string()))?;
        state.jurisdiction = Some(resolution);
        Ok(())
    }
}

pub struct VaultLookupNode {
    store: std::sync::Arc<dyn CurriculumStore>,
}

impl VaultLookupNode {
    pub fn new(store: std::sync::Arc<dyn CurriculumStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GraphStateNode for VaultLookupNode {
    fn name(&self) -> &'static str {
        "VaultLookup"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let request = state
            .normalized_request
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no normalized request"))?;
        let result = self
            .store
            .lookup(&request)
            .await
            .map_err(|err| GraphStateNodeError::new("E_VAULT_LOOKUP_FAILED", true, err))?;
        if result.found {
            state.curriculum_id = result.curriculum_id.clone();
        }
        state.vault_lookup = Some(result);
        Ok(())
    }
}

/// Marker node for the cold-start sub-path; logs entry and leaves state
/// otherwise untouched before the ingestion pipeline (Scout onward) runs.
pub struct EnqueueColdStartNode;

#[async_trait]
impl GraphStateNode for EnqueueColdStartNode {
    fn name(&self) -> &'static str {
        "EnqueueColdStart"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        tracing::info!(request_id = %state.request_id, "cold-start ingestion enqueued");
        Ok(())
    }
}

pub struct VaultStoreNode {
    store: std::sync::Arc<dyn CurriculumStore>,
}

impl VaultStoreNode {
    pub fn new(store: std::sync::Arc<dyn CurriculumStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GraphStateNode for VaultStoreNode {
    fn name(&self) -> &'static str {
        "VaultStore"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let request = state
            .normalized_request
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no normalized request"))?;
        let jurisdiction = state
            .jurisdiction
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no jurisdiction resolution"))?;
        let gatekeeper = state
            .gatekeeper
            .as_ref()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no gatekeeper output"))?;
        let architect = state
            .architect
            .as_ref()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no architect output"))?;
        let source = gatekeeper
            .approved
            .first()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no approved source"))?;

        let now = Utc::now().date_naive();
        let curriculum = Curriculum {
            id: state.curriculum_id.clone().unwrap_or_else(|| state.request_id.clone()),
            country_name: request.country_name.clone(),
            iso2: request.iso2.clone(),
            jurisdiction_level: jurisdiction.level,
            jurisdiction_name: jurisdiction.name.clone(),
            jurisdiction_parent_id: jurisdiction.parent.clone(),
            grade: request.grade.clone(),
            subject: request.subject.clone(),
            status: CurriculumStatus::Active,
            confidence: architect.average_confidence,
            last_verified: now,
            ttl_expiry: now + chrono::Duration::days(365),
            source_url: source.url.clone(),
            source_authority: source.authority.clone(),
        };
        let id = self
            .store
            .store(curriculum)
            .await
            .map_err(|err| GraphStateNodeError::new("E_VAULT_STORE_FAILED", true, err))?;

        let competencies = architect
            .competencies
            .iter()
            .map(|item| crate::domain::schemas::Competency {
                id: item.competency_id.clone(),
                curriculum_id: id.clone(),
                title: item.title.clone(),
                description: item.description.clone(),
                learning_outcomes: item.learning_outcomes.clone(),
                page_range: item.page_range.clone(),
                source_chunk_ids: vec![format!("{id}:{}", item.competency_id)],
                extraction_confidence: item.confidence,
            })
            .collect();
        self.store
            .store_competencies(&id, competencies)
            .await
            .map_err(|err| GraphStateNodeError::new("E_VAULT_STORE_FAILED", true, err))?;

        state.curriculum_id = Some(id);
        Ok(())
    }
}

pub struct GenerateNode {
    harness: std::sync::Arc<ProductionHarness>,
    store: std::sync::Arc<dyn CurriculumStore>,
}

impl GenerateNode {
    pub fn new(harness: std::sync::Arc<ProductionHarness>, store: std::sync::Arc<dyn CurriculumStore>) -> Self {
        Self { harness, store }
    }
}

#[async_trait]
impl GraphStateNode for GenerateNode {
    fn name(&self) -> &'static str {
        "Generate"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let curriculum_id = state
            .curriculum_id
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no curriculum id"))?;
        let curriculum = self
            .store
            .get(&curriculum_id)
            .await
            .map_err(|err| GraphStateNodeError::new("E_GENERATE_FAILED", true, err))?
            .ok_or_else(|| GraphStateNodeError::new("E_GENERATE_FAILED", false, "curriculum not found in store"))?;

        let output = self
            .harness
            .generate(&state.request_id, &curriculum)
            .await
            .map_err(|err| {
                let code = match &err {
                    CoreError::GroundingViolation { .. } => "E_GROUNDING_VIOLATION",
                    CoreError::HallucinationBlock { .. } => "E_HALLUCINATION_BLOCK",
                    CoreError::CompetencyNotFound(_) => "E_COMPETENCY_NOT_FOUND",
                    _ => "E_GENERATE_FAILED",
                };
                GraphStateNodeError::new(code, false, err.to_string())
            })?;

        let needs_review = output.coverage < 0.8 || output.citations.is_empty();
        state.generation = Some(output);
        if needs_review {
            return Err(GraphStateNodeError::new(
                "E_LOW_COVERAGE",
                false,
                "generation coverage below 0.8 or missing citations",
            ));
        }
        Ok(())
    }
}

/// Terminal state: sets `requires_human_alert` and ends the run.
pub struct HumanAlertNode;

#[async_trait]
impl GraphStateNode for HumanAlertNode {
    fn name(&self) -> &'static str {
        "HumanAlert"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        state.requires_human_alert = true;
        Ok(())
    }
}
