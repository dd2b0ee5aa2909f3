//! Typed records for every cross-component message in the curriculum core.
//!
//! Every boundary in this crate speaks these types rather than loose JSON —
//! "schemas are law": an invariant violated here halts the request instead of
//! being silently repaired (§4.1).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Curriculum mode a request is ultimately routed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurriculumMode {
    K12,
    Syllabus,
}

/// A request after intent classification and field normalization.
///
/// Invariant: `confidence >= 0.7` or the request must be rejected at
/// creation — enforced by [`NormalizedRequest::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub id: String,
    pub raw_prompt: String,
    pub country_name: String,
    pub iso2: String,
    pub grade: String,
    pub subject: String,
    pub language: String,
    pub institution: Option<String>,
    pub department: Option<String>,
    pub mode: CurriculumMode,
    pub confidence: f64,
}

impl NormalizedRequest {
    /// Construct a request, enforcing the confidence floor invariant.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        raw_prompt: impl Into<String>,
        country_name: impl Into<String>,
        iso2: impl Into<String>,
        grade: impl Into<String>,
        subject: impl Into<String>,
        language: impl Into<String>,
        mode: CurriculumMode,
        confidence: f64,
    ) -> Result<Self, crate::domain::errors::CoreError> {
        if confidence < 0.7 {
            return Err(crate::domain::errors::CoreError::SchemaValidation(
                crate::domain::validation::SchemaValidationError {
                    schema: "NormalizedRequest",
                    field_errors: vec![format!(
                        "confidence {confidence:.2} below required floor 0.7"
                    )],
                },
            ));
        }
        Ok(Self {
            id: id.into(),
            raw_prompt: raw_prompt.into(),
            country_name: country_name.into(),
            iso2: iso2.into(),
            grade: grade.into(),
            subject: subject.into(),
            language: language.into(),
            institution: None,
            department: None,
            mode,
            confidence,
        })
    }
}

/// Jurisdiction level granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JurisdictionLevel {
    National,
    State,
    County,
    University,
    Department,
}

/// How a jurisdiction was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssumptionType {
    Assumed,
    UserConfirmed,
    Explicit,
}

/// The resolved jurisdiction for a normalized request, with its ambiguity
/// score (JAS).
///
/// Invariants: `jas > 0.7 && assumption_type == Assumed` is rejected;
/// `confidence < 0.6` is rejected (the caller must ask the user instead).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurisdictionResolution {
    pub request_id: String,
    pub level: JurisdictionLevel,
    pub name: Option<String>,
    pub parent: Option<String>,
    pub jas: f64,
    pub assumption_type: AssumptionType,
    pub confidence: f64,
}

impl JurisdictionResolution {
    pub fn new(
        request_id: impl Into<String>,
        level: JurisdictionLevel,
        jas: f64,
        assumption_type: AssumptionType,
        confidence: f64,
    ) -> Result<Self, crate::domain::errors::CoreError> {
        let mut field_errors = Vec::new();
        if jas > 0.7 && assumption_type == AssumptionType::Assumed {
            field_errors.push(format!(
                "jas {jas:.2} exceeds 0.7 while assumption_type is Assumed"
            ));
        }
        if confidence < 0.6 {
            field_errors.push(format!(
                "confidence {confidence:.2} below required floor 0.6"
            ));
        }
        if !field_errors.is_empty() {
            return Err(crate::domain::errors::CoreError::SchemaValidation(
                crate::domain::validation::SchemaValidationError {
                    schema: "JurisdictionResolution",
                    field_errors,
                },
            ));
        }
        Ok(Self {
            request_id: request_id.into(),
            level,
            name: None,
            parent: None,
            jas,
            assumption_type,
            confidence,
        })
    }
}

/// Source tag for a vault hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VaultSourceTag {
    Cache,
    Parent,
    National,
}

/// Result of consulting the curriculum store for an existing match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultLookupResult {
    pub request_id: String,
    pub found: bool,
    pub curriculum_id: Option<String>,
    pub match_confidence: Option<f64>,
    pub source_tag: Option<VaultSourceTag>,
}

impl VaultLookupResult {
    /// Serves immediately without a refresh warning.
    pub fn serves_fresh(&self) -> bool {
        self.found && self.match_confidence.unwrap_or(0.0) >= 0.8
    }

    /// Serves, but the caller should attach a refresh warning.
    pub fn serves_stale(&self) -> bool {
        self.found && self.match_confidence.unwrap_or(0.0) < 0.8
    }

    /// Triggers the cold-start ingestion sub-path.
    pub fn is_cold_start(&self) -> bool {
        !self.found
    }
}

/// Lifecycle status of a stored curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurriculumStatus {
    Active,
    Stale,
    Conflicted,
}

/// A curriculum record, created by VaultStore and updated only through
/// ingestion; generation never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curriculum {
    pub id: String,
    pub country_name: String,
    pub iso2: String,
    pub jurisdiction_level: JurisdictionLevel,
    pub jurisdiction_name: Option<String>,
    pub jurisdiction_parent_id: Option<String>,
    pub grade: String,
    pub subject: String,
    pub status: CurriculumStatus,
    pub confidence: f64,
    pub last_verified: NaiveDate,
    pub ttl_expiry: NaiveDate,
    pub source_url: String,
    pub source_authority: String,
}

/// An atomic learning objective with source citations.
///
/// Invariant (grounded): `source_chunk_ids` must be non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competency {
    pub id: String,
    pub curriculum_id: String,
    pub title: String,
    pub description: String,
    pub learning_outcomes: Vec<String>,
    pub page_range: String,
    pub source_chunk_ids: Vec<String>,
    pub extraction_confidence: f64,
}

impl Competency {
    pub fn is_grounded(&self) -> bool {
        !self.source_chunk_ids.is_empty()
    }
}

/// Status shared by every ingestion agent's I/O envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Success,
    Failed,
    LowConfidence,
    Conflicted,
}

/// Whether a search result hints at an official government/ministry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityHint {
    Official,
    Unknown,
}

/// License classification assigned by the Gatekeeper agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseType {
    Government,
    PublicDomain,
    CreativeCommons,
    Educational,
    Restricted,
    Unknown,
}

impl LicenseType {
    /// Gatekeeper rejects these outright.
    pub fn is_rejected(self) -> bool {
        matches!(self, LicenseType::Restricted | LicenseType::Unknown)
    }
}

/// A single search result surfaced by a [`SearchAdapter`](crate::domain::ingestion::scout::SearchAdapter).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
    pub authority_hint: AuthorityHint,
    pub original_rank: usize,
}

/// Scout agent output envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutOutput {
    pub job_id: String,
    pub candidates: Vec<SearchCandidate>,
    pub status: AgentStatus,
}

/// A candidate that survived Gatekeeper license/authority review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovedSource {
    pub url: String,
    pub domain: String,
    pub authority: String,
    pub license: LicenseType,
    pub confidence: f64,
    pub publication_year: Option<i32>,
}

/// Gatekeeper agent output envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatekeeperOutput {
    pub job_id: String,
    pub approved: Vec<ApprovedSource>,
    pub status: AgentStatus,
}

/// A snapshot of a downloaded curriculum document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumSnapshot {
    pub file_path: String,
    pub checksum: String,
    pub pages: u32,
}

/// A single extracted competency before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyItem {
    pub competency_id: String,
    pub title: String,
    pub description: String,
    pub learning_outcomes: Vec<String>,
    pub page_range: String,
    pub confidence: f64,
}

/// Architect agent output envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectOutput {
    pub job_id: String,
    pub snapshot: CurriculumSnapshot,
    pub competencies: Vec<CompetencyItem>,
    pub average_confidence: f64,
    pub status: AgentStatus,
}

/// Embedder agent output envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedderOutput {
    pub curriculum_id: String,
    pub embedded_chunks: usize,
    pub embedding_model: String,
    pub status: AgentStatus,
}

/// A markdown citation linking a competency to a page range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub competency_id: String,
    pub page_range: String,
}

/// Output status of a completed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Approved,
    Rejected,
}

/// Governance-attached metadata (§4.6 steps 2-3): the validated provenance
/// carried alongside the artifact, plus a flag raised when the source
/// extraction wasn't fully confident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub provenance: ProvenanceBlock,
    pub low_confidence_extraction: bool,
}

/// The artifact produced by a generation call.
///
/// Invariant: `status == Approved` implies `coverage >= 0.8` and a non-empty
/// `citations` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub id: String,
    pub markdown: String,
    pub citations: Vec<Citation>,
    pub coverage: f64,
    pub source_attribution: String,
    pub status: GenerationStatus,
    pub metadata: Option<GenerationMetadata>,
}

impl GenerationOutput {
    pub fn is_well_formed(&self) -> bool {
        match self.status {
            GenerationStatus::Approved => {
                self.coverage >= 0.8 && !self.citations.is_empty() && !self.source_attribution.is_empty()
            }
            GenerationStatus::Rejected => true,
        }
    }
}

/// A single source citation inside a [`ProvenanceBlock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub url: String,
    pub authority: String,
    pub fetch_date: DateTime<Utc>,
    pub page_range: Option<String>,
    pub source_id: Option<String>,
}

/// Strict schema for data provenance attached to every artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceBlock {
    pub curriculum_id: String,
    pub source_list: Vec<SourceCitation>,
    pub retrieval_timestamp: DateTime<Utc>,
    #[serde(default = "default_replica_version")]
    pub replica_version: String,
    pub extraction_confidence: f64,
}

fn default_replica_version() -> String {
    "v1.0".to_string()
}

/// Counters summarizing one side (primary or shadow) of a generation pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub topic_count: usize,
    pub sentence_count: usize,
    pub char_count: usize,
}

/// The five divergence metrics between a primary and shadow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowMetrics {
    pub topic_set_delta: f64,
    pub ordering_delta: f64,
    pub content_delta: f64,
    pub extra_topic_rate: f64,
    pub omission_rate: f64,
}

/// The model/embedding/seed environment a shadow run executed under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowEnvironment {
    pub primary_model_id: String,
    pub shadow_model_id: String,
    pub embedding_model: String,
    pub seed: u64,
}

/// Persisted shadow-execution delta log (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowLog {
    pub job_id: String,
    pub request_id: String,
    pub curriculum_id: String,
    pub timestamp: DateTime<Utc>,
    pub primary_summary: RunSummary,
    pub shadow_summary: RunSummary,
    pub metrics: ShadowMetrics,
    pub alerts: Vec<String>,
    pub environment: ShadowEnvironment,
    pub storage_path: String,
}

/// The orchestration graph's execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Normal,
    Shadow,
}

/// Cost-optimization tier, escalated on node failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    Tier0,
    Tier1,
    Tier2,
}

impl FallbackTier {
    /// Move one step up the escalation ladder; saturates at `Tier2`.
    pub fn escalate(self) -> Self {
        match self {
            FallbackTier::Tier0 => FallbackTier::Tier1,
            FallbackTier::Tier1 | FallbackTier::Tier2 => FallbackTier::Tier2,
        }
    }
}

/// Per-node lifecycle status recorded in [`GraphState::node_history`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
    Halted,
}

/// One entry in the ordered node-execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub node_name: String,
    pub status: NodeStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub retry_count: u8,
    pub error_message: Option<String>,
    pub output_summary: Option<serde_json::Value>,
}

impl NodeExecution {
    pub fn started(node_name: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            node_name: node_name.into(),
            status: NodeStatus::Running,
            started_at: Some(started_at),
            completed_at: None,
            retry_count: 0,
            error_message: None,
            output_summary: None,
        }
    }

    /// Node lifecycle cap: at most 2 total attempts per node name.
    pub fn can_retry(&self) -> bool {
        self.retry_count < 2
    }
}

/// Per-request cost caps (§4.4) and running totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostTracking {
    pub tokens_used: u64,
    pub estimated_cost_usd: f64,
    pub model_calls: u32,
}

impl Default for CostTracking {
    fn default() -> Self {
        Self {
            tokens_used: 0,
            estimated_cost_usd: 0.0,
            model_calls: 0,
        }
    }
}

/// Per-request cap: a request halts before exceeding this.
pub const PER_REQUEST_CAP_USD: f64 = 0.02;
/// Logical daily cap tracked process-wide by the model client (§5).
pub const DAILY_CAP_USD: f64 = 2.00;

impl CostTracking {
    /// Whether adding `additional_cost_usd` keeps the request within the
    /// per-request cap.
    pub fn is_within_budget(&self, additional_cost_usd: f64) -> bool {
        self.estimated_cost_usd + additional_cost_usd <= PER_REQUEST_CAP_USD
    }

    pub fn add_cost(&mut self, tokens: u64, cost_usd: f64) {
        self.tokens_used += tokens;
        self.estimated_cost_usd += cost_usd;
        self.model_calls += 1;
    }
}

/// Explicit error-propagation fields carried on [`GraphState`] (§7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorFlags {
    pub has_error: bool,
    pub error_node: Option<String>,
    pub error_code: Option<String>,
    pub retryable: bool,
    pub message: Option<String>,
}

/// The single shared state flowing through the orchestration graph (§3, §9).
///
/// Carried inside `VersionedState.extra["graph_state"]` as a serialized
/// payload by [`crate::domain::orchestration::GraphStateNode`] rather than as
/// a parallel state container, so it rides the engine's existing versioned
/// merge machinery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphState {
    pub request_id: String,
    pub mode: Option<ExecutionMode>,
    pub fallback_tier: Option<FallbackTier>,
    pub node_history: Vec<NodeExecution>,
    pub normalized_request: Option<NormalizedRequest>,
    pub jurisdiction: Option<JurisdictionResolution>,
    pub vault_lookup: Option<VaultLookupResult>,
    pub scout: Option<ScoutOutput>,
    pub gatekeeper: Option<GatekeeperOutput>,
    pub architect: Option<ArchitectOutput>,
    pub embedder: Option<EmbedderOutput>,
    pub curriculum_id: Option<String>,
    pub generation: Option<GenerationOutput>,
    pub cost: CostTracking,
    pub errors: ErrorFlags,
    pub requires_human_alert: bool,
}

impl GraphState {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            fallback_tier: Some(FallbackTier::Tier0),
            ..Default::default()
        }
    }

    /// Marks `node_name` RUNNING and pushes a fresh execution record.
    pub fn record_node_start(&mut self, node_name: impl Into<String>, now: DateTime<Utc>) {
        self.node_history.push(NodeExecution::started(node_name, now));
    }

    /// Marks the most recent execution record for `node_name` SUCCESS and
    /// clears the transient error flags.
    pub fn record_node_success(&mut self, node_name: &str, now: DateTime<Utc>) {
        if let Some(exec) = self.latest_execution_mut(node_name) {
            exec.status = NodeStatus::Success;
            exec.completed_at = Some(now);
        }
        self.errors = ErrorFlags::default();
    }

    /// Marks the most recent execution record FAILED, sets error metadata,
    /// and escalates the fallback tier if the node can still retry.
    pub fn record_node_failure(
        &mut self,
        node_name: &str,
        now: DateTime<Utc>,
        error_code: impl Into<String>,
        retryable: bool,
        message: impl Into<String>,
    ) {
        let error_code = error_code.into();
        let message = message.into();
        let can_retry = {
            let exec = self
                .latest_execution_mut(node_name)
                .expect("record_node_start must precede record_node_failure");
            exec.status = NodeStatus::Failed;
            exec.completed_at = Some(now);
            exec.retry_count += 1;
            exec.error_message = Some(message.clone());
            exec.can_retry()
        };
        self.errors = ErrorFlags {
            has_error: true,
            error_node: Some(node_name.to_string()),
            error_code: Some(error_code),
            retryable,
            message: Some(message),
        };
        if can_retry {
            self.fallback_tier = Some(self.fallback_tier.unwrap_or(FallbackTier::Tier0).escalate());
        }
    }

    /// Whether the named node has at least one more attempt available.
    pub fn can_retry_node(&self, node_name: &str) -> bool {
        self.latest_execution(node_name)
            .map(NodeExecution::can_retry)
            .unwrap_or(true)
    }

    pub fn escalate_fallback_tier(&mut self) {
        self.fallback_tier = Some(self.fallback_tier.unwrap_or(FallbackTier::Tier0).escalate());
    }

    /// `should_halt` per §4.4: unrecoverable error, tier_2 with a fresh
    /// error, or exceeded cost budget.
    pub fn should_halt(&self) -> bool {
        if self.errors.has_error && !self.errors.retryable {
            return true;
        }
        if self.fallback_tier == Some(FallbackTier::Tier2) && self.errors.has_error {
            return true;
        }
        self.cost.estimated_cost_usd > PER_REQUEST_CAP_USD
    }

    fn latest_execution(&self, node_name: &str) -> Option<&NodeExecution> {
        self.node_history
            .iter()
            .rev()
            .find(|e| e.node_name == node_name)
    }

    fn latest_execution_mut(&mut self, node_name: &str) -> Option<&mut NodeExecution> {
        self.node_history
            .iter_mut()
            .rev()
            .find(|e| e.node_name == node_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_request_rejects_low_confidence() {
        let result = NormalizedRequest::new(
            "req-1",
            "Grade 9 Biology",
            "Nigeria",
            "NG",
            "9",
            "Biology",
            "en",
            CurriculumMode::K12,
            0.5,
        );
        assert!(result.is_err());
    }

    #[test]
    fn jurisdiction_rejects_high_jas_with_assumed() {
        let result = JurisdictionResolution::new(
            "req-1",
            JurisdictionLevel::National,
            0.9,
            AssumptionType::Assumed,
            0.9,
        );
        assert!(result.is_err());
    }

    #[test]
    fn fallback_tier_escalates_and_saturates() {
        assert_eq!(FallbackTier::Tier0.escalate(), FallbackTier::Tier1);
        assert_eq!(FallbackTier::Tier1.escalate(), FallbackTier::Tier2);
        assert_eq!(FallbackTier::Tier2.escalate(), FallbackTier::Tier2);
    }

    #[test]
    fn graph_state_tracks_node_lifecycle() {
        let mut state = GraphState::new("req-1");
        let t0 = Utc::now();
        state.record_node_start("Scout", t0);
        assert!(state.can_retry_node("Scout"));
        state.record_node_failure("Scout", t0, "E_TIMEOUT", true, "timed out");
        assert_eq!(state.fallback_tier, Some(FallbackTier::Tier1));
        state.record_node_start("Scout", t0);
        state.record_node_failure("Scout", t0, "E_TIMEOUT", true, "timed out again");
        assert!(!state.can_retry_node("Scout"));
    }

    #[test]
    fn cost_tracking_budget() {
        let mut cost = CostTracking::default();
        assert!(cost.is_within_budget(0.01));
        cost.add_cost(1000, 0.015);
        assert!(!cost.is_within_budget(0.01));
    }
}
