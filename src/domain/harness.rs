//! Production harness (C9): the nine ordered steps that turn a curriculum
//! into an approved, grounded, governed artifact (§4.8).
//!
//! Grounded on `original_source/src/production/harness.py`'s step ordering
//! (the module body itself was import/docstring-only in the retrieved
//! source, so the exact sequence follows §4.8's explicit list) and wires
//! together `governance`, `grounding`, `shadow`, and `safeguards` the way
//! the teacher's `App::invoke` wires a compiled graph around a single
//! `AppRunner` session.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::errors::CoreError;
use crate::domain::governance::{self, DisclaimerContext};
use crate::domain::grounding::{GroundingCompetency, GroundingVerdict, GroundingVerifier};
use crate::domain::model_client::ModelClient;
use crate::domain::safeguards::{CircuitBreaker, ReadOnlySession};
use crate::domain::schemas::{
    Citation, Competency, Curriculum, CurriculumMode, GenerationOutput, GenerationStatus,
    JurisdictionLevel, ProvenanceBlock, ShadowEnvironment, ShadowLog, SourceCitation,
};
use crate::domain::shadow::{self, AlertThresholds, HallucinationAction, ShadowLogSink};
use crate::domain::store::CurriculumStore;

/// Detects k12/university mode from a curriculum's stored jurisdiction
/// level, per §4.8 step 2.
pub fn detect_mode(curriculum: &Curriculum) -> CurriculumMode {
    match curriculum.jurisdiction_level {
        JurisdictionLevel::University | JurisdictionLevel::Department => CurriculumMode::Syllabus,
        _ => CurriculumMode::K12,
    }
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub grounding_threshold: f32,
    pub embedding_provider_name: String,
    pub alert_thresholds: AlertThresholds,
    pub hallucination_action: HallucinationAction,
    pub shadow_storage_root: String,
    pub primary_model: String,
    pub shadow_model: String,
    pub shadow_seed: u64,
    pub primary_temperature: f32,
    pub shadow_temperature: f32,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            grounding_threshold: 0.7,
            embedding_provider_name: "default".to_string(),
            alert_thresholds: AlertThresholds::default(),
            hallucination_action: HallucinationAction::default(),
            shadow_storage_root: "storage".to_string(),
            primary_model: "reasoning-tier".to_string(),
            shadow_model: "reasoning-tier-shadow".to_string(),
            shadow_seed: 0,
            primary_temperature: 0.3,
            shadow_temperature: 0.7,
        }
    }
}

/// Carries the per-request read-only guarantee: a `ProductionHarness` can
/// only be built from one, forcing the DB self-test (§4.8 step 1) to have
/// already succeeded.
pub struct ProductionHarness {
    model: Arc<dyn ModelClient>,
    store: Arc<dyn CurriculumStore>,
    shadow_sink: Arc<dyn ShadowLogSink>,
    breaker: Mutex<CircuitBreaker>,
    config: HarnessConfig,
    _readonly: ReadOnlySession,
}

impl ProductionHarness {
    pub fn new(
        model: Arc<dyn ModelClient>,
        store: Arc<dyn CurriculumStore>,
        shadow_sink: Arc<dyn ShadowLogSink>,
        readonly: ReadOnlySession,
        config: HarnessConfig,
    ) -> Self {
        Self {
            model,
            store,
            shadow_sink,
            breaker: Mutex::new(CircuitBreaker::default()),
            config,
            _readonly: readonly,
        }
    }

    async fn generate_markdown(
        &self,
        curriculum: &Curriculum,
        competencies: &[Competency],
        model_id: &str,
        temperature: f32,
    ) -> Result<String, CoreError> {
        let prompt = format!(
            "Generate curriculum content for {} {} ({}) grounded strictly in these competencies:\n{}",
            curriculum.subject,
            curriculum.grade,
            curriculum.country_name,
            competencies
                .iter()
                .map(|c| format!("- {}: {}", c.title, c.description))
                .collect::<Vec<_>>()
                .join("\n"),
        );
        self.model
            .generate_text(&prompt, &model_id.to_string(), temperature)
            .await
            .map_err(|err| CoreError::Config(format!("primary generation failed: {err}")))
    }

    fn build_provenance(curriculum: &Curriculum) -> ProvenanceBlock {
        ProvenanceBlock {
            curriculum_id: curriculum.id.clone(),
            source_list: vec![SourceCitation {
                url: curriculum.source_url.clone(),
                authority: curriculum.source_authority.clone(),
                fetch_date: Utc::now(),
                page_range: None,
                source_id: None,
            }],
            retrieval_timestamp: Utc::now(),
            replica_version: "v1.0".to_string(),
            extraction_confidence: curriculum.confidence,
        }
    }

    /// Runs §4.8 steps 2-9 for a curriculum that has already passed ingestion
    /// and is recorded in the store. Step 1 (read-only self-test) is proven
    /// by construction via the held [`ReadOnlySession`].
    pub async fn generate(&self, request_id: &str, curriculum: &Curriculum) -> Result<GenerationOutput, CoreError> {
        let mode = detect_mode(curriculum);

        let competencies = self
            .store
            .competencies(&curriculum.id)
            .await
            .map_err(|err| CoreError::Config(format!("competency fetch failed: {err}")))?;
        if competencies.is_empty() {
            return Err(CoreError::CompetencyNotFound(curriculum.id.clone()));
        }

        let primary_markdown = self
            .generate_markdown(curriculum, &competencies, &self.config.primary_model, self.config.primary_temperature)
            .await?;

        let citations: Vec<Citation> = competencies
            .iter()
            .map(|c| Citation {
                competency_id: c.id.clone(),
                page_range: c.page_range.clone(),
            })
            .collect();

        let grounding_competencies: Vec<GroundingCompetency> = competencies
            .iter()
            .map(|c| GroundingCompetency {
                id: c.id.clone(),
                text: format!("{} {}", c.title, c.description),
            })
            .collect();

        let verifier = GroundingVerifier::new(
            self.model.clone(),
            self.config.embedding_provider_name.clone(),
            self.config.grounding_threshold,
        );
        let report = verifier
            .verify_artifact(&primary_markdown, &grounding_competencies, mode)
            .await
            .map_err(|err| CoreError::Config(format!("grounding verification failed: {err}")))?;
        if report.verdict == GroundingVerdict::Fail {
            return Err(CoreError::GroundingViolation {
                ungrounded_sentences: report.ungrounded_sentences,
            });
        }

        let coverage = if report.total_sentences == 0 {
            1.0
        } else {
            report.grounding_rate
        };
        let mut output = GenerationOutput {
            id: format!("gen-{request_id}"),
            markdown: primary_markdown,
            citations,
            coverage,
            source_attribution: format!("Based on official curriculum from: {}", curriculum.source_url),
            status: GenerationStatus::Approved,
            metadata: None,
        };

        let provenance = Self::build_provenance(curriculum);
        governance::enforce(&mut output, mode, &provenance, &DisclaimerContext::default())
            .map_err(|err| CoreError::Config(format!("governance violation: {err}")))?;

        self.run_shadow(request_id, curriculum, &output).await?;

        Ok(output)
    }

    /// §4.8 step 7-8: shadow generation, delta computation, persistence, and
    /// the hallucination gate. Guarded by the circuit breaker — when open,
    /// shadow execution is skipped entirely and no alert can fire.
    async fn run_shadow(&self, request_id: &str, curriculum: &Curriculum, primary: &GenerationOutput) -> Result<(), CoreError> {
        let allowed = self.breaker.lock().await.allow_request();
        if !allowed {
            tracing::warn!(request_id, "circuit breaker open, skipping shadow execution");
            return Ok(());
        }

        let competencies = self
            .store
            .competencies(&curriculum.id)
            .await
            .map_err(|err| CoreError::Config(format!("competency fetch failed: {err}")))?;
        let shadow_result = self
            .generate_markdown(curriculum, &competencies, &self.config.shadow_model, self.config.shadow_temperature)
            .await;

        let shadow_markdown = match shadow_result {
            Ok(markdown) => markdown,
            Err(err) => {
                self.breaker.lock().await.record_failure();
                return Err(err);
            }
        };

        let embed_result = self
            .model
            .embed(&[primary.markdown.clone(), shadow_markdown.clone()])
            .await;
        let (primary_embedding, shadow_embedding) = match embed_result {
            Ok(vectors) if vectors.len() == 2 => (vectors[0].clone(), vectors[1].clone()),
            _ => {
                self.breaker.lock().await.record_failure();
                return Ok(());
            }
        };

        self.breaker.lock().await.record_success();

        let metrics = shadow::compute_metrics(&primary.markdown, &shadow_markdown, &primary_embedding, &shadow_embedding);
        let alerts = shadow::evaluate_alerts(&metrics, &self.config.alert_thresholds);

        let now = Utc::now();
        let log = ShadowLog {
            job_id: format!("shadow-{request_id}"),
            request_id: request_id.to_string(),
            curriculum_id: curriculum.id.clone(),
            timestamp: now,
            primary_summary: shadow::run_summary(&primary.markdown),
            shadow_summary: shadow::run_summary(&shadow_markdown),
            metrics,
            alerts: alerts.iter().map(|a| a.to_string()).collect(),
            environment: ShadowEnvironment {
                primary_model_id: self.config.primary_model.clone(),
                shadow_model_id: self.config.shadow_model.clone(),
                embedding_model: self.config.embedding_provider_name.clone(),
                seed: self.config.shadow_seed,
            },
            storage_path: shadow::storage_path(&self.config.shadow_storage_root, &format!("shadow-{request_id}"), now),
        };
        self.shadow_sink
            .write(&log)
            .await
            .map_err(|err| CoreError::Config(format!("shadow log write failed: {err}")))?;

        if alerts.contains(&"HALLUCINATION_RISK_HIGH") && self.config.hallucination_action == HallucinationAction::Block {
            return Err(CoreError::HallucinationBlock {
                extra_topic_rate: metrics.extra_topic_rate,
                alerts: log.alerts,
                request_id: request_id.to_string(),
            });
        }
        Ok(())
    }
}
