//! End-to-end scenarios driving `CurriculumCore::generate` through the
//! compiled orchestration graph with deterministic stub adapters (§8).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use weavegraph::domain::config::CoreConfig;
use weavegraph::domain::core::{CurriculumCore, GenerationOutcome, InMemoryIngestionJobStore};
use weavegraph::domain::harness::ProductionHarness;
use weavegraph::domain::ingestion::architect::{DocumentFetcher, PdfTextExtractor};
use weavegraph::domain::ingestion::scout::SearchAdapter;
use weavegraph::domain::ingestion::DocumentCache;
use weavegraph::domain::model_client::{DummyModelClient, ModelClient, ModelClientError, ModelId};
use weavegraph::domain::orchestration::build_orchestration_graph;
use weavegraph::domain::safeguards::ReadOnlySession;
use weavegraph::domain::schemas::{
    AuthorityHint, Competency, Curriculum, CurriculumMode, CurriculumStatus, JurisdictionLevel,
    NormalizedRequest, SearchCandidate,
};
use weavegraph::domain::shadow::InMemoryShadowLogSink;
use weavegraph::domain::store::InMemoryCurriculumStore;

/// Stands in for the ingestion-tier model during cold-start ingestion:
/// returns architect-shaped, high-confidence competencies directly (rather
/// than `DummyModelClient`'s bullet-point echo, which the architect prompt
/// never produces bullets for) so the LLM extraction branch at
/// `architect.rs`'s `extract_competencies` succeeds instead of falling back
/// to the low-confidence rule-based extractor.
struct ColdStartModelClient;

#[async_trait]
impl ModelClient for ColdStartModelClient {
    async fn generate_structured(
        &self,
        _prompt: &str,
        _model: &ModelId,
        _temperature: f32,
    ) -> Result<serde_json::Value, ModelClientError> {
        Ok(serde_json::json!({
            "competencies": [
                {
                    "competency_id": "comp-cell-structure",
                    "title": "Cell structure",
                    "description": "Describe the structure of a plant and animal cell.",
                    "learning_outcomes": ["Identify organelles", "Compare plant and animal cells"],
                    "page_range": "1-1",
                    "confidence": 0.95,
                },
                {
                    "competency_id": "comp-photosynthesis",
                    "title": "Photosynthesis",
                    "description": "Explain the process by which plants convert light energy into chemical energy.",
                    "learning_outcomes": ["Describe the light and dark reactions"],
                    "page_range": "2-2",
                    "confidence": 0.95,
                },
            ]
        }))
    }

    async fn generate_text(&self, prompt: &str, _model: &ModelId, _temperature: f32) -> Result<String, ModelClientError> {
        Ok(format!("Deterministic response for: {}", prompt.lines().next().unwrap_or_default()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelClientError> {
        Ok(texts.iter().map(|t| vec![t.len() as f32]).collect())
    }
}

struct OfficialSearchAdapter;

#[async_trait]
impl SearchAdapter for OfficialSearchAdapter {
    async fn search(&self, query: &str, _region: &str, max_results: usize) -> Result<Vec<SearchCandidate>, String> {
        Ok(vec![SearchCandidate {
            title: format!("Official syllabus: {query}"),
            url: "https://nerdc.gov.ng/biology-grade9.pdf".to_string(),
            snippet: "National curriculum document".to_string(),
            domain: "nerdc.gov.ng".to_string(),
            authority_hint: AuthorityHint::Official,
            original_rank: 0,
        }]
        .into_iter()
        .take(max_results)
        .collect())
    }
}

struct EmptySearchAdapter;

#[async_trait]
impl SearchAdapter for EmptySearchAdapter {
    async fn search(&self, _query: &str, _region: &str, _max_results: usize) -> Result<Vec<SearchCandidate>, String> {
        Ok(Vec::new())
    }
}

struct StubDocumentFetcher;

#[async_trait]
impl DocumentFetcher for StubDocumentFetcher {
    async fn fetch(&self, _url: &str, _max_bytes: u64) -> Result<Vec<u8>, String> {
        Ok(b"%PDF-1.4 stub document".to_vec())
    }
}

struct StubPdfTextExtractor;

#[async_trait]
impl PdfTextExtractor for StubPdfTextExtractor {
    async fn extract(&self, _bytes: &[u8]) -> Result<(String, u32), String> {
        Ok((
            "Competency 1: Cell structure. Describe the structure of a plant \
             and animal cell.\nCompetency 2: Photosynthesis. Explain the \
             process by which plants convert light energy into chemical energy."
                .to_string(),
            2,
        ))
    }
}

fn k12_request(id: &str, confidence: f64) -> NormalizedRequest {
    NormalizedRequest::new(
        id,
        "Grade 9 Biology curriculum for Nigeria",
        "Nigeria",
        "NG",
        "9",
        "Biology",
        "en",
        CurriculumMode::K12,
        confidence,
    )
    .unwrap()
}

fn build_core(
    search: Arc<dyn SearchAdapter>,
    ingestion_model: Arc<dyn ModelClient>,
    store: Arc<InMemoryCurriculumStore>,
) -> CurriculumCore {
    let config = CoreConfig::default();
    let harness = Arc::new(ProductionHarness::new(
        Arc::new(DummyModelClient),
        store.clone(),
        Arc::new(InMemoryShadowLogSink::default()),
        ReadOnlySession::self_test(|| Err("read-only fixture".to_string())).unwrap(),
        config.harness_config(),
    ));

    let app = build_orchestration_graph(
        search,
        Arc::new(StubDocumentFetcher),
        Arc::new(StubPdfTextExtractor),
        ingestion_model,
        Arc::new(DocumentCache::new()),
        store,
        harness,
    );

    CurriculumCore::new(app, Arc::new(InMemoryIngestionJobStore::new()))
}

#[tokio::test]
async fn warm_vault_hit_returns_approved_artifact() {
    let store = Arc::new(InMemoryCurriculumStore::new());
    let today = Utc::now().date_naive();
    store.seed(
        Curriculum {
            id: "curr-warm".into(),
            country_name: "Nigeria".into(),
            iso2: "NG".into(),
            jurisdiction_level: JurisdictionLevel::National,
            jurisdiction_name: None,
            jurisdiction_parent_id: None,
            grade: "9".into(),
            subject: "Biology".into(),
            status: CurriculumStatus::Active,
            confidence: 0.95,
            last_verified: today,
            ttl_expiry: today + chrono::Duration::days(365),
            source_url: "https://nerdc.gov.ng/biology-grade9.pdf".into(),
            source_authority: "NERDC".into(),
        },
        vec![Competency {
            id: "comp-1".into(),
            curriculum_id: "curr-warm".into(),
            title: "Cell structure".into(),
            description: "Describe the structure of a plant and animal cell.".into(),
            learning_outcomes: vec!["Identify organelles".into()],
            page_range: "1-2".into(),
            source_chunk_ids: vec!["chunk-1".into()],
            extraction_confidence: 0.9,
        }],
    );

    let core = build_core(Arc::new(EmptySearchAdapter), Arc::new(DummyModelClient), store);
    let outcome = core.generate(k12_request("req-warm", 0.92)).await.unwrap();

    match outcome {
        GenerationOutcome::Approved(output) => {
            assert!(output.coverage >= 0.8);
            assert!(!output.citations.is_empty());
        }
        other => panic!("expected Approved, got {other:?}"),
    }
}

#[tokio::test]
async fn cold_start_ingestion_reaches_generate_and_approves() {
    let store = Arc::new(InMemoryCurriculumStore::new());
    let core = build_core(Arc::new(OfficialSearchAdapter), Arc::new(ColdStartModelClient), store);
    let outcome = core.generate(k12_request("req-cold", 0.92)).await.unwrap();

    match outcome {
        GenerationOutcome::Approved(output) => {
            assert!(!output.citations.is_empty());
        }
        other => panic!("expected Approved after cold-start ingestion, got {other:?}"),
    }
}

#[tokio::test]
async fn cold_start_with_no_search_results_ends_in_human_review() {
    let store = Arc::new(InMemoryCurriculumStore::new());
    let core = build_core(Arc::new(EmptySearchAdapter), Arc::new(DummyModelClient), store);
    let outcome = core.generate(k12_request("req-no-results", 0.92)).await.unwrap();

    assert!(matches!(outcome, GenerationOutcome::NeedsReview { .. }));
}

#[tokio::test]
async fn pending_review_job_is_recorded_and_can_be_approved() {
    let store = Arc::new(InMemoryCurriculumStore::new());
    let core = build_core(Arc::new(EmptySearchAdapter), Arc::new(DummyModelClient), store);
    core.generate(k12_request("req-for-review", 0.92)).await.unwrap();

    let pending = core.admin_list_pending_jobs().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].request_id, "req-for-review");

    core.admin_approve(&pending[0].id).await.unwrap();
    assert!(core.admin_list_pending_jobs().await.unwrap().is_empty());
}
