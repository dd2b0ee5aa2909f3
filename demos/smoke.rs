//! Smoke run: wires an in-memory `CurriculumCore` end to end with stub
//! outbound adapters and drives one cold-start request through the full
//! orchestration graph.
//!
//! ```bash
//! cargo run --bin smoke
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use miette::{IntoDiagnostic, Result};
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use weavegraph::domain::config::CoreConfig;
use weavegraph::domain::core::{CurriculumCore, InMemoryIngestionJobStore};
use weavegraph::domain::ingestion::architect::{DocumentFetcher, PdfTextExtractor};
use weavegraph::domain::ingestion::scout::SearchAdapter;
use weavegraph::domain::ingestion::DocumentCache;
use weavegraph::domain::model_client::DummyModelClient;
use weavegraph::domain::orchestration::build_orchestration_graph;
use weavegraph::domain::safeguards::ReadOnlySession;
use weavegraph::domain::schemas::{AuthorityHint, CurriculumMode, NormalizedRequest, SearchCandidate};
use weavegraph::domain::shadow::InMemoryShadowLogSink;
use weavegraph::domain::store::InMemoryCurriculumStore;

struct StubSearchAdapter;

#[async_trait]
impl SearchAdapter for StubSearchAdapter {
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,weavegraph=info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(ErrorLayer::default())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    miette::set_panic_hook();

    info!("smoke: building orchestration graph with stub adapters");

    let store = Arc::new(InMemoryCurriculumStore::new());
    let config = CoreConfig::default();
    let harness = Arc::new(weavegraph::domain::harness::ProductionHarness::new(
        Arc::new(DummyModelClient),
        store.clone(),
        Arc::new(InMemoryShadowLogSink::default()),
        ReadOnlySession::self_test(|| Err("read-only fixture".to_string())).into_diagnostic()?,
        config.harness_config(),
    ));

    let app = build_orchestration_graph(
        Arc::new(StubSearchAdapter),
        Arc::new(StubDocumentFetcher),
        Arc::new(StubPdfTextExtractor),
        Arc::new(DummyModelClient),
        Arc::new(DocumentCache::new()),
        store,
        harness,
    );

    let core = CurriculumCore::new(app, Arc::new(InMemoryIngestionJobStore::new()));

    let request = NormalizedRequest::new(
        "smoke-req-1",
        "Grade 9 Biology curriculum for Nigeria",
        "Nigeria",
        "NG",
        "9",
        "Biology",
        "en",
        CurriculumMode::K12,
        0.92,
    )
    .into_diagnostic()?;

    let outcome = core.generate(request).await.into_diagnostic()?;
    info!(?outcome, "smoke run finished");

    Ok(())
}
