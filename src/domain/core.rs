//! `CurriculumCore` facade (§6): the inbound RPC surface —
//! `generate`/`admin.list_pending_jobs`/`admin.approve`/`admin.reject` —
//! wired around one compiled orchestration graph, analogous to how the
//! teacher exposes a compiled `App` through `App::invoke` rather than
//! letting callers poke at `AppRunner` directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::CoreError;
use crate::domain::orchestration::{read_graph_state, GRAPH_STATE_KEY};
use crate::app::App;
use crate::domain::schemas::{GenerationOutput, NormalizedRequest};
use crate::state::VersionedState;

/// Status of an ingestion job awaiting human review, opened whenever a
/// request routes to `HumanAlert` (§6's "ingestion review loop").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionJobStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionJob {
    pub id: String,
    pub request_id: String,
    pub reason: String,
    pub status: IngestionJobStatus,
}

/// Persists the ingestion review queue. A trait boundary per the Non-goals
/// ("persistence schemas...out of scope" — only the interface is specified).
#[async_trait]
pub trait IngestionJobStore: Send + Sync {
    async fn create_pending(&self, request_id: &str, reason: &str) -> Result<String, String>;
    async fn list_pending(&self) -> Result<Vec<IngestionJob>, String>;
    async fn approve(&self, job_id: &str) -> Result<(), String>;
    async fn reject(&self, job_id: &str) -> Result<(), String>;
}

/// In-process job queue for tests and the smoke demo.
#[derive(Default)]
pub struct InMemoryIngestionJobStore {
    jobs: parking_lot::RwLock<Vec<IngestionJob>>,
}

impl InMemoryIngestionJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IngestionJobStore for InMemoryIngestionJobStore {
    async fn create_pending(&self, request_id: &str, reason: &str) -> Result<String, String> {
        let id = format!("job-{request_id}");
        self.jobs.write().push(IngestionJob {
            id: id.clone(),
            request_id: request_id.to_string(),
            reason: reason.to_string(),
            status: IngestionJobStatus::Pending,
        });
        Ok(id)
    }

    async fn list_pending(&self) -> Result<Vec<IngestionJob>, String> {
        Ok(self
            .jobs
            .read()
            .iter()
            .filter(|j| j.status == IngestionJobStatus::Pending)
            .cloned()
            .collect())
    }

    async fn approve(&self, job_id: &str) -> Result<(), String> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| format!("no such job: {job_id}"))?;
        job.status = IngestionJobStatus::Approved;
        Ok(())
    }

    async fn reject(&self, job_id: &str) -> Result<(), String> {
        let mut jobs = self.jobs.write();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == job_id)
            .ok_or_else(|| format!("no such job: {job_id}"))?;
        job.status = IngestionJobStatus::Rejected;
        Ok(())
    }
}

/// The caller-visible result of a `generate` call (§7 "user-visible
/// behavior"): exactly one of approved/halted/needs_review, never a partial
/// artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Approved(GenerationOutput),
    Halted { error_code: String, message: String },
    NeedsReview { reason: String },
}

pub struct CurriculumCore {
    app: App,
    job_store: Arc<dyn IngestionJobStore>,
}

impl CurriculumCore {
    pub fn new(app: App, job_store: Arc<dyn IngestionJobStore>) -> Self {
        Self { app, job_store }
    }

    /// Runs the orchestration graph for `request` end to end and maps its
    /// terminal `GraphState` onto the caller-visible outcome union.
    pub async fn generate(&self, request: NormalizedRequest) -> Result<GenerationOutcome, CoreError> {
        let mut graph_state = crate::domain::schemas::GraphState::new(request.id.clone());
        graph_state.normalized_request = Some(request.clone());
        let graph_state_value = serde_json::to_value(&graph_state)
            .map_err(|err| CoreError::Config(format!("failed to seed graph state: {err}")))?;

        let initial = VersionedState::builder()
            .with_user_message(&request.raw_prompt)
            .with_extra(GRAPH_STATE_KEY, graph_state_value)
            .build();

        let final_state = self.app.invoke(initial).await?;
        let snapshot = final_state.snapshot();
        let state = read_graph_state(&snapshot, &request.id);

        if state.requires_human_alert {
            let reason = state
                .errors
                .message
                .clone()
                .unwrap_or_else(|| "flagged for human review".to_string());
            self.job_store
                .create_pending(&request.id, &reason)
                .await
                .map_err(CoreError::Config)?;
            return Ok(GenerationOutcome::NeedsReview { reason });
        }

        if let Some(output) = state.generation {
            return Ok(GenerationOutcome::Approved(output));
        }

        Ok(GenerationOutcome::Halted {
            error_code: state.errors.error_code.unwrap_or_else(|| "E_INCOMPLETE".to_string()),
            message: state
                .errors
                .message
                .unwrap_or_else(|| "graph ended without producing an artifact".to_string()),
        })
    }

    pub async fn admin_list_pending_jobs(&self) -> Result<Vec<IngestionJob>, CoreError> {
        self.job_store.list_pending().await.map_err(CoreError::Config)
    }

    pub async fn admin_approve(&self, job_id: &str) -> Result<(), CoreError> {
        self.job_store.approve(job_id).await.map_err(CoreError::Config)
    }

    pub async fn admin_reject(&self, job_id: &str) -> Result<(), CoreError> {
        self.job_store.reject(job_id).await.map_err(CoreError::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_job_is_listed_then_approved() {
        let store = InMemoryIngestionJobStore::new();
        let id = store.create_pending("req-1", "low confidence").await.unwrap();
        let pending = store.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);

        store.approve(&id).await.unwrap();
        assert!(store.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejecting_unknown_job_errors() {
        let store = InMemoryIngestionJobStore::new();
        assert!(store.reject("job-missing").await.is_err());
    }
}
