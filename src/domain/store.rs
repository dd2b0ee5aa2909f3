//! Curriculum store (§6): the outbound persistence trait the orchestration
//! graph consults for vault lookups and writes back to after a cold-start
//! ingestion completes.
//!
//! A trait boundary per the Non-goals ("no concrete database driver in
//! scope") — injected into `CurriculumCore` the same way the teacher injects
//! checkpointers into `AppRunner`.

use async_trait::async_trait;

use crate::domain::schemas::{Curriculum, NormalizedRequest, VaultLookupResult};

#[async_trait]
pub trait CurriculumStore: Send + Sync {
    /// Consults the vault for an existing curriculum matching `request`'s
    /// jurisdiction/grade/subject, per §4.4's vault decision.
    async fn lookup(&self, request: &NormalizedRequest) -> Result<VaultLookupResult, String>;

    /// Persists a newly ingested curriculum, returning its assigned id.
    async fn store(&self, curriculum: Curriculum) -> Result<String, String>;

    /// Fetches the competencies for a curriculum id; §4.8 step 5 requires
    /// this be non-empty or the harness raises `CompetencyNotFoundError`.
    async fn competencies(&self, curriculum_id: &str) -> Result<Vec<crate::domain::schemas::Competency>, String>;

    /// Fetches a stored curriculum record by id, for the `Generate` node to
    /// hand to `ProductionHarness::generate`.
    async fn get(&self, curriculum_id: &str) -> Result<Option<Curriculum>, String>;

    /// Persists the competencies extracted for a newly ingested curriculum,
    /// called by `VaultStoreNode` right after `store` so the harness's later
    /// `competencies` lookup (§4.8 step 5) finds them.
    async fn store_competencies(
        &self,
        curriculum_id: &str,
        competencies: Vec<crate::domain::schemas::Competency>,
    ) -> Result<(), String>;
}

/// An in-process store used by tests and the smoke demo; never wired as a
/// production default.
#[derive(Default)]
pub struct InMemoryCurriculumStore {
    curricula: parking_lot::RwLock<Vec<Curriculum>>,
    competencies: parking_lot::RwLock<std::collections::HashMap<String, Vec<crate::domain::schemas::Competency>>>,
}

impl InMemoryCurriculumStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, curriculum: Curriculum, competencies: Vec<crate::domain::schemas::Competency>) {
        self.competencies
            .write()
            .insert(curriculum.id.clone(), competencies);
        self.curricula.write().push(curriculum);
    }
}

#[async_trait]
impl CurriculumStore for InMemoryCurriculumStore {
    async fn lookup(&self, request: &NormalizedRequest) -> Result<VaultLookupResult, String> {
        let curricula = self.curricula.read();
        let hit = curricula.iter().find(|c| {
            c.iso2 == request.iso2 && c.grade == request.grade && c.subject == request.subject
        });
        Ok(match hit {
            Some(c) => VaultLookupResult {
                request_id: request.id.clone(),
                found: true,
                curriculum_id: Some(c.id.clone()),
                match_confidence: Some(c.confidence),
                source_tag: Some(crate::domain::schemas::VaultSourceTag::Cache),
            },
            None => VaultLookupResult {
                request_id: request.id.clone(),
                found: false,
                curriculum_id: None,
                match_confidence: None,
                source_tag: None,
            },
        })
    }

    async fn store(&self, curriculum: Curriculum) -> Result<String, String> {
        let id = curriculum.id.clone();
        self.curricula.write().push(curriculum);
        Ok(id)
    }

    async fn competencies(&self, curriculum_id: &str) -> Result<Vec<crate::domain::schemas::Competency>, String> {
        Ok(self
            .competencies
            .read()
            .get(curriculum_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, curriculum_id: &str) -> Result<Option<Curriculum>, String> {
        Ok(self
            .curricula
            .read()
            .iter()
            .find(|c| c.id == curriculum_id)
            .cloned())
    }

    async fn store_competencies(
        &self,
        curriculum_id: &str,
        competencies: Vec<crate::domain::schemas::Competency>,
    ) -> Result<(), String> {
        self.competencies
            .write()
            .insert(curriculum_id.to_string(), competencies);
        Ok(())
    }
}
