//! Embedder agent: chunks extracted competencies and embeds them via the
//! model client (§4.3).
//!
//! Grounded on `original_source/src/agents/embedder.py`: each competency
//! yields a "main" chunk (title + description) and, when the learning
//! outcomes text is long enough, a second "outcomes" chunk — carried over
//! verbatim as `CHUNK_SIZE = 512` chars (the original's token-ish heuristic
//! over roughly 4 chars/token, i.e. `512 * 4` chars).

use async_trait::async_trait;

use crate::domain::model_client::ModelClient;
use crate::domain::orchestration::{GraphStateNode, GraphStateNodeError};
use crate::domain::schemas::{AgentStatus, ArchitectOutput, EmbedderOutput, GraphState};
use crate::node::NodeContext;

pub const EMBEDDING_MODEL: &str = "text-embedding-004";
const CHUNK_SIZE_CHARS: usize = 512 * 4;

/// One unit of text handed to the embedding call, tagged with the
/// competency it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub competency_id: String,
    pub kind: ChunkKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Main,
    Outcomes,
}

/// Splits an architect output's competencies into embeddable chunks.
pub fn create_chunks(architect: &ArchitectOutput) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for competency in &architect.competencies {
        chunks.push(Chunk {
            competency_id: competency.competency_id.clone(),
            kind: ChunkKind::Main,
            text: format!("{}\n{}", competency.title, competency.description),
        });

        let outcomes_text = competency.learning_outcomes.join("\n");
        if outcomes_text.len() > CHUNK_SIZE_CHARS {
            chunks.push(Chunk {
                competency_id: competency.competency_id.clone(),
                kind: ChunkKind::Outcomes,
                text: outcomes_text,
            });
        }
    }
    chunks
}

pub struct EmbedderAgent {
    model: std::sync::Arc<dyn ModelClient>,
}

impl EmbedderAgent {
    pub fn new(model: std::sync::Arc<dyn ModelClient>) -> Self {
        Self { model }
    }

    pub async fn run(&self, curriculum_id: &str, architect: &ArchitectOutput) -> EmbedderOutput {
        let chunks = create_chunks(architect);
        if chunks.is_empty() {
            return EmbedderOutput {
                curriculum_id: curriculum_id.to_string(),
                embedded_chunks: 0,
                embedding_model: EMBEDDING_MODEL.to_string(),
                status: AgentStatus::Failed,
            };
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        match self.model.embed(&texts).await {
            Ok(vectors) if !vectors.is_empty() => EmbedderOutput {
                curriculum_id: curriculum_id.to_string(),
                embedded_chunks: vectors.len(),
                embedding_model: EMBEDDING_MODEL.to_string(),
                status: AgentStatus::Success,
            },
            Ok(_) => EmbedderOutput {
                curriculum_id: curriculum_id.to_string(),
                embedded_chunks: 0,
                embedding_model: EMBEDDING_MODEL.to_string(),
                status: AgentStatus::Failed,
            },
            Err(err) => {
                tracing::error!(curriculum_id, error = %err, "embedding call failed");
                EmbedderOutput {
                    curriculum_id: curriculum_id.to_string(),
                    embedded_chunks: 0,
                    embedding_model: EMBEDDING_MODEL.to_string(),
                    status: AgentStatus::Failed,
                }
            }
        }
    }
}

#[async_trait]
impl GraphStateNode for EmbedderAgent {
    fn name(&self) -> &'static str {
        "Embedder"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let architect = state
            .architect
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no architect output"))?;
        let curriculum_id = state
            .curriculum_id
            .clone()
            .unwrap_or_else(|| state.request_id.clone());
        state.curriculum_id = Some(curriculum_id.clone());
        let output = self.run(&curriculum_id, &architect).await;
        let failed = output.status == AgentStatus::Failed;
        debug_assert!(failed || output.embedded_chunks > 0);
        state.embedder = Some(output);
        if failed {
            return Err(GraphStateNodeError::new(
                "E_EMBEDDER_FAILED",
                true,
                "no chunks were embedded",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schemas::{CompetencyItem, CurriculumSnapshot};
    use async_trait::async_trait;
    use crate::domain::model_client::ModelClientError;

    fn architect_output(outcomes_len: usize) -> ArchitectOutput {
        ArchitectOutput {
            job_id: "job-1".into(),
            snapshot: CurriculumSnapshot {
                file_path: "doc".into(),
                checksum: "abc".into(),
                pages: 3,
            },
            competencies: vec![CompetencyItem {
                competency_id: "comp-1".into(),
                title: "Cell Structure".into(),
                description: "Understand cells".into(),
                learning_outcomes: vec!["x".repeat(outcomes_len)],
                page_range: "1-2".into(),
                confidence: 0.9,
            }],
            average_confidence: 0.9,
            status: AgentStatus::Success,
        }
    }

    #[test]
    fn short_outcomes_yield_only_main_chunk() {
        let output = architect_output(10);
        let chunks = create_chunks(&output);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].kind, ChunkKind::Main);
    }

    #[test]
    fn long_outcomes_yield_an_additional_chunk() {
        let output = architect_output(CHUNK_SIZE_CHARS + 10);
        let chunks = create_chunks(&output);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].kind, ChunkKind::Outcomes);
    }

    struct StubModel;

    #[async_trait]
    impl ModelClient for StubModel {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _model: &crate::domain::model_client::ModelId,
            _temperature: f32,
        ) -> Result<serde_json::Value, ModelClientError> {
            unimplemented!()
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _model: &crate::domain::model_client::ModelId,
            _temperature: f32,
        ) -> Result<String, ModelClientError> {
            unimplemented!()
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelClientError> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2]).collect())
        }
    }

    #[tokio::test]
    async fn successful_embed_reports_positive_chunk_count() {
        let agent = EmbedderAgent::new(std::sync::Arc::new(StubModel));
        let output = agent.run("curr-1", &architect_output(10)).await;
        assert_eq!(output.status, AgentStatus::Success);
        assert_eq!(output.embedded_chunks, 1);
    }
}
