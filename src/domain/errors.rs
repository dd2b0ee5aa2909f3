//! Outer typed errors raised at the `CurriculumCore`/harness boundary (§7).
//!
//! Node-internal failures instead populate [`crate::domain::schemas::GraphState`]'s
//! `errors` field using the engine's existing `ErrorEvent`/`LadderError`
//! types; these variants are reserved for the few places the specification
//! names a concrete exception type.

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::validation::{ConfidenceThresholdError, GroundingError, SchemaValidationError};

#[derive(Debug, Error, Diagnostic)]
pub enum CoreError {
    #[error("schema validation failed for {0}", .0.schema)]
    #[diagnostic(
        code(curriculum_core::schema),
        help("Check the field errors listed below against the producing component.")
    )]
    SchemaValidation(#[from] SchemaValidationError),

    #[error("confidence threshold not met for stage {0}", .0.stage)]
    #[diagnostic(code(curriculum_core::confidence))]
    ConfidenceThreshold(#[from] ConfidenceThresholdError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Grounding(#[from] GroundingError),

    /// §8/§9: artifact failed grounding verification in BLOCK mode.
    #[error("grounding violation: {} ungrounded sentence(s)", .ungrounded_sentences.len())]
    #[diagnostic(
        code(curriculum_core::grounding_violation),
        help("Inspect `ungrounded_sentences` for the offending text.")
    )]
    GroundingViolation { ungrounded_sentences: Vec<String> },

    /// §4.7/§8: shadow execution flagged a hallucination risk in BLOCK mode.
    #[error("shadow hallucination detected for request {request_id}")]
    #[diagnostic(code(curriculum_core::hallucination_block))]
    HallucinationBlock {
        extra_topic_rate: f64,
        alerts: Vec<String>,
        request_id: String,
    },

    /// §4.8 step 5: competency fetch for the curriculum returned nothing.
    #[error("no competencies found for curriculum {0}")]
    #[diagnostic(code(curriculum_core::competency_not_found))]
    CompetencyNotFound(String),

    /// §9: defense-in-depth read-only enforcement tripped.
    #[error("Generate-Safety Violation: database is not read-only")]
    #[diagnostic(
        code(curriculum_core::database_not_readonly),
        help("A write path was attempted during a generate() call; this is fatal by design.")
    )]
    DatabaseNotReadOnly,

    /// §4.8 step 1: startup DB-role self-test did not observe a
    /// permission-denied error on a write attempt.
    #[error("database read-only self-test failed: {0}")]
    #[diagnostic(code(curriculum_core::readonly_selftest))]
    ReadOnlySelfTestFailed(String),

    #[error("request halted: {error_code} at node {node}")]
    #[diagnostic(code(curriculum_core::halted))]
    Halted { node: String, error_code: String },

    #[error("request routed to human review: {reason}")]
    #[diagnostic(code(curriculum_core::needs_review))]
    NeedsReview { reason: String },

    #[error("underlying graph execution failed")]
    #[diagnostic(code(curriculum_core::runner))]
    Runner(#[from] crate::runtimes::runner::RunnerError),

    #[error("graph compilation failed")]
    #[diagnostic(code(curriculum_core::compile))]
    Compile(#[from] crate::graphs::GraphCompileError),

    #[error("configuration error: {0}")]
    #[diagnostic(code(curriculum_core::config))]
    Config(String),
}
