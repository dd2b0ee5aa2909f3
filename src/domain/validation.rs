//! Central validation gates (C2): schema conformance, confidence floors,
//! the binary grounding gate, and fallback-tier derivation.
//!
//! These are pure functions; violating an invariant at a boundary halts the
//! request rather than auto-repairing it (§4.1).

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::schemas::FallbackTier;

#[derive(Debug, Clone, PartialEq, Error, Diagnostic)]
#[error("schema validation failed for {schema}")]
#[diagnostic(
    code(curriculum_core::validation::schema),
    help("{}", .field_errors.join("; "))
)]
pub struct SchemaValidationError {
    pub schema: &'static str,
    pub field_errors: Vec<String>,
}

/// Validates `data` against the invariants of `T`, returning either the
/// validated value or a structured [`SchemaValidationError`].
///
/// `T` carries its own invariant checks via `TryFrom`/a constructor; this
/// function is the single seam every component calls rather than inlining
/// ad hoc checks.
pub fn validate_schema<T>(
    schema: &'static str,
    data: T,
    check: impl Fn(&T) -> Vec<String>,
) -> Result<T, SchemaValidationError> {
    let field_errors = check(&data);
    if field_errors.is_empty() {
        Ok(data)
    } else {
        Err(SchemaValidationError {
            schema,
            field_errors,
        })
    }
}

/// The pipeline stages that carry a confidence floor (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    IntentClassification,
    JurisdictionResolution,
    SourceValidation,
    OcrParsing,
    GenerationGrounding,
}

impl ValidationStage {
    pub const fn name(self) -> &'static str {
        match self {
            ValidationStage::IntentClassification => "intent_classification",
            ValidationStage::JurisdictionResolution => "jurisdiction_resolution",
            ValidationStage::SourceValidation => "source_validation",
            ValidationStage::OcrParsing => "ocr_parsing",
            ValidationStage::GenerationGrounding => "generation_grounding",
        }
    }

    /// The confidence floor a score must clear at this stage.
    pub const fn floor(self) -> f64 {
        match self {
            ValidationStage::IntentClassification => 0.85,
            ValidationStage::JurisdictionResolution => 0.80,
            ValidationStage::SourceValidation => 0.90,
            ValidationStage::OcrParsing => 0.70,
            ValidationStage::GenerationGrounding => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error, Diagnostic)]
#[error("confidence {actual:.2} below required floor {required:.2} at stage {stage}")]
#[diagnostic(code(curriculum_core::validation::confidence))]
pub struct ConfidenceThresholdError {
    pub actual: f64,
    pub required: f64,
    pub stage: &'static str,
}

/// Fails when `score` does not meet the stage-specific floor.
pub fn check_confidence_threshold(score: f64, stage: ValidationStage) -> Result<(), ConfidenceThresholdError> {
    let required = stage.floor();
    if score < required {
        Err(ConfidenceThresholdError {
            actual: score,
            required,
            stage: stage.name(),
        })
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Error, Diagnostic)]
#[error("grounding gate rejected coverage {coverage:.2}")]
#[diagnostic(
    code(curriculum_core::validation::grounding_gate),
    help("Coverage must be >= 0.8 for an artifact to be approved.")
)]
pub struct GroundingError {
    pub coverage: f64,
}

/// Binary grounding gate: rejects any coverage below 0.8.
pub fn enforce_grounding_gate(coverage: f64) -> Result<(), GroundingError> {
    if coverage < 0.8 {
        Err(GroundingError { coverage })
    } else {
        Ok(())
    }
}

/// Derives the fallback tier from the current confidence and cumulative
/// failure count for a node (§4.1): healthy on both ⇒ tier_0; confidence
/// below 0.7 or a single failure ⇒ tier_1; two or more failures ⇒ tier_2.
pub fn determine_fallback_tier(confidence: f64, failure_count: u32) -> FallbackTier {
    if failure_count >= 2 {
        FallbackTier::Tier2
    } else if confidence < 0.7 || failure_count == 1 {
        FallbackTier::Tier1
    } else {
        FallbackTier::Tier0
    }
}
