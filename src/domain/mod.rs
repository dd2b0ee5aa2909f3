//! Grounded curriculum-generation core.
//!
//! This module implements the domain described in the crate's top-level
//! specification on top of the generic workflow engine (`graphs`, `node`,
//! `state`, `app`): an ingestion state machine that discovers and validates
//! curricula, an orchestration graph that routes a request from intent to
//! artifact, and a read-only production harness that enforces governance,
//! grounding, and shadow-execution safeguards around generation.

pub mod config;
pub mod core;
pub mod errors;
pub mod governance;
pub mod grounding;
pub mod harness;
pub mod ingestion;
pub mod model_client;
pub mod orchestration;
pub mod safeguards;
pub mod schemas;
pub mod shadow;
pub mod store;
pub mod validation;
