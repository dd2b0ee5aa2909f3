//! Session and run identifier generation.

use uuid::Uuid;

/// Generates unique identifiers for runtime sessions and runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdGenerator;

impl IdGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generate a fresh run id, e.g. `run-3f9a1c2e4b5d4a6f`.
    pub fn generate_run_id(&self) -> String {
        format!("run-{}", Uuid::new_v4().simple())
    }
}
