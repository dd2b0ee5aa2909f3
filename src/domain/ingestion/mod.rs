//! Ingestion agents (C4): Scout (search), Gatekeeper (authority + license),
//! Architect (parse + extract), Embedder (chunk + vector).
//!
//! Each agent implements [`crate::domain::orchestration::GraphStateNode`] so
//! it can be registered directly on the orchestration graph, mirroring
//! `wg-ragsmith::nodes::chunking::ChunkingNode` — a `Node` that wraps a
//! reusable, independently testable service.

pub mod architect;
pub mod cache;
pub mod embedder;
pub mod gatekeeper;
pub mod scout;

pub use architect::ArchitectAgent;
pub use cache::DocumentCache;
pub use embedder::EmbedderAgent;
pub use gatekeeper::GatekeeperAgent;
pub use scout::ScoutAgent;
