//! Rate-limited model client (C3): the trait boundary to an LLM/embedding
//! provider, plus the token-bucket limiter, daily counter, provider fallback
//! chain, and a deterministic test double.
//!
//! `ModelClient` is an interface-only boundary per the Non-goals — this
//! crate never constructs a concrete HTTP/vendor client itself, mirroring
//! how the engine treats `Node` as a trait object (`Arc<dyn Node>`).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Which tier of model a call should be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Reasoning,
    Standard,
    Fast,
}

/// How a call is classified for task routing (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Reasoning,
    Creative,
    Formatting,
    Standard,
}

/// Identifier for a concrete model within the provider fallback chain.
pub type ModelId = String;

#[derive(Debug, Error, Diagnostic)]
pub enum ModelClientError {
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(curriculum_core::model_client::provider))]
    Provider { provider: String, message: String },

    #[error("structured output did not match the requested schema after retries")]
    #[diagnostic(code(curriculum_core::model_client::schema_mismatch))]
    SchemaMismatch { raw: String },

    #[error("all candidate models in the fallback chain were exhausted")]
    #[diagnostic(code(curriculum_core::model_client::fallback_exhausted))]
    FallbackExhausted,

    #[error("call deadline exceeded")]
    #[diagnostic(code(curriculum_core::model_client::timeout))]
    Timeout,
}

/// Contracts the core consumes from an LLM provider (§4.2).
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate_structured(
        &self,
        prompt: &str,
        model: &ModelId,
        temperature: f32,
    ) -> Result<Value, ModelClientError>;

    async fn generate_text(
        &self,
        prompt: &str,
        model: &ModelId,
        temperature: f32,
    ) -> Result<String, ModelClientError>;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelClientError>;
}

/// Cosine similarity in `[-1, 1]`; `0.0` when either vector has zero norm.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Fair-FIFO token-bucket rate limiter for one model tier.
///
/// Capacity equals the configured requests-per-minute; tokens refill at
/// `rpm / 60` per second. `acquire` suspends the caller cooperatively until
/// enough tokens are available, matching the engine's own async/await node
/// execution style rather than busy-polling.
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<TokenBucketState>,
}

struct TokenBucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rpm: u32) -> Self {
        let capacity = rpm as f64;
        Self {
            capacity,
            refill_per_second: capacity / 60.0,
            state: Mutex::new(TokenBucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Suspends until `n` tokens are available, then debits them.
    pub async fn acquire(&self, n: u32) {
        let n = n as f64;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let elapsed = state.last_refill.elapsed().as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
                state.last_refill = Instant::now();
                if state.tokens >= n {
                    state.tokens -= n;
                    None
                } else {
                    let deficit = n - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.refill_per_second))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

/// Per-tier daily call counter with a naive UTC-day rollover.
pub struct DailyCallCounter {
    state: Mutex<DailyCounterState>,
}

struct DailyCounterState {
    day: NaiveDate,
    calls: u32,
    limit: u32,
}

impl DailyCallCounter {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            state: Mutex::new(DailyCounterState {
                day: Utc::now().date_naive(),
                calls: 0,
                limit: daily_limit,
            }),
        }
    }

    /// Records a call, rolling the counter over at UTC midnight; returns
    /// `false` once the tier is exhausted for the day (the caller should
    /// swap tiers and record the escalation).
    pub async fn record_call(&self) -> bool {
        let mut state = self.state.lock().await;
        let today = Utc::now().date_naive();
        if today != state.day {
            state.day = today;
            state.calls = 0;
        }
        if state.calls >= state.limit {
            false
        } else {
            state.calls += 1;
            true
        }
    }
}

/// An immutable ordered list of candidate models per task kind, plus a
/// process-lifetime "bad model" set — the Design Note's corrective to "a
/// mutable registry of model ids is wrong" (§9).
pub struct ModelRegistry {
    candidates: std::collections::HashMap<TaskKind, Vec<ModelId>>,
    bad_models: Mutex<HashSet<ModelId>>,
}

impl ModelRegistry {
    pub fn new(candidates: std::collections::HashMap<TaskKind, Vec<ModelId>>) -> Self {
        Self {
            candidates,
            bad_models: Mutex::new(HashSet::new()),
        }
    }

    /// The fallback chain for `kind`, with models already marked bad this
    /// process lifetime filtered out.
    pub async fn chain_for(&self, kind: TaskKind) -> Vec<ModelId> {
        let bad = self.bad_models.lock().await;
        self.candidates
            .get(&kind)
            .into_iter()
            .flatten()
            .filter(|m| !bad.contains(*m))
            .cloned()
            .collect()
    }

    pub async fn mark_bad(&self, model: &ModelId) {
        self.bad_models.lock().await.insert(model.clone());
    }
}

/// Wraps a [`ModelClient`] with retry/backoff, fenced-JSON stripping, and
/// the provider fallback chain (§4.2).
pub struct StructuredOutputClient {
    inner: Arc<dyn ModelClient>,
    registry: Arc<ModelRegistry>,
}

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_BASE: u64 = 2;
const MAX_RETRY_AFTER_SECS: u64 = 30;

impl StructuredOutputClient {
    pub fn new(inner: Arc<dyn ModelClient>, registry: Arc<ModelRegistry>) -> Self {
        Self { inner, registry }
    }

    /// Requests structured output for `task`, walking the fallback chain on
    /// HTTP-404/429-style provider errors and retrying transient failures
    /// with exponential backoff (base 2, ≤3 attempts) before giving up.
    pub async fn generate_structured(
        &self,
        task: TaskKind,
        prompt: &str,
        temperature: f32,
    ) -> Result<Value, ModelClientError> {
        let chain = self.registry.chain_for(task).await;
        if chain.is_empty() {
            return Err(ModelClientError::FallbackExhausted);
        }

        for model in &chain {
            let mut last_err = None;
            for attempt in 0..MAX_RETRY_ATTEMPTS {
                match self.inner.generate_structured(prompt, model, temperature).await {
                    Ok(value) => return Ok(strip_fence_and_reparse(value)),
                    Err(err) => {
                        tracing::warn!(model, attempt, error = %err, "structured generation attempt failed");
                        last_err = Some(err);
                        let backoff = RETRY_BACKOFF_BASE.pow(attempt);
                        tokio::time::sleep(Duration::from_secs(backoff.min(MAX_RETRY_AFTER_SECS))).await;
                    }
                }
            }
            self.registry.mark_bad(model).await;
            if let Some(err) = last_err {
                tracing::warn!(model, error = %err, "exhausted retries, advancing fallback chain");
            }
        }
        Err(ModelClientError::FallbackExhausted)
    }
}

/// Re-parses a value that may have arrived fenced in a markdown code block;
/// strips the leading fence once and retries the parse, as §4.2 specifies.
fn strip_fence_and_reparse(value: Value) -> Value {
    if let Value::String(s) = &value {
        let trimmed = s.trim();
        if let Some(stripped) = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
        {
            let stripped = stripped.strip_suffix("```").unwrap_or(stripped).trim();
            if let Ok(parsed) = serde_json::from_str(stripped) {
                return parsed;
            }
        }
    }
    value
}

/// Deterministic test double grounded on
/// `original_source/src/ingestion/llm_client.py::DummyLLMProvider`: never
/// wired into production defaults, used by every deterministic test.
pub struct DummyModelClient;

#[async_trait]
impl ModelClient for DummyModelClient {
    async fn generate_structured(
        &self,
        prompt: &str,
        _model: &ModelId,
        _temperature: f32,
    ) -> Result<Value, ModelClientError> {
        let items: Vec<Value> = prompt
            .lines()
            .filter(|l| l.trim_start().starts_with("- "))
            .take(8)
            .enumerate()
            .map(|(i, line)| {
                let clean = line.trim_start().trim_start_matches("- ").to_string();
                serde_json::json!({
                    "original_text": clean,
                    "standardized_text": format!("Standardized: {clean}"),
                    "source_chunk_id": format!("chunk-{i}"),
                    "confidence": 0.95,
                })
            })
            .collect();
        Ok(serde_json::json!({ "items": items }))
    }

    async fn generate_text(
        &self,
        prompt: &str,
        _model: &ModelId,
        _temperature: f32,
    ) -> Result<String, ModelClientError> {
        Ok(format!("Deterministic response for: {}", prompt.lines().next().unwrap_or_default()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ModelClientError> {
        Ok(texts.iter().map(|t| jaccard_bow_vector(t)).collect())
    }
}

/// A deterministic bag-of-words "embedding": not a real semantic vector, but
/// stable across calls within a single `embed` invocation when the caller
/// builds a shared vocabulary — used only by [`DummyModelClient`] and
/// grounding-verifier tests exercising the Jaccard fallback path.
fn jaccard_bow_vector(text: &str) -> Vec<f32> {
    text.split_whitespace()
        .map(|w| w.len() as f32)
        .collect()
}
