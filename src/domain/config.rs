//! Ambient configuration (§6): environment-sourced knobs for the harness,
//! grounding verifier, and shadow executor, loaded once at `CurriculumCore`
//! construction.
//!
//! Grounded on `runtimes::runtime_config::RuntimeConfig`'s
//! `resolve_sqlite_db_name`: `dotenvy::dotenv().ok()` followed by
//! `std::env::var` with a hardcoded fallback default per field, rather than
//! a config-file parser.

use std::time::Duration;

use std::sync::Arc;

use crate::domain::harness::HarnessConfig;
use crate::domain::safeguards::CircuitBreaker;
use crate::domain::shadow::{AlertThresholds, FileShadowLogSink, HallucinationAction, ShadowLogSink};

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_hallucination_action(key: &str, default: HallucinationAction) -> HallucinationAction {
    match std::env::var(key).as_deref() {
        Ok("warn") | Ok("WARN") => HallucinationAction::Warn,
        Ok("block") | Ok("BLOCK") => HallucinationAction::Block,
        _ => default,
    }
}

/// Resolved configuration for one `CurriculumCore` instance. Construct via
/// [`CoreConfig::from_env`]; every field has a hardcoded fallback so a
/// missing `.env` never prevents startup.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub grounding_threshold: f32,
    pub embedding_provider_name: String,
    pub alert_thresholds: AlertThresholds,
    pub hallucination_action: HallucinationAction,
    pub shadow_storage_root: String,
    pub primary_model: String,
    pub shadow_model: String,
    pub shadow_seed: u64,
    pub primary_temperature: f32,
    pub shadow_temperature: f32,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout: Duration,
}

impl CoreConfig {
    /// Loads `.env` (if present) via `dotenvy`, then reads every knob from
    /// the environment, falling back to the defaults below when unset or
    /// unparseable.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            grounding_threshold: env_f64("GROUNDING_THRESHOLD", 0.7) as f32,
            embedding_provider_name: env_string("EMBEDDING_PROVIDER", "default"),
            alert_thresholds: AlertThresholds {
                topic_set_delta: env_f64("ALERT_TOPIC_SET_DELTA", 0.05),
                ordering_delta: env_f64("ALERT_ORDERING_DELTA", 0.20),
                content_delta: env_f64("ALERT_CONTENT_DELTA", 0.10),
                extra_topic_rate: env_f64("ALERT_EXTRA_TOPIC_RATE", 0.01),
                omission_rate: env_f64("ALERT_OMISSION_RATE", 0.02),
            },
            hallucination_action: env_hallucination_action("HALLUCINATION_ACTION", HallucinationAction::Block),
            shadow_storage_root: env_string("SHADOW_STORAGE_ROOT", "storage"),
            primary_model: env_string("PRIMARY_MODEL", "reasoning-tier"),
            shadow_model: env_string("SHADOW_MODEL", "reasoning-tier-shadow"),
            shadow_seed: env_u64("SHADOW_SEED", 0),
            primary_temperature: env_f64("PRIMARY_TEMPERATURE", 0.3) as f32,
            shadow_temperature: env_f64("SHADOW_TEMPERATURE", 0.7) as f32,
            breaker_failure_threshold: env_u64("BREAKER_FAILURE_THRESHOLD", 5) as u32,
            breaker_recovery_timeout: Duration::from_secs(env_u64("BREAKER_RECOVERY_TIMEOUT_SECS", 60)),
        }
    }

    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            grounding_threshold: self.grounding_threshold,
            embedding_provider_name: self.embedding_provider_name.clone(),
            alert_thresholds: self.alert_thresholds,
            hallucination_action: self.hallucination_action,
            shadow_storage_root: self.shadow_storage_root.clone(),
            primary_model: self.primary_model.clone(),
            shadow_model: self.shadow_model.clone(),
            shadow_seed: self.shadow_seed,
            primary_temperature: self.primary_temperature,
            shadow_temperature: self.shadow_temperature,
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreaker {
        CircuitBreaker::new(self.breaker_failure_threshold, self.breaker_recovery_timeout)
    }

    /// The production shadow log sink: writes date-partitioned JSON files
    /// under `shadow_storage_root`. Tests and the smoke demo construct an
    /// `InMemoryShadowLogSink` directly instead.
    pub fn shadow_sink(&self) -> Arc<dyn ShadowLogSink> {
        Arc::new(FileShadowLogSink::new(self.shadow_storage_root.clone()))
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            grounding_threshold: 0.7,
            embedding_provider_name: "default".to_string(),
            alert_thresholds: AlertThresholds::default(),
            hallucination_action: HallucinationAction::default(),
            shadow_storage_root: "storage".to_string(),
            primary_model: "reasoning-tier".to_string(),
            shadow_model: "reasoning-tier-shadow".to_string(),
            shadow_seed: 0,
            primary_temperature: 0.3,
            shadow_temperature: 0.7,
            breaker_failure_threshold: 5,
            breaker_recovery_timeout: Duration::from_secs(60),
        }
    }
}
