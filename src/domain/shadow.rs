//! Shadow executor (C8): runs a second generation against the same prompt
//! and computes divergence metrics as a hallucination-risk signal (§4.7).
//!
//! Topic extraction is grounded verbatim on
//! `original_source/src/production/topic_extraction.py` (markdown header
//! regex, lowercased and trimmed). The five delta metrics and alert
//! thresholds follow §4.7 of the specification directly, since the
//! original's `shadow.py` module body was import/docstring-only in the
//! retrieved source.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;

use crate::domain::model_client::cosine;
use crate::domain::schemas::{RunSummary, ShadowLog, ShadowMetrics};

/// Persists a completed [`ShadowLog`] (§4.7 "every shadow run writes a JSON
/// log"). A trait boundary since the concrete storage backend (local disk,
/// object store) is outside the Non-goals' scope.
#[async_trait]
pub trait ShadowLogSink: Send + Sync {
    async fn write(&self, log: &ShadowLog) -> Result<(), String>;
}

/// Test/demo sink that keeps every written log in memory.
#[derive(Default)]
pub struct InMemoryShadowLogSink {
    logs: parking_lot::Mutex<Vec<ShadowLog>>,
}

impl InMemoryShadowLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<ShadowLog> {
        self.logs.lock().clone()
    }
}

#[async_trait]
impl ShadowLogSink for InMemoryShadowLogSink {
    async fn write(&self, log: &ShadowLog) -> Result<(), String> {
        self.logs.lock().push(log.clone());
        Ok(())
    }
}

/// Production sink: writes each shadow log as a JSON file under its
/// date-partitioned `storage_path`, creating the day's directory on demand.
/// Grounded on `original_source/tests/kill_tests/test_p1_shadow_persistence.py`'s
/// `KT-S1` expectation that a completed run leaves a `*.json` file readable
/// back via `json.load`.
pub struct FileShadowLogSink {
    root: String,
}

impl FileShadowLogSink {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ShadowLogSink for FileShadowLogSink {
    async fn write(&self, log: &ShadowLog) -> Result<(), String> {
        let path = storage_path(&self.root, &log.job_id, log.timestamp);
        let path = std::path::Path::new(&path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| format!("failed to create shadow log directory {}: {err}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(log).map_err(|err| format!("failed to serialize shadow log: {err}"))?;
        tokio::fs::write(path, body)
            .await
            .map_err(|err| format!("failed to write shadow log {}: {err}", path.display()))
    }
}

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#+\s+(.+)$").unwrap());

/// Extracts markdown header topics, lowercased and trimmed, ported verbatim
/// from `extract_topics`.
pub fn extract_topics(markdown: &str) -> Vec<String> {
    HEADER_RE
        .captures_iter(markdown)
        .map(|c| c[1].trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn run_summary(markdown: &str) -> RunSummary {
    let topics = extract_topics(markdown);
    RunSummary {
        topic_count: topics.len(),
        sentence_count: crate::domain::grounding::split_sentences(markdown).len(),
        char_count: markdown.chars().count(),
    }
}

/// Kendall-tau distance between the relative order of elements common to
/// both sequences, normalized by `n(n-1)/2` (§4.7).
fn ordering_delta(primary: &[String], shadow: &[String]) -> f64 {
    let common: Vec<&String> = primary.iter().filter(|t| shadow.contains(t)).collect();
    let n = common.len();
    if n < 2 {
        return 0.0;
    }
    let shadow_index: std::collections::HashMap<&String, usize> =
        shadow.iter().enumerate().map(|(i, t)| (t, i)).collect();
    let mut discordant = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let a = shadow_index[common[i]];
            let b = shadow_index[common[j]];
            if a > b {
                discordant += 1;
            }
        }
    }
    let max_pairs = (n * (n - 1)) / 2;
    discordant as f64 / max_pairs as f64
}

/// Computes the five divergence metrics between a primary and shadow run.
pub fn compute_metrics(
    primary_markdown: &str,
    shadow_markdown: &str,
    primary_embedding: &[f32],
    shadow_embedding: &[f32],
) -> ShadowMetrics {
    let primary_topics = extract_topics(primary_markdown);
    let shadow_topics = extract_topics(shadow_markdown);
    let p: HashSet<&String> = primary_topics.iter().collect();
    let s: HashSet<&String> = shadow_topics.iter().collect();

    let union_len = p.union(&s).count();
    let topic_set_delta = if union_len == 0 {
        0.0
    } else {
        1.0 - (p.intersection(&s).count() as f64 / union_len as f64)
    };
    let extra_topic_rate = if s.is_empty() {
        0.0
    } else {
        s.difference(&p).count() as f64 / s.len() as f64
    };
    let omission_rate = if p.is_empty() {
        0.0
    } else {
        p.difference(&s).count() as f64 / p.len() as f64
    };
    let content_delta = 1.0 - cosine(primary_embedding, shadow_embedding) as f64;

    ShadowMetrics {
        topic_set_delta,
        extra_topic_rate,
        omission_rate,
        ordering_delta: ordering_delta(&primary_topics, &shadow_topics),
        content_delta,
    }
}

/// Alerting thresholds, configurable per §4.7 (defaults shown in the table).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub topic_set_delta: f64,
    pub ordering_delta: f64,
    pub content_delta: f64,
    pub extra_topic_rate: f64,
    pub omission_rate: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            topic_set_delta: 0.05,
            ordering_delta: 0.20,
            content_delta: 0.10,
            extra_topic_rate: 0.01,
            omission_rate: 0.02,
        }
    }
}

/// Evaluates `metrics` against `thresholds`, returning the fired alert
/// codes from §4.7's table, in table order.
pub fn evaluate_alerts(metrics: &ShadowMetrics, thresholds: &AlertThresholds) -> Vec<&'static str> {
    let mut alerts = Vec::new();
    if metrics.topic_set_delta > thresholds.topic_set_delta {
        alerts.push("TOPIC_SET_DELTA_HIGH");
    }
    if metrics.ordering_delta > thresholds.ordering_delta {
        alerts.push("ORDERING_DELTA_HIGH");
    }
    if metrics.content_delta > thresholds.content_delta {
        alerts.push("CONTENT_DELTA_HIGH");
    }
    if metrics.extra_topic_rate > thresholds.extra_topic_rate {
        alerts.push("HALLUCINATION_RISK_HIGH");
    }
    if metrics.omission_rate > thresholds.omission_rate {
        alerts.push("OMISSION_RATE_HIGH");
    }
    alerts
}

/// Policy knob controlling what a `HALLUCINATION_RISK_HIGH` alert does.
/// Default is `Block` (§9 Open Question): a grounded-generation system
/// fails closed rather than silently logging risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HallucinationAction {
    #[default]
    Block,
    Warn,
}

/// Builds the date-partitioned storage path `shadow_logs/YYYY/MM/DD/<job_id>.json`.
pub fn storage_path(root: &str, job_id: &str, at: DateTime<Utc>) -> String {
    format!("{root}/shadow_logs/{}/{job_id}.json", at.format("%Y/%m/%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_topics_lowercases_and_trims_headers() {
        let markdown = "# Cell Biology\n\nSome text\n## Mitochondria  \n";
        let topics = extract_topics(markdown);
        assert_eq!(topics, vec!["cell biology".to_string(), "mitochondria".to_string()]);
    }

    #[test]
    fn identical_runs_have_zero_delta() {
        let markdown = "# Cells\n## Organelles\n";
        let metrics = compute_metrics(markdown, markdown, &[1.0, 0.0], &[1.0, 0.0]);
        assert_eq!(metrics.topic_set_delta, 0.0);
        assert_eq!(metrics.extra_topic_rate, 0.0);
        assert_eq!(metrics.omission_rate, 0.0);
        assert_eq!(metrics.content_delta, 0.0);
    }

    #[test]
    fn extra_topic_in_shadow_raises_hallucination_rate() {
        let primary = "# Cells\n";
        let shadow = "# Cells\n## Unrelated Topic\n";
        let metrics = compute_metrics(primary, shadow, &[1.0, 0.0], &[1.0, 0.0]);
        assert!(metrics.extra_topic_rate > 0.0);
    }

    #[test]
    fn evaluate_alerts_fires_in_table_order() {
        let metrics = ShadowMetrics {
            topic_set_delta: 0.5,
            ordering_delta: 0.5,
            content_delta: 0.5,
            extra_topic_rate: 0.5,
            omission_rate: 0.5,
        };
        let alerts = evaluate_alerts(&metrics, &AlertThresholds::default());
        assert_eq!(
            alerts,
            vec![
                "TOPIC_SET_DELTA_HIGH",
                "ORDERING_DELTA_HIGH",
                "CONTENT_DELTA_HIGH",
                "HALLUCINATION_RISK_HIGH",
                "OMISSION_RATE_HIGH",
            ]
        );
    }

    #[test]
    fn storage_path_is_date_partitioned() {
        let at = DateTime::parse_from_rfc3339("2026-03-05T12:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(storage_path("s3://bucket", "job-1", at), "s3://bucket/shadow_logs/2026/03/05/job-1.json");
    }

    fn sample_log() -> ShadowLog {
        ShadowLog {
            job_id: "job-1".to_string(),
            request_id: "req-1".to_string(),
            curriculum_id: "curr-1".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2026-03-05T12:00:00Z").unwrap().with_timezone(&Utc),
            primary_summary: RunSummary { topic_count: 1, sentence_count: 2, char_count: 30 },
            shadow_summary: RunSummary { topic_count: 1, sentence_count: 2, char_count: 31 },
            metrics: ShadowMetrics {
                topic_set_delta: 0.0,
                extra_topic_rate: 0.0,
                omission_rate: 0.0,
                ordering_delta: 0.0,
                content_delta: 0.0,
            },
            alerts: Vec::new(),
            environment: crate::domain::schemas::ShadowEnvironment {
                primary_model_id: "reasoning-tier".to_string(),
                shadow_model_id: "reasoning-tier-shadow".to_string(),
                embedding_model: "default".to_string(),
                seed: 0,
            },
            storage_path: String::new(),
        }
    }

    #[tokio::test]
    async fn file_sink_writes_date_partitioned_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileShadowLogSink::new(dir.path().to_string_lossy().to_string());
        let log = sample_log();
        sink.write(&log).await.unwrap();

        let expected = dir.path().join("shadow_logs/2026/03/05/job-1.json");
        assert!(expected.exists());
        let persisted: ShadowLog = serde_json::from_str(&std::fs::read_to_string(expected).unwrap()).unwrap();
        assert_eq!(persisted.job_id, "job-1");
        assert_eq!(persisted.request_id, "req-1");
    }
}
