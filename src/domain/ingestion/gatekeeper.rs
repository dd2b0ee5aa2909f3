//! Gatekeeper agent: authority + license validation and conflict detection
//! over Scout's candidates (§4.3).
//!
//! Grounded on `original_source/src/agents/gatekeeper.py`: the license
//! pattern table, publication-year regex, authority-name map, and the
//! year-spread conflict check are carried over faithfully.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::orchestration::{GraphStateNode, GraphStateNodeError};
use crate::domain::schemas::{
    AgentStatus, ApprovedSource, AuthorityHint, GatekeeperOutput, GraphState, LicenseType,
    SearchCandidate,
};
use crate::node::NodeContext;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(20[12][0-9])").unwrap());

static LICENSE_PATTERNS: LazyLock<Vec<(LicenseType, &'static [&'static str])>> = LazyLock::new(|| {
    vec![
        (LicenseType::PublicDomain, &["public domain", "no copyright", "cc0"][..]),
        (
            LicenseType::CreativeCommons,
            &["creative commons", "cc by", "cc-by", "attribution"][..],
        ),
        (
            LicenseType::Government,
            &[
                "government publication",
                "crown copyright",
                "official document",
                "ministry of education",
                "published by the government",
            ][..],
        ),
        (
            LicenseType::Educational,
            &["for educational use", "educational purposes", "non-commercial", "educational license"][..],
        ),
    ]
});

/// Detects a license type purely from URL text patterns, the same
/// heuristic the original uses in lieu of fetching document metadata.
pub fn detect_license(url: &str) -> LicenseType {
    let url_lower = url.to_lowercase();
    if url_lower.contains(".gov.") || url_lower.contains("ministry") {
        return LicenseType::Government;
    }
    for (license, patterns) in LICENSE_PATTERNS.iter() {
        if patterns.iter().any(|p| url_lower.contains(p)) {
            return *license;
        }
    }
    if url_lower.contains(".edu") || url_lower.contains(".ac.") {
        return LicenseType::Educational;
    }
    LicenseType::Unknown
}

/// Extracts a four-digit year (2010-2029) from the URL text, if present.
pub fn extract_publication_year(url: &str) -> Option<i32> {
    YEAR_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn extract_authority_name(domain: &str, country: &str) -> String {
    match domain {
        "nerdc.gov.ng" => "Nigerian Educational Research and Development Council".to_string(),
        "education.gov.ng" => "Federal Ministry of Education, Nigeria".to_string(),
        "kicd.ac.ke" => "Kenya Institute of Curriculum Development".to_string(),
        "nacca.gov.gh" => "National Council for Curriculum and Assessment, Ghana".to_string(),
        "education.gov.za" => "Department of Basic Education, South Africa".to_string(),
        _ => format!("Education Authority, {country}"),
    }
}

fn validate_one(candidate: &SearchCandidate, country: &str) -> Option<ApprovedSource> {
    let authority = extract_authority_name(&candidate.domain, country);
    if candidate.authority_hint == AuthorityHint::Official {
        return Some(ApprovedSource {
            url: candidate.url.clone(),
            domain: candidate.domain.clone(),
            authority,
            license: LicenseType::Government,
            confidence: 0.95,
            publication_year: extract_publication_year(&candidate.url),
        });
    }

    let license = detect_license(&candidate.url);
    if license.is_rejected() {
        return None;
    }
    Some(ApprovedSource {
        url: candidate.url.clone(),
        domain: candidate.domain.clone(),
        authority,
        license,
        confidence: 0.7,
        publication_year: extract_publication_year(&candidate.url),
    })
}

/// ≥2 approved sources spanning more than 2 distinct publication years.
pub fn check_conflicts(sources: &[ApprovedSource]) -> bool {
    let mut years: Vec<i32> = sources.iter().filter_map(|s| s.publication_year).collect();
    years.sort_unstable();
    years.dedup();
    years.len() >= 2 && years[years.len() - 1] - years[0] > 2
}

pub struct GatekeeperAgent;

impl GatekeeperAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, job_id: &str, candidates: &[SearchCandidate], country: &str) -> GatekeeperOutput {
        if candidates.is_empty() {
            return GatekeeperOutput {
                job_id: job_id.to_string(),
                approved: Vec::new(),
                status: AgentStatus::Failed,
            };
        }

        let approved: Vec<ApprovedSource> = candidates
            .iter()
            .filter_map(|c| validate_one(c, country))
            .collect();

        let status = if check_conflicts(&approved) {
            AgentStatus::Conflicted
        } else if approved.is_empty() {
            AgentStatus::Failed
        } else {
            AgentStatus::Success
        };

        GatekeeperOutput {
            job_id: job_id.to_string(),
            approved,
            status,
        }
    }
}

impl Default for GatekeeperAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStateNode for GatekeeperAgent {
    fn name(&self) -> &'static str {
        "Gatekeeper"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let scout = state
            .scout
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no scout output"))?;
        let country = state
            .normalized_request
            .as_ref()
            .map(|r| r.country_name.clone())
            .unwrap_or_default();
        let output = self.validate(&state.request_id, &scout.candidates, &country);
        let status = output.status;
        state.gatekeeper = Some(output);
        match status {
            AgentStatus::Conflicted => Err(GraphStateNodeError::new(
                "SOURCE_CONFLICT",
                false,
                "approved sources span more than two publication years",
            )),
            AgentStatus::Failed => Err(GraphStateNodeError::new(
                "E_GATEKEEPER_NO_APPROVED",
                true,
                "no sources survived gatekeeper review",
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, hint: AuthorityHint) -> SearchCandidate {
        SearchCandidate {
            title: "t".into(),
            url: url.to_string(),
            snippet: "".into(),
            domain: "d".into(),
            authority_hint: hint,
            original_rank: 0,
        }
    }

    #[test]
    fn official_candidates_fast_track_to_government_license() {
        let agent = GatekeeperAgent::new();
        let output = agent.validate(
            "job-1",
            &[candidate("https://nerdc.gov.ng/curriculum-2019.pdf", AuthorityHint::Official)],
            "Nigeria",
        );
        assert_eq!(output.status, AgentStatus::Success);
        assert_eq!(output.approved[0].license, LicenseType::Government);
        assert_eq!(output.approved[0].confidence, 0.95);
    }

    #[test]
    fn restricted_license_is_rejected() {
        assert!(detect_license("https://example.org/restricted-access.pdf") == LicenseType::Unknown);
    }

    #[test]
    fn conflict_detected_when_years_span_more_than_two() {
        let sources = vec![
            ApprovedSource {
                url: "a".into(),
                domain: "a".into(),
                authority: "Authority A".into(),
                license: LicenseType::Government,
                confidence: 0.95,
                publication_year: Some(2019),
            },
            ApprovedSource {
                url: "b".into(),
                domain: "b".into(),
                authority: "Authority B".into(),
                license: LicenseType::Government,
                confidence: 0.95,
                publication_year: Some(2023),
            },
        ];
        assert!(check_conflicts(&sources));
    }

    #[test]
    fn empty_candidates_fails() {
        let agent = GatekeeperAgent::new();
        let output = agent.validate("job-1", &[], "Nigeria");
        assert_eq!(output.status, AgentStatus::Failed);
    }
}
