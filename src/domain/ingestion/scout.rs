//! Scout agent: generates up to five search queries, dispatches them through
//! a [`SearchAdapter`], and ranks candidates official-first (§4.3).
//!
//! Grounded on `original_source/src/agents/scout.py`: the domain tables and
//! query templates are carried over; `_execute_search`'s mock HTTP results
//! are not, since the real search call is a trait boundary per the
//! Non-goals — callers inject their own [`SearchAdapter`].

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::domain::orchestration::{GraphStateNode, GraphStateNodeError};
use crate::domain::schemas::{AgentStatus, AuthorityHint, GraphState, ScoutOutput, SearchCandidate};
use crate::node::NodeContext;

/// Outbound search adapter the core consumes (interface only, §6).
#[async_trait]
pub trait SearchAdapter: Send + Sync {
    async fn search(
        &self,
        query: &str,
        region: &str,
        max_results: usize,
    ) -> Result<Vec<SearchCandidate>, String>;
}

/// Known official education domains by ISO-2 country code.
static OFFICIAL_DOMAINS: LazyLock<HashMap<&'static str, Vec<&'static str>>> = LazyLock::new(|| {
    HashMap::from([
        ("NG", vec!["nerdc.gov.ng", "education.gov.ng", "waec.org.ng"]),
        ("KE", vec!["kicd.ac.ke", "education.go.ke", "knec.ac.ke"]),
        ("GH", vec!["nacca.gov.gh", "moe.gov.gh"]),
        ("ZA", vec!["education.gov.za", "dbe.gov.za"]),
        ("US", vec![".gov", "corestandards.org"]),
        ("GB", vec!["gov.uk", "education.gov.uk"]),
        ("CA", vec![".edu.on.ca", ".edu.bc.ca", ".edu.ab.ca"]),
    ])
});

/// University and higher-education domains, global (not country-scoped).
static UNIVERSITY_DOMAINS: &[&str] = &[
    ".edu",
    ".ac.uk",
    ".ac.za",
    ".edu.ng",
    ".edu.au",
    "ocw.mit.edu",
    "coursera.org",
    "edx.org",
    "khanacademy.org",
    "harvard.edu",
    "stanford.edu",
    "ox.ac.uk",
    "cam.ac.uk",
];

static UNIVERSITY_GRADE_TERMS: &[&str] = &[
    "university",
    "college",
    "bachelor",
    "master",
    "phd",
    "undergraduate",
    "graduate",
    "bsc",
    "msc",
    "ba",
    "ma",
    "year 1",
    "year 2",
    "year 3",
    "year 4",
    "freshman",
    "sophomore",
    "junior",
    "senior",
    "101",
    "201",
    "301",
    "401",
];

static URL_HOST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://([^/]+)").unwrap());

const MAX_QUERIES: usize = 5;
const MAX_CANDIDATES: usize = 10;

/// Builds up to five search queries, branching on a university-vs-K12
/// heuristic over the grade text.
pub fn generate_queries(country: &str, grade: &str, subject: &str) -> Vec<String> {
    let grade_lower = grade.to_lowercase();
    let is_university = UNIVERSITY_GRADE_TERMS.iter().any(|t| grade_lower.contains(t));

    let queries = if is_university {
        vec![
            format!("{subject} {grade} syllabus PDF"),
            format!("{subject} course outline {grade} university"),
            format!("{subject} curriculum {grade} learning outcomes"),
            format!("{grade} {subject} course description syllabus"),
            format!("MIT OpenCourseWare {subject} OR Coursera {subject} syllabus"),
        ]
    } else {
        vec![
            format!("{country} {grade} {subject} curriculum official PDF"),
            format!("{country} {grade} {subject} syllabus ministry of education"),
            format!("official {subject} curriculum {grade} {country} filetype:pdf"),
            format!("{country} national curriculum {subject} {grade}"),
            format!("{subject} learning outcomes {grade} {country} education"),
        ]
    };
    queries.into_iter().take(MAX_QUERIES).collect()
}

fn extract_domain(url: &str) -> String {
    URL_HOST_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Re-detects the authority hint for a URL against the official/university
/// domain tables, generic `.gov`/`.edu`/`.ac.` patterns.
pub fn detect_authority(url: &str, iso2: &str) -> AuthorityHint {
    let domain = extract_domain(url);
    if let Some(official) = OFFICIAL_DOMAINS.get(iso2) {
        if official.iter().any(|d| domain.contains(d)) {
            return AuthorityHint::Official;
        }
    }
    if UNIVERSITY_DOMAINS.iter().any(|d| domain.contains(d)) {
        return AuthorityHint::Official;
    }
    if domain.contains(".gov.") || url.contains("/gov/") {
        return AuthorityHint::Official;
    }
    if domain.contains(".edu") || domain.contains(".ac.") {
        return AuthorityHint::Official;
    }
    AuthorityHint::Unknown
}

/// Deduplicates by URL, re-detects authority, then sorts official-first and
/// by original rank, capping at [`MAX_CANDIDATES`].
pub fn rank_and_deduplicate(mut candidates: Vec<SearchCandidate>, iso2: &str) -> Vec<SearchCandidate> {
    let mut seen = HashSet::new();
    candidates.retain(|c| seen.insert(c.url.clone()));
    for c in &mut candidates {
        c.authority_hint = detect_authority(&c.url, iso2);
    }
    candidates.sort_by_key(|c| {
        (
            if c.authority_hint == AuthorityHint::Official { 0 } else { 1 },
            c.original_rank,
        )
    });
    candidates.truncate(MAX_CANDIDATES);
    candidates
}

pub struct ScoutAgent {
    search: std::sync::Arc<dyn SearchAdapter>,
}

impl ScoutAgent {
    pub fn new(search: std::sync::Arc<dyn SearchAdapter>) -> Self {
        Self { search }
    }

    /// Runs the full search → rank → dedup pipeline for one job.
    pub async fn run(
        &self,
        job_id: &str,
        country: &str,
        iso2: &str,
        grade: &str,
        subject: &str,
    ) -> ScoutOutput {
        let queries = generate_queries(country, grade, subject);
        let mut all = Vec::new();
        for query in &queries {
            match self.search.search(query, iso2, MAX_CANDIDATES).await {
                Ok(mut results) => all.append(&mut results),
                Err(err) => tracing::warn!(query, error = %err, "search adapter call failed"),
            }
        }
        let ranked = rank_and_deduplicate(all, iso2);
        if ranked.is_empty() {
            ScoutOutput {
                job_id: job_id.to_string(),
                candidates: Vec::new(),
                status: AgentStatus::Failed,
            }
        } else {
            ScoutOutput {
                job_id: job_id.to_string(),
                candidates: ranked,
                status: AgentStatus::Success,
            }
        }
    }
}

#[async_trait]
impl GraphStateNode for ScoutAgent {
    fn name(&self) -> &'static str {
        "Scout"
    }

    async fn execute(&self, state: &mut GraphState, _ctx: &NodeContext) -> Result<(), GraphStateNodeError> {
        let request = state
            .normalized_request
            .clone()
            .ok_or_else(|| GraphStateNodeError::new("E_MISSING_INPUT", false, "no normalized request"))?;
        let output = self
            .run(
                &state.request_id,
                &request.country_name,
                &request.iso2,
                &request.grade,
                &request.subject,
            )
            .await;
        let failed = output.status == AgentStatus::Failed;
        state.scout = Some(output);
        if failed {
            return Err(GraphStateNodeError::new(
                "E_SCOUT_NO_CANDIDATES",
                true,
                "scout found no candidate sources",
            ));
        }
        Ok(())
    }
}
