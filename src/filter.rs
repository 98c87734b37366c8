//! Selects the discovered URLs that are likely to list people or contact details.

use url::Url;

/// Substrings that mark a URL as a candidate.
const CANDIDATE_KEYWORDS: [&str; 15] = [
    "about",
    "team",
    "contact",
    "people",
    "leadership",
    "founder",
    "staff",
    "employee",
    "management",
    "executive",
    "our-team",
    "meet-",
    "who-we-are",
    "board",
    "directors",
];

/// Path endings that mark a URL as a candidate.
const CANDIDATE_PATH_SUFFIXES: [&str; 3] = ["/about", "/contact", "/team"];

/// Number of URLs kept when no candidate matches.
pub(crate) const FALLBACK_URL_COUNT: usize = 50;

/// Result of candidate filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CandidateSelection {
    pub urls: Vec<String>,
    /// True when nothing matched and the unfiltered prefix was used instead.
    pub used_fallback: bool,
}

fn is_candidate(url: &str) -> bool {
    let lower = url.to_lowercase();
    if CANDIDATE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }

    let path = Url::parse(&lower)
        .map(|u| u.path().to_string())
        .unwrap_or(lower);
    CANDIDATE_PATH_SUFFIXES.iter().any(|s| path.ends_with(s))
}

/// Keeps the URLs likely to contain contact data, preserving input order.
///
/// When nothing matches, the first [`FALLBACK_URL_COUNT`] input URLs are
/// returned instead and `used_fallback` is set.
pub(crate) fn filter_candidates(urls: &[String]) -> CandidateSelection {
    let candidates: Vec<String> = urls.iter().filter(|u| is_candidate(u)).cloned().collect();

    if candidates.is_empty() {
        tracing::warn!(target: "pipeline_task",
            "No candidate pages found, using first {} URLs as fallback",
            FALLBACK_URL_COUNT
        );
        return CandidateSelection {
            urls: urls.iter().take(FALLBACK_URL_COUNT).cloned().collect(),
            used_fallback: true,
        };
    }

    CandidateSelection {
        urls: candidates,
        used_fallback: false,
    }
}
