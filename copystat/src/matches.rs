//! Scored links between a bibliographic record and a reference entry.

use serde::{Deserialize, Serialize};

/// Sentinel for field scores that were never computed (identifier
/// matches in strict mode skip the similarity pipeline entirely).
pub const SCORE_NOT_COMPUTED: f64 = -1.0;

/// Which reference corpus a match points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    Registration,
    Renewal,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Registration => "registration",
            MatchSource::Renewal => "renewal",
        }
    }
}

/// How the match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// Shared normalized LCCN; definitive evidence of identity.
    Lccn,
    /// Title/author/publisher similarity scoring.
    Similarity,
    /// Similarity match for a query record with no publication year.
    BruteForceWithoutYear,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Lccn => "lccn",
            MatchType::Similarity => "similarity",
            MatchType::BruteForceWithoutYear => "brute_force_without_year",
        }
    }
}

/// A scored link from a bibliographic record to a reference entry.
///
/// Field scores live in [0, 100], or [`SCORE_NOT_COMPUTED`] when the
/// similarity pipeline was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched_title: String,
    pub matched_author: String,
    pub matched_publisher: Option<String>,
    pub matched_date: String,
    pub source_id: String,
    pub source_type: MatchSource,
    pub match_type: MatchType,

    pub title_score: f64,
    pub author_score: f64,
    pub publisher_score: f64,
    /// Weighted combination of the field scores.
    pub similarity_score: f64,

    pub year_difference: i32,

    // Normalized forms of the matched fields, retained so reports can
    // show what was actually compared.
    pub normalized_title: String,
    pub normalized_author: String,
    pub normalized_publisher: String,
}
