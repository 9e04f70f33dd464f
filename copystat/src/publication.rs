//! The central bibliographic entity.

use serde::{Deserialize, Serialize};

use crate::lang::{map_marc_language, Language, LanguageStatus};
use crate::matches::{MatchResult, MatchSource, MatchType};
use crate::norm;
use crate::status::{StatusLabel, StatusRule};

/// Jurisdiction classification derived from the record's country code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CountryClassification {
    Us,
    NonUs,
    #[default]
    Unknown,
}

impl CountryClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            CountryClassification::Us => "US",
            CountryClassification::NonUs => "Non-US",
            CountryClassification::Unknown => "Unknown",
        }
    }
}

/// A publication drawn from a library catalog or a reference corpus.
///
/// Original field values are stored verbatim.  Display accessors
/// return whitespace-collapsed, bracket-stripped forms backed by
/// memoized caches that serialization skips; [`Publication::refresh_caches`]
/// rebuilds them after deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Publication {
    pub original_title: String,
    pub original_author: Option<String>,
    pub original_main_author: Option<String>,
    pub pub_date: Option<String>,
    pub original_publisher: Option<String>,
    pub original_place: Option<String>,
    pub original_edition: Option<String>,
    pub lccn: Option<String>,
    pub normalized_lccn: Option<String>,
    pub language: Language,
    pub language_status: LanguageStatus,
    pub source: Option<String>,
    pub source_id: Option<String>,
    pub full_text: Option<String>,
    pub year: Option<i32>,
    pub country_code: Option<String>,
    pub country_classification: CountryClassification,

    registration_match: Option<MatchResult>,
    renewal_match: Option<MatchResult>,

    pub generic_title_detected: bool,
    pub generic_detection_reason: String,
    pub registration_generic_title: bool,
    pub renewal_generic_title: bool,

    /// Rendered status label, e.g. "US_PRE_1929".
    pub copyright_status: String,
    /// Structured form of the status label.
    pub status_label: Option<StatusLabel>,
    pub status_rule: Option<StatusRule>,
    pub sort_score: f64,
    pub data_completeness: Vec<String>,

    #[serde(skip)]
    cached_title: Option<String>,
    #[serde(skip)]
    cached_author: Option<String>,
    #[serde(skip)]
    cached_main_author: Option<String>,
    #[serde(skip)]
    cached_publisher: Option<String>,
    #[serde(skip)]
    cached_place: Option<String>,
    #[serde(skip)]
    cached_edition: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl Publication {
    /// Create a publication with the provided title.  All other fields
    /// start absent and are applied through the setters, which
    /// normalize empty values to `None`.
    pub fn new(title: impl Into<String>) -> Self {
        let mut p = Publication {
            original_title: title.into(),
            generic_detection_reason: "none".to_string(),
            copyright_status: "COUNTRY_UNKNOWN_NO_MATCH".to_string(),
            ..Default::default()
        };
        p.refresh_caches();
        p
    }

    pub fn set_author(&mut self, value: &str) {
        self.original_author = non_empty(value);
        self.cached_author = Some(display_form(value));
    }

    pub fn set_main_author(&mut self, value: &str) {
        self.original_main_author = non_empty(value);
        self.cached_main_author = Some(display_form(value));
    }

    pub fn set_publisher(&mut self, value: &str) {
        self.original_publisher = non_empty(value);
        self.cached_publisher = Some(display_form(value));
    }

    pub fn set_place(&mut self, value: &str) {
        self.original_place = non_empty(value);
        self.cached_place = Some(display_form(value));
    }

    pub fn set_edition(&mut self, value: &str) {
        self.original_edition = non_empty(value);
        self.cached_edition = Some(display_form(value));
    }

    pub fn set_full_text(&mut self, value: &str) {
        self.full_text = non_empty(value);
    }

    pub fn set_source(&mut self, value: &str) {
        self.source = non_empty(value);
    }

    pub fn set_source_id(&mut self, value: &str) {
        self.source_id = non_empty(value);
    }

    /// Store a publication-date string and extract its year unless a
    /// year was already applied explicitly.
    pub fn set_pub_date(&mut self, value: &str) {
        self.pub_date = non_empty(value);
        if self.year.is_none() {
            self.year = self.pub_date.as_deref().and_then(norm::extract_year);
        }
    }

    /// Apply an explicit publication year.  Values outside the
    /// plausible range [1500, 2099] are treated as absent.
    pub fn set_year(&mut self, year: i32) {
        self.year = if (1500..=2099).contains(&year) {
            Some(year)
        } else {
            None
        };
    }

    /// Store an LCCN and its normalized lookup key.
    pub fn set_lccn(&mut self, value: &str) {
        self.lccn = non_empty(value);
        self.normalized_lccn = self.lccn.as_deref().map(norm::normalize_lccn).filter(|n| !n.is_empty());
    }

    /// Map a MARC language code onto the processing set.
    pub fn set_language_code(&mut self, code: &str) {
        let (language, status) = map_marc_language(code);
        self.language = language;
        self.language_status = status;
    }

    pub fn set_country(&mut self, code: &str, classification: CountryClassification) {
        self.country_code = non_empty(code);
        self.country_classification = classification;
    }

    // --- display accessors -------------------------------------------------

    /// Title with bracketed annotations removed and whitespace
    /// collapsed.
    pub fn title(&self) -> &str {
        self.cached_title
            .as_deref()
            .unwrap_or(&self.original_title)
    }

    /// Transcribed statement-of-responsibility author, cleaned.
    pub fn author(&self) -> &str {
        cached_or(&self.cached_author, &self.original_author)
    }

    /// Normalized heading-form author, cleaned.
    pub fn main_author(&self) -> &str {
        cached_or(&self.cached_main_author, &self.original_main_author)
    }

    pub fn publisher(&self) -> &str {
        cached_or(&self.cached_publisher, &self.original_publisher)
    }

    pub fn place(&self) -> &str {
        cached_or(&self.cached_place, &self.original_place)
    }

    pub fn edition(&self) -> &str {
        cached_or(&self.cached_edition, &self.original_edition)
    }

    /// Rebuild the memoized display forms.  Must be called after
    /// deserialization, which drops the caches.
    pub fn refresh_caches(&mut self) {
        self.cached_title = Some(display_form(&self.original_title));
        self.cached_author = Some(display_form(
            self.original_author.as_deref().unwrap_or(""),
        ));
        self.cached_main_author = Some(display_form(
            self.original_main_author.as_deref().unwrap_or(""),
        ));
        self.cached_publisher = Some(display_form(
            self.original_publisher.as_deref().unwrap_or(""),
        ));
        self.cached_place = Some(display_form(self.original_place.as_deref().unwrap_or("")));
        self.cached_edition = Some(display_form(
            self.original_edition.as_deref().unwrap_or(""),
        ));
    }

    /// True when the display caches are populated.  Deserialization
    /// leaves them empty until [`Publication::refresh_caches`] runs.
    pub fn caches_ready(&self) -> bool {
        self.cached_title.is_some()
    }

    // --- match slots -------------------------------------------------------

    pub fn registration_match(&self) -> Option<&MatchResult> {
        self.registration_match.as_ref()
    }

    /// Apply the best registration match.  The slot owns the match and
    /// rewrites its `source_type` to the canonical value.
    pub fn set_registration_match(&mut self, m: Option<MatchResult>) {
        self.registration_match = m.map(|mut m| {
            m.source_type = MatchSource::Registration;
            m
        });
    }

    pub fn renewal_match(&self) -> Option<&MatchResult> {
        self.renewal_match.as_ref()
    }

    /// Apply the best renewal match, rewriting its `source_type`.
    pub fn set_renewal_match(&mut self, m: Option<MatchResult>) {
        self.renewal_match = m.map(|mut m| {
            m.source_type = MatchSource::Renewal;
            m
        });
    }

    pub fn has_registration_match(&self) -> bool {
        self.registration_match.is_some()
    }

    pub fn has_renewal_match(&self) -> bool {
        self.renewal_match.is_some()
    }

    // --- decision support --------------------------------------------------

    /// Priority used for ranking reported matches: identifier matches
    /// first, then combined-score quality, with renewal-only matches
    /// slightly discounted.
    pub fn calculate_sort_score(&mut self) -> f64 {
        let lccn_match = |m: &Option<MatchResult>| {
            m.as_ref()
                .map(|m| m.match_type == MatchType::Lccn)
                .unwrap_or(false)
        };

        self.sort_score = if lccn_match(&self.registration_match) || lccn_match(&self.renewal_match)
        {
            1000.0
        } else {
            match (&self.registration_match, &self.renewal_match) {
                (Some(reg), Some(ren)) => (reg.similarity_score + ren.similarity_score) / 2.0,
                (Some(reg), None) => reg.similarity_score,
                (None, Some(ren)) => ren.similarity_score * 0.9,
                (None, None) => 0.0,
            }
        };

        self.sort_score
    }

    /// Populate the data-quality issue list.
    pub fn check_data_completeness(&mut self) -> &[String] {
        self.data_completeness.clear();

        if self.year.is_none() {
            self.data_completeness.push("missing_year".to_string());
        }
        if self.original_publisher.is_none() {
            self.data_completeness.push("missing_publisher".to_string());
        }
        if self.original_author.is_none() && self.original_main_author.is_none() {
            self.data_completeness.push("missing_author".to_string());
        }
        if self.generic_title_detected {
            self.data_completeness.push("generic_title".to_string());
        }
        if self.country_code.is_none()
            || self.country_classification == CountryClassification::Unknown
        {
            self.data_completeness.push("unknown_country".to_string());
        }

        &self.data_completeness
    }
}

fn display_form(value: &str) -> String {
    norm::normalize_minimal(&norm::remove_bracketed(value))
}

fn cached_or<'a>(cache: &'a Option<String>, original: &'a Option<String>) -> &'a str {
    cache
        .as_deref()
        .or(original.as_deref())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::SCORE_NOT_COMPUTED;

    fn sample_match(score: f64, match_type: MatchType) -> MatchResult {
        MatchResult {
            matched_title: "Test Book".to_string(),
            matched_author: "Smith, John".to_string(),
            matched_publisher: None,
            matched_date: "1950".to_string(),
            source_id: "REG123".to_string(),
            source_type: MatchSource::Renewal,
            match_type,
            title_score: score,
            author_score: score,
            publisher_score: SCORE_NOT_COMPUTED,
            similarity_score: score,
            year_difference: 0,
            normalized_title: String::new(),
            normalized_author: String::new(),
            normalized_publisher: String::new(),
        }
    }

    #[test]
    fn match_slots_rewrite_source_type() {
        let mut p = Publication::new("Test Book");

        // Intentionally mislabeled; the slot must correct it.
        p.set_registration_match(Some(sample_match(80.0, MatchType::Similarity)));
        assert_eq!(
            p.registration_match().unwrap().source_type,
            MatchSource::Registration
        );

        let mut m = sample_match(70.0, MatchType::Similarity);
        m.source_type = MatchSource::Registration;
        p.set_renewal_match(Some(m));
        assert_eq!(p.renewal_match().unwrap().source_type, MatchSource::Renewal);
    }

    #[test]
    fn empty_setters_become_absent() {
        let mut p = Publication::new("Title");
        p.set_author("   ");
        p.set_publisher("");
        assert!(p.original_author.is_none());
        assert!(p.original_publisher.is_none());
        assert_eq!(p.author(), "");
    }

    #[test]
    fn year_extracted_from_pub_date() {
        let mut p = Publication::new("Title");
        p.set_pub_date("c1923.");
        assert_eq!(p.year, Some(1923));
    }

    #[test]
    fn out_of_range_year_is_absent() {
        let mut p = Publication::new("Title");
        p.set_year(1234);
        assert_eq!(p.year, None);
        p.set_year(1950);
        assert_eq!(p.year, Some(1950));
    }

    #[test]
    fn lccn_normalized_on_set() {
        let mut p = Publication::new("Title");
        p.set_lccn("25-12345");
        assert_eq!(p.normalized_lccn.as_deref(), Some("25012345"));
    }

    #[test]
    fn display_title_strips_brackets() {
        let p = Publication::new("Poems  [microform] :  a selection");
        assert_eq!(p.title(), "Poems : a selection");
    }

    #[test]
    fn sort_score_priorities() {
        let mut p = Publication::new("Title");
        assert_eq!(p.calculate_sort_score(), 0.0);

        p.set_registration_match(Some(sample_match(80.0, MatchType::Similarity)));
        assert_eq!(p.calculate_sort_score(), 80.0);

        p.set_renewal_match(Some(sample_match(60.0, MatchType::Similarity)));
        assert_eq!(p.calculate_sort_score(), 70.0);

        p.set_registration_match(None);
        assert_eq!(p.calculate_sort_score(), 54.0);

        p.set_renewal_match(Some(sample_match(60.0, MatchType::Lccn)));
        assert_eq!(p.calculate_sort_score(), 1000.0);
    }

    #[test]
    fn data_completeness_issues() {
        let mut p = Publication::new("Report");
        p.generic_title_detected = true;
        let issues = p.check_data_completeness().to_vec();
        assert!(issues.contains(&"missing_year".to_string()));
        assert!(issues.contains(&"missing_publisher".to_string()));
        assert!(issues.contains(&"missing_author".to_string()));
        assert!(issues.contains(&"generic_title".to_string()));
        assert!(issues.contains(&"unknown_country".to_string()));

        p.set_year(1950);
        p.set_publisher("Scribner");
        p.set_main_author("Fitzgerald, F. Scott");
        p.set_country("nyu", CountryClassification::Us);
        p.generic_title_detected = false;
        assert!(p.check_data_completeness().is_empty());
    }
}
