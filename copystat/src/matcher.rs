//! Per-record candidate selection.
//!
//! Takes a query publication and a candidate set from the index,
//! scores each candidate, applies threshold gates and the generic-title
//! bar, and returns the single best survivor.  Identifier agreement
//! dominates everything else.

use crate::config::Config;
use crate::generic::GenericTitleDetector;
use crate::index::CandidateIndex;
use crate::matches::{MatchResult, MatchSource, MatchType, SCORE_NOT_COMPUTED};
use crate::norm::normalize_for_matching;
use crate::publication::Publication;
use crate::score::{FieldScores, SimilarityScorer};

/// Outcome of a candidate search: the winning entry position plus the
/// evidence needed to build a [`MatchResult`].
#[derive(Debug, Clone)]
pub struct BestMatch {
    pub index: usize,
    pub title_score: f64,
    pub author_score: f64,
    pub publisher_score: f64,
    pub combined_score: f64,
    pub match_type: MatchType,
    pub year_difference: i32,
    /// Reason the query title was classified generic, if it was.
    pub query_generic: Option<String>,
    /// Reason the winning candidate's title was classified generic.
    pub candidate_generic: Option<String>,
}

pub struct MatchingEngine {
    config: Config,
    scorer: SimilarityScorer,
}

impl MatchingEngine {
    pub fn new(config: Config) -> Self {
        let scorer = SimilarityScorer::new(config.score_weights);
        MatchingEngine { config, scorer }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find the best-scoring reference entry for the query, or `None`
    /// when nothing survives the gates.
    ///
    /// Candidates are visited in the deterministic order the index
    /// returns them; ties on combined score keep the earliest.
    pub fn find_best_match(
        &self,
        query: &Publication,
        index: &CandidateIndex,
        detector: &GenericTitleDetector,
    ) -> Option<BestMatch> {
        let brute_force = self.config.brute_force_missing_year && query.year.is_none();
        let candidates = index.find_candidates(query, self.config.year_tolerance, brute_force);
        if candidates.is_empty() {
            return None;
        }

        let query_generic = detector.detect(query.title(), query.language);

        let mut best: Option<BestMatch> = None;

        for pos in candidates {
            let pos = pos as usize;
            let candidate = match index.get(pos) {
                Some(c) => c,
                None => continue,
            };

            let year_difference = match (query.year, candidate.year) {
                (Some(q), Some(c)) => q - c,
                _ => 0,
            };

            // Identifier agreement is definitive; no scoring gate
            // applies and the search ends here.
            if shared_lccn(query, candidate) {
                let scores = if self.config.score_everything {
                    Some(self.scorer.score_pair(query, candidate))
                } else {
                    None
                };
                return Some(self.lccn_match(
                    pos,
                    scores,
                    year_difference,
                    query_generic.clone(),
                    detector.detect(candidate.title(), candidate.language),
                ));
            }

            if !brute_force {
                if let (Some(q), Some(c)) = (query.year, candidate.year) {
                    if (q - c).abs() > self.config.year_tolerance {
                        continue;
                    }
                }
            }

            let scores = self.scorer.score_pair(query, candidate);
            let candidate_generic = detector.detect(candidate.title(), candidate.language);
            let generic = query_generic.is_some() || candidate_generic.is_some();

            if !self.passes_gates(&scores, generic) {
                continue;
            }

            let entry = BestMatch {
                index: pos,
                title_score: scores.title,
                author_score: scores.author,
                publisher_score: scores.publisher.unwrap_or(0.0),
                combined_score: scores.combined,
                match_type: if brute_force {
                    MatchType::BruteForceWithoutYear
                } else {
                    MatchType::Similarity
                },
                year_difference,
                query_generic: query_generic.clone(),
                candidate_generic,
            };

            if scores.title >= self.config.early_exit_title
                && scores.author >= self.config.early_exit_author
            {
                return Some(entry);
            }

            let better = best
                .as_ref()
                .map(|b| entry.combined_score > b.combined_score)
                .unwrap_or(true);
            if better {
                best = Some(entry);
            }
        }

        best
    }

    /// Apply the strict or score-everything gates.
    fn passes_gates(&self, scores: &FieldScores, generic: bool) -> bool {
        if self.config.score_everything {
            return match self.config.minimum_combined_score {
                Some(min) => scores.combined >= min,
                None => true,
            };
        }

        let (author_bar, publisher_bar) = if generic {
            (
                self.config.generic_title_author_threshold,
                self.config.generic_title_publisher_threshold,
            )
        } else {
            (self.config.author_threshold, self.config.publisher_threshold)
        };

        if scores.title < self.config.title_threshold || scores.author < author_bar {
            return false;
        }

        if let Some(p) = scores.publisher {
            if p < publisher_bar {
                return false;
            }
        }

        true
    }

    fn lccn_match(
        &self,
        pos: usize,
        scores: Option<FieldScores>,
        year_difference: i32,
        query_generic: Option<String>,
        candidate_generic: Option<String>,
    ) -> BestMatch {
        match scores {
            Some(s) => BestMatch {
                index: pos,
                title_score: s.title,
                author_score: s.author,
                publisher_score: s.publisher.unwrap_or(0.0),
                combined_score: s.combined,
                match_type: MatchType::Lccn,
                year_difference,
                query_generic,
                candidate_generic,
            },
            None => BestMatch {
                index: pos,
                title_score: SCORE_NOT_COMPUTED,
                author_score: SCORE_NOT_COMPUTED,
                publisher_score: SCORE_NOT_COMPUTED,
                combined_score: SCORE_NOT_COMPUTED,
                match_type: MatchType::Lccn,
                year_difference,
                query_generic,
                candidate_generic,
            },
        }
    }

    /// Materialize a [`MatchResult`] for the winning candidate.  The
    /// `source_type` is provisional; the publication's match slot
    /// rewrites it on assignment.
    pub fn build_match_result(&self, index: &CandidateIndex, best: &BestMatch) -> MatchResult {
        let candidate = index
            .get(best.index)
            .expect("BestMatch position came from this index");

        let author = if candidate.author().is_empty() {
            candidate.main_author()
        } else {
            candidate.author()
        };

        MatchResult {
            matched_title: candidate.title().to_string(),
            matched_author: author.to_string(),
            matched_publisher: candidate.original_publisher.clone(),
            matched_date: candidate.pub_date.clone().unwrap_or_default(),
            source_id: candidate.source_id.clone().unwrap_or_default(),
            source_type: MatchSource::Registration,
            match_type: best.match_type,
            title_score: best.title_score,
            author_score: best.author_score,
            publisher_score: best.publisher_score,
            similarity_score: best.combined_score,
            year_difference: best.year_difference,
            normalized_title: normalize_for_matching(candidate.title(), candidate.language),
            normalized_author: normalize_for_matching(author, candidate.language),
            normalized_publisher: normalize_for_matching(
                candidate.publisher(),
                candidate.language,
            ),
        }
    }
}

fn shared_lccn(query: &Publication, candidate: &Publication) -> bool {
    match (
        query.normalized_lccn.as_deref(),
        candidate.normalized_lccn.as_deref(),
    ) {
        (Some(q), Some(c)) => q == c,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(
        title: &str,
        author: &str,
        year: Option<i32>,
        lccn: Option<&str>,
    ) -> Publication {
        let mut p = Publication::new(title);
        p.set_author(author);
        if let Some(y) = year {
            p.set_year(y);
        }
        if let Some(l) = lccn {
            p.set_lccn(l);
        }
        p.set_source_id("ref-1");
        p
    }

    fn query(title: &str, author: &str, year: Option<i32>) -> Publication {
        let mut p = Publication::new(title);
        p.set_author(author);
        if let Some(y) = year {
            p.set_year(y);
        }
        p
    }

    fn engine(config: Config) -> MatchingEngine {
        MatchingEngine::new(config)
    }

    #[test]
    fn empty_candidate_set_yields_no_match() {
        let index = CandidateIndex::new();
        let detector = GenericTitleDetector::default();
        let e = engine(Config::default());
        let q = query("Anything", "Anyone", Some(1950));
        assert!(e.find_best_match(&q, &index, &detector).is_none());
    }

    #[test]
    fn similarity_match_found() {
        let mut index = CandidateIndex::new();
        index.add(reference("Test Book", "Smith, John", Some(1950), None));
        let detector = GenericTitleDetector::default();
        let e = engine(Config::default());

        let q = query("Test Book", "Smith, John", Some(1950));
        let best = e.find_best_match(&q, &index, &detector).unwrap();
        assert_eq!(best.match_type, MatchType::Similarity);
        assert_eq!(best.title_score, 100.0);
    }

    #[test]
    fn identifier_dominates_weak_scores() {
        let mut index = CandidateIndex::new();
        index.add(reference(
            "Entirely Different Thing",
            "Nobody",
            Some(1980),
            Some("25-12345"),
        ));
        let detector = GenericTitleDetector::default();
        let e = engine(Config::default());

        let mut q = query("Minimal", "", Some(1950));
        q.set_lccn("25012345");

        let best = e.find_best_match(&q, &index, &detector).unwrap();
        assert_eq!(best.match_type, MatchType::Lccn);
        assert_eq!(best.title_score, SCORE_NOT_COMPUTED);
        assert_eq!(best.combined_score, SCORE_NOT_COMPUTED);
    }

    #[test]
    fn identifier_match_scores_in_score_everything_mode() {
        let mut index = CandidateIndex::new();
        index.add(reference("Minimal", "Author", Some(1950), Some("25-12345")));
        let detector = GenericTitleDetector::default();
        let e = engine(Config {
            score_everything: true,
            ..Default::default()
        });

        let mut q = query("Minimal", "Author", Some(1950));
        q.set_lccn("25-12345");

        let best = e.find_best_match(&q, &index, &detector).unwrap();
        assert_eq!(best.match_type, MatchType::Lccn);
        assert!(best.title_score >= 0.0);
    }

    #[test]
    fn thresholds_gate_weak_candidates() {
        let mut index = CandidateIndex::new();
        index.add(reference("Test Book", "Completely Unrelated", Some(1950), None));
        let detector = GenericTitleDetector::default();

        let e = engine(Config::default());
        let q = query("Test Book", "Smith, John", Some(1950));
        // Author score ~0 < threshold.
        assert!(e.find_best_match(&q, &index, &detector).is_none());
    }

    #[test]
    fn raising_thresholds_never_adds_matches() {
        let mut index = CandidateIndex::new();
        index.add(reference("Test Book", "Smith, J.", Some(1950), None));
        let detector = GenericTitleDetector::default();
        let q = query("Test Book", "Smith, John", Some(1950));

        let lenient = engine(Config::default())
            .find_best_match(&q, &index, &detector)
            .is_some();
        let strict = engine(Config {
            author_threshold: 99.0,
            ..Default::default()
        })
        .find_best_match(&q, &index, &detector)
        .is_some();

        assert!(lenient || !strict);
        assert!(lenient);
        assert!(!strict);
    }

    #[test]
    fn year_tolerance_rejects_outside_window() {
        let mut index = CandidateIndex::new();
        index.add(reference("Test Book", "Smith", Some(1950), None));
        index.add(reference("Test Book", "Smith", None, None));
        let detector = GenericTitleDetector::default();

        let e = engine(Config {
            year_tolerance: 1,
            ..Default::default()
        });
        let q = query("Test Book", "Smith", Some(1955));

        // The 1950 entry is out of window; the undated entry (always
        // in the candidate window) survives.
        let best = e.find_best_match(&q, &index, &detector).unwrap();
        assert_eq!(best.index, 1);
    }

    #[test]
    fn generic_title_requires_higher_author_bar() {
        let mut index = CandidateIndex::new();
        index.add(reference("Report", "U.S. Navy Department", Some(1960), None));
        let detector = GenericTitleDetector::default();

        // Similar-but-not-identical author; passes the normal bar,
        // fails the generic bar.
        let q = query("Report", "U.S. Army Department", Some(1960));

        let normal = engine(Config {
            generic_title_author_threshold: 30.0,
            ..Default::default()
        })
        .find_best_match(&q, &index, &detector);
        assert!(normal.is_some());

        let strict = engine(Config {
            generic_title_author_threshold: 95.0,
            ..Default::default()
        })
        .find_best_match(&q, &index, &detector);
        assert!(strict.is_none());
    }

    #[test]
    fn brute_force_matches_yearless_queries() {
        let mut index = CandidateIndex::new();
        index.add(reference("Test Book", "Smith", Some(1950), None));
        let detector = GenericTitleDetector::default();
        let q = query("Test Book", "Smith", None);

        let off = engine(Config::default()).find_best_match(&q, &index, &detector);
        assert!(off.is_none());

        let on = engine(Config {
            brute_force_missing_year: true,
            ..Default::default()
        })
        .find_best_match(&q, &index, &detector)
        .unwrap();
        assert_eq!(on.match_type, MatchType::BruteForceWithoutYear);
    }

    #[test]
    fn best_survivor_wins() {
        // Neither candidate reaches the early-exit bar; the scan must
        // cover the full set and keep the higher combined score.
        let mut index = CandidateIndex::new();
        index.add(reference("Test Volume", "Smith, John", Some(1950), None));
        index.add(reference("Test Booklet", "Smith, John", Some(1950), None));
        let detector = GenericTitleDetector::default();
        let e = engine(Config::default());

        let q = query("Test Book", "Smith, John", Some(1950));
        let best = e.find_best_match(&q, &index, &detector).unwrap();
        assert_eq!(best.index, 1);
        assert!(best.combined_score > 0.0);
    }

    #[test]
    fn minimum_combined_score_in_score_everything_mode() {
        let mut index = CandidateIndex::new();
        index.add(reference("Test Book", "Different Person", Some(1950), None));
        let detector = GenericTitleDetector::default();
        let q = query("Test Book", "Smith", Some(1950));

        let permissive = engine(Config {
            score_everything: true,
            ..Default::default()
        })
        .find_best_match(&q, &index, &detector);
        assert!(permissive.is_some());

        let floored = engine(Config {
            score_everything: true,
            minimum_combined_score: Some(90.0),
            ..Default::default()
        })
        .find_best_match(&q, &index, &detector);
        assert!(floored.is_none());
    }
}
