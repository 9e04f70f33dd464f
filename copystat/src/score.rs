//! Field-level fuzzy similarity and weighted combined scoring.
//!
//! The primitives mirror the usual fuzzy-matching family: a plain
//! edit-distance ratio plus token-sort and token-set variants that
//! tolerate word-order differences.  All scores are in [0, 100],
//! deterministic, and computed without I/O.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::norm::normalize_for_matching;
use crate::publication::Publication;

/// Edit-distance similarity of two strings, scaled to [0, 100].
///
/// ```
/// assert_eq!(copystat::score::ratio("annual report", "annual report"), 100.0);
/// assert_eq!(copystat::score::ratio("abcd", "wxyz"), 0.0);
/// ```
pub fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b) * 100.0
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

/// [`ratio`] applied to alphabetically sorted tokens, so word order
/// does not matter.
///
/// ```
/// let a = copystat::score::token_sort_ratio("gatsby great the", "the great gatsby");
/// assert_eq!(a, 100.0);
/// ```
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

/// Token-set similarity: compares the shared token core against each
/// side's full token set, rewarding strings that differ only by extra
/// words.  Commutative; 100 for identical normalized strings.
///
/// ```
/// use copystat::score::token_set_ratio;
///
/// assert_eq!(token_set_ratio("great gatsby", "gatsby great"), 100.0);
/// assert!(token_set_ratio("great gatsby", "great gatsby novel") > 80.0);
/// assert_eq!(token_set_ratio("alpha", "alpha"), 100.0);
/// ```
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();

    let core: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let only_a: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let only_b: Vec<&str> = set_b.difference(&set_a).copied().collect();

    let core_str = core.join(" ");

    let mut full_a = core_str.clone();
    if !only_a.is_empty() {
        if !full_a.is_empty() {
            full_a.push(' ');
        }
        full_a.push_str(&only_a.join(" "));
    }

    let mut full_b = core_str.clone();
    if !only_b.is_empty() {
        if !full_b.is_empty() {
            full_b.push(' ');
        }
        full_b.push_str(&only_b.join(" "));
    }

    ratio(&core_str, &full_a)
        .max(ratio(&core_str, &full_b))
        .max(ratio(&full_a, &full_b))
}

/// Weights applied when combining field scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub title: f64,
    pub author: f64,
    pub publisher: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            title: 0.5,
            author: 0.3,
            publisher: 0.2,
        }
    }
}

/// Per-field scores for one query/candidate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldScores {
    pub title: f64,
    pub author: f64,
    /// `None` when either side lacks publisher data; its weight is
    /// then redistributed to title and author.
    pub publisher: Option<f64>,
    pub combined: f64,
}

/// Computes field and combined scores between publications.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    weights: ScoreWeights,
}

impl SimilarityScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        SimilarityScorer { weights }
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Token-set similarity of the matching-normalized titles.
    pub fn title_score(&self, query: &Publication, candidate: &Publication) -> f64 {
        let q = normalize_for_matching(query.title(), query.language);
        let c = normalize_for_matching(candidate.title(), candidate.language);
        if q.is_empty() || c.is_empty() {
            return 0.0;
        }
        token_set_ratio(&q, &c)
    }

    /// Best score between the candidate's author and whichever of the
    /// query's two author forms agrees with it more.
    pub fn author_score(&self, query: &Publication, candidate: &Publication) -> f64 {
        let cand_raw = if candidate.author().is_empty() {
            candidate.main_author()
        } else {
            candidate.author()
        };
        let cand = normalize_for_matching(cand_raw, candidate.language);
        if cand.is_empty() {
            return 0.0;
        }

        [query.author(), query.main_author()]
            .iter()
            .filter(|a| !a.is_empty())
            .map(|a| {
                let q = normalize_for_matching(a, query.language);
                if q.is_empty() {
                    0.0
                } else {
                    token_set_ratio(&q, &cand)
                }
            })
            .fold(0.0, f64::max)
    }

    /// Publisher similarity, or `None` when either side lacks data.
    pub fn publisher_score(&self, query: &Publication, candidate: &Publication) -> Option<f64> {
        if query.publisher().is_empty() || candidate.publisher().is_empty() {
            return None;
        }
        let q = normalize_for_matching(query.publisher(), query.language);
        let c = normalize_for_matching(candidate.publisher(), candidate.language);
        if q.is_empty() || c.is_empty() {
            return None;
        }
        Some(token_set_ratio(&q, &c))
    }

    /// Compute all field scores and their weighted combination.
    pub fn score_pair(&self, query: &Publication, candidate: &Publication) -> FieldScores {
        let title = self.title_score(query, candidate);
        let author = self.author_score(query, candidate);
        let publisher = self.publisher_score(query, candidate);

        FieldScores {
            title,
            author,
            publisher,
            combined: self.combine(title, author, publisher),
        }
    }

    /// Weighted mean of the field scores.  An absent publisher score
    /// redistributes its weight to title and author in proportion to
    /// their configured weights.
    pub fn combine(&self, title: f64, author: f64, publisher: Option<f64>) -> f64 {
        let w = &self.weights;
        match publisher {
            Some(p) => {
                let denom = w.title + w.author + w.publisher;
                (title * w.title + author * w.author + p * w.publisher) / denom
            }
            None => {
                let denom = w.title + w.author;
                (title * w.title + author * w.author) / denom
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_commutative() {
        let pairs = [
            ("annual report", "annual reports"),
            ("the great gatsby", "great gatsby"),
            ("", "something"),
        ];
        for (a, b) in pairs {
            assert_eq!(ratio(a, b), ratio(b, a));
            assert_eq!(token_set_ratio(a, b), token_set_ratio(b, a));
        }
    }

    #[test]
    fn token_set_handles_word_order_and_extras() {
        assert_eq!(
            token_set_ratio("smith john collected works", "collected works john smith"),
            100.0
        );
        assert!(token_set_ratio("history of england", "history of england volume two") > 90.0);
    }

    #[test]
    fn identical_normalized_strings_score_100() {
        let scorer = SimilarityScorer::default();
        let mut q = Publication::new("The Great Gatsby");
        q.set_main_author("Fitzgerald, F. Scott");
        let mut c = Publication::new("Great Gatsby, The");
        c.set_author("Fitzgerald, F. Scott");

        assert_eq!(scorer.title_score(&q, &c), 100.0);
        assert_eq!(scorer.author_score(&q, &c), 100.0);
    }

    #[test]
    fn author_score_uses_better_of_two_forms() {
        let scorer = SimilarityScorer::default();
        let mut q = Publication::new("Title");
        q.set_author("by John Smith");
        q.set_main_author("Smith, John");
        let mut c = Publication::new("Title");
        c.set_author("Smith, John");

        let both = scorer.author_score(&q, &c);

        let mut q2 = Publication::new("Title");
        q2.set_author("by John Smith");
        let transcribed_only = scorer.author_score(&q2, &c);

        assert!(both >= transcribed_only);
        assert_eq!(both, 100.0);
    }

    #[test]
    fn publisher_absent_on_either_side() {
        let scorer = SimilarityScorer::default();
        let q = Publication::new("Title");
        let mut c = Publication::new("Title");
        c.set_publisher("Scribner");
        assert_eq!(scorer.publisher_score(&q, &c), None);
        assert_eq!(scorer.publisher_score(&c, &q), None);
    }

    #[test]
    fn combine_redistributes_publisher_weight() {
        let scorer = SimilarityScorer::default();

        // All fields present.
        let full = scorer.combine(80.0, 60.0, Some(40.0));
        assert!((full - (80.0 * 0.5 + 60.0 * 0.3 + 40.0 * 0.2)).abs() < 1e-9);

        // Publisher absent: title/author proportions preserved.
        let partial = scorer.combine(80.0, 60.0, None);
        assert!((partial - (80.0 * 0.5 + 60.0 * 0.3) / 0.8).abs() < 1e-9);
    }

    #[test]
    fn custom_weights_respected() {
        let scorer = SimilarityScorer::new(ScoreWeights {
            title: 1.0,
            author: 0.0,
            publisher: 0.0,
        });
        assert_eq!(scorer.combine(90.0, 10.0, Some(10.0)), 90.0);
    }
}
