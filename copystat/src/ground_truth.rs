//! Ground-truth pair extraction.
//!
//! For matcher evaluation: walk the on-disk MARC batches and keep
//! every record whose normalized LCCN also appears in a reference
//! corpus, paired with the identifier-matched entry (real field
//! scores included, since these pairs exist to calibrate the scorer).
//! Streams batch by batch, so memory stays bounded.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::batch;
use crate::error::CsResult;
use crate::index::CandidateIndex;
use crate::matches::{MatchResult, MatchSource, MatchType};
use crate::norm::normalize_for_matching;
use crate::publication::Publication;
use crate::score::SimilarityScorer;

/// Aggregate counts for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundTruthStats {
    pub marc_total: usize,
    pub marc_with_lccn: usize,
    pub registration_matches: usize,
    pub renewal_matches: usize,
    pub unique_lccns_matched: usize,
}

pub struct GroundTruthExtractor<'a> {
    registration: &'a CandidateIndex,
    renewal: &'a CandidateIndex,
    scorer: SimilarityScorer,
}

impl<'a> GroundTruthExtractor<'a> {
    pub fn new(registration: &'a CandidateIndex, renewal: &'a CandidateIndex) -> Self {
        GroundTruthExtractor {
            registration,
            renewal,
            scorer: SimilarityScorer::default(),
        }
    }

    /// Extract identifier-matched pairs from the given batch files.
    /// Returns the matched records (with their match slots filled)
    /// plus the aggregate counts.
    pub fn extract_from_batches(
        &self,
        batch_paths: &[PathBuf],
    ) -> CsResult<(Vec<Publication>, GroundTruthStats)> {
        let mut stats = GroundTruthStats::default();
        let mut matched_lccns: HashSet<String> = HashSet::new();
        let mut pairs: Vec<Publication> = Vec::new();

        for path in batch_paths {
            let publications = batch::read_batch(path)?;
            stats.marc_total += publications.len();

            for mut publication in publications {
                let lccn = match publication.normalized_lccn.clone() {
                    Some(l) => l,
                    None => continue,
                };
                stats.marc_with_lccn += 1;

                let registration = self.identifier_match(&publication, &lccn, self.registration);
                let renewal = self.identifier_match(&publication, &lccn, self.renewal);

                if registration.is_none() && renewal.is_none() {
                    continue;
                }

                if registration.is_some() {
                    stats.registration_matches += 1;
                }
                if renewal.is_some() {
                    stats.renewal_matches += 1;
                }
                matched_lccns.insert(lccn);

                publication.set_registration_match(registration);
                publication.set_renewal_match(renewal);
                publication.calculate_sort_score();
                pairs.push(publication);
            }
        }

        stats.unique_lccns_matched = matched_lccns.len();

        log::info!(
            "Ground truth: {} of {} records carried an LCCN; {} registration and {} renewal pairs over {} unique identifiers",
            stats.marc_with_lccn,
            stats.marc_total,
            stats.registration_matches,
            stats.renewal_matches,
            stats.unique_lccns_matched,
        );

        Ok((pairs, stats))
    }

    /// Identifier-based match against one corpus, with real field
    /// scores.
    fn identifier_match(
        &self,
        query: &Publication,
        lccn: &str,
        index: &CandidateIndex,
    ) -> Option<MatchResult> {
        let pos = *index.lccn_candidates(lccn)?.first()? as usize;
        let candidate = index.get(pos)?;

        let scores = self.scorer.score_pair(query, candidate);
        let author = if candidate.author().is_empty() {
            candidate.main_author()
        } else {
            candidate.author()
        };

        let year_difference = match (query.year, candidate.year) {
            (Some(q), Some(c)) => q - c,
            _ => 0,
        };

        Some(MatchResult {
            matched_title: candidate.title().to_string(),
            matched_author: author.to_string(),
            matched_publisher: candidate.original_publisher.clone(),
            matched_date: candidate.pub_date.clone().unwrap_or_default(),
            source_id: candidate.source_id.clone().unwrap_or_default(),
            source_type: MatchSource::Registration,
            match_type: MatchType::Lccn,
            title_score: scores.title,
            author_score: scores.author,
            publisher_score: scores.publisher.unwrap_or(0.0),
            similarity_score: scores.combined,
            year_difference,
            normalized_title: normalize_for_matching(candidate.title(), candidate.language),
            normalized_author: normalize_for_matching(author, candidate.language),
            normalized_publisher: normalize_for_matching(
                candidate.publisher(),
                candidate.language,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(title: &str, lccn: Option<&str>) -> Publication {
        let mut p = Publication::new(title);
        p.set_author("Author, Some");
        p.set_year(1950);
        if let Some(l) = lccn {
            p.set_lccn(l);
        }
        p.set_source_id(&format!("REF-{title}"));
        p
    }

    fn marc(title: &str, lccn: Option<&str>, id: &str) -> Publication {
        let mut p = Publication::new(title);
        p.set_author("Author, Some");
        p.set_year(1950);
        if let Some(l) = lccn {
            p.set_lccn(l);
        }
        p.set_source_id(id);
        p
    }

    #[test]
    fn pairs_only_identifier_matches() {
        let mut registration = CandidateIndex::new();
        registration.add(reference("Registered Work", Some("25-11111")));
        let mut renewal = CandidateIndex::new();
        renewal.add(reference("Renewed Work", Some("25-22222")));

        let dir = tempfile::tempdir().unwrap();
        let batch_path = dir.path().join("batch_000001.bin");
        batch::write_batch(
            &batch_path,
            &[
                marc("Registered Work", Some("25-11111"), "M-1"),
                marc("Renewed Work", Some("25-22222"), "M-2"),
                marc("No Identifier", None, "M-3"),
                marc("Unmatched Identifier", Some("25-99999"), "M-4"),
            ],
        )
        .unwrap();

        let extractor = GroundTruthExtractor::new(&registration, &renewal);
        let (pairs, stats) = extractor.extract_from_batches(&[batch_path]).unwrap();

        assert_eq!(stats.marc_total, 4);
        assert_eq!(stats.marc_with_lccn, 3);
        assert_eq!(stats.registration_matches, 1);
        assert_eq!(stats.renewal_matches, 1);
        assert_eq!(stats.unique_lccns_matched, 2);

        assert_eq!(pairs.len(), 2);
        assert!(pairs[0].has_registration_match());
        assert_eq!(
            pairs[0].registration_match().unwrap().match_type,
            MatchType::Lccn
        );
        // Ground-truth pairs carry real scores for calibration.
        assert!(pairs[0].registration_match().unwrap().title_score >= 0.0);
        assert!(pairs[1].has_renewal_match());
        assert_eq!(
            pairs[1].renewal_match().unwrap().source_type,
            MatchSource::Renewal
        );
    }
}
