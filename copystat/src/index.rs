//! Multi-key inverted index over a reference corpus.
//!
//! The index owns its reference entries; lookups return entry
//! positions which callers dereference through [`CandidateIndex::get`].
//! Build is append-only; once a corpus has been loaded the index is
//! treated as immutable and may be shared read-only across workers.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::norm::normalize_for_matching;
use crate::publication::Publication;

/// Minimum token length admitted to the word maps.
const MIN_TOKEN_LEN: usize = 2;

/// Summary counts for logging and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_entries: usize,
    pub lccn_keys: usize,
    pub title_keys: usize,
    pub author_keys: usize,
    pub publisher_keys: usize,
    pub year_keys: usize,
    pub entries_without_year: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateIndex {
    entries: Vec<Publication>,
    lccn_map: FxHashMap<String, Vec<u32>>,
    title_map: FxHashMap<String, Vec<u32>>,
    author_map: FxHashMap<String, Vec<u32>>,
    publisher_map: FxHashMap<String, Vec<u32>>,
    year_map: FxHashMap<i32, Vec<u32>>,
    /// Entries with no extractable year; consulted by every
    /// year-window lookup so such entries are never unreachable.
    unknown_year: Vec<u32>,
}

impl CandidateIndex {
    pub fn new() -> Self {
        CandidateIndex::default()
    }

    /// Index one reference publication.  The index takes ownership.
    pub fn add(&mut self, publication: Publication) {
        let id = self.entries.len() as u32;

        if let Some(lccn) = publication.normalized_lccn.as_deref() {
            self.lccn_map.entry(lccn.to_string()).or_default().push(id);
        }

        for token in word_tokens(publication.title(), &publication) {
            self.title_map.entry(token).or_default().push(id);
        }

        let author_src = if publication.author().is_empty() {
            publication.main_author().to_string()
        } else {
            publication.author().to_string()
        };
        for token in word_tokens(&author_src, &publication) {
            self.author_map.entry(token).or_default().push(id);
        }

        for token in word_tokens(publication.publisher(), &publication) {
            self.publisher_map.entry(token).or_default().push(id);
        }

        match publication.year {
            Some(year) => self.year_map.entry(year).or_default().push(id),
            None => self.unknown_year.push(id),
        }

        self.entries.push(publication);
    }

    /// Dereference a candidate position.
    pub fn get(&self, idx: usize) -> Option<&Publication> {
        self.entries.get(idx)
    }

    pub fn entries(&self) -> &[Publication] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All positions sharing the provided normalized LCCN.
    pub fn lccn_candidates(&self, normalized_lccn: &str) -> Option<&[u32]> {
        self.lccn_map.get(normalized_lccn).map(|v| v.as_slice())
    }

    /// Candidate lookup.
    ///
    /// 1. An LCCN hit dominates: all entries at that identifier are
    ///    returned immediately and the year window is ignored.
    /// 2. Otherwise title-word candidates intersected with the year
    ///    window (± `year_tolerance`, plus the unknown-year bucket).
    /// 3. If that is empty, author-word candidates against the same
    ///    window.
    /// 4. If still empty and `brute_force` is set, all title-word
    ///    candidates regardless of year.
    ///
    /// Returns positions in ascending order; ranking is the matcher's
    /// concern.
    pub fn find_candidates(
        &self,
        query: &Publication,
        year_tolerance: i32,
        brute_force: bool,
    ) -> BTreeSet<u32> {
        if let Some(lccn) = query.normalized_lccn.as_deref() {
            if let Some(ids) = self.lccn_map.get(lccn) {
                return ids.iter().copied().collect();
            }
        }

        let title_union = self.word_union(&self.title_map, query.title(), query);

        let year_window = self.year_window(query.year, year_tolerance);

        if let Some(window) = &year_window {
            let narrowed: BTreeSet<u32> =
                title_union.intersection(window).copied().collect();
            if !narrowed.is_empty() {
                return narrowed;
            }

            let mut author_src = query.author();
            if author_src.is_empty() {
                author_src = query.main_author();
            }
            let author_union = self.word_union(&self.author_map, author_src, query);
            let narrowed: BTreeSet<u32> =
                author_union.intersection(window).copied().collect();
            if !narrowed.is_empty() {
                return narrowed;
            }
        }

        if brute_force {
            return title_union;
        }

        BTreeSet::new()
    }

    fn word_union(
        &self,
        map: &FxHashMap<String, Vec<u32>>,
        text: &str,
        publication: &Publication,
    ) -> BTreeSet<u32> {
        let mut out = BTreeSet::new();
        for token in word_tokens(text, publication) {
            if let Some(ids) = map.get(&token) {
                out.extend(ids.iter().copied());
            }
        }
        out
    }

    /// Union of the year buckets within the tolerance window plus the
    /// unknown-year bucket.  `None` when the query itself has no year.
    fn year_window(&self, year: Option<i32>, tolerance: i32) -> Option<BTreeSet<u32>> {
        let year = year?;
        let mut out: BTreeSet<u32> = self.unknown_year.iter().copied().collect();
        for y in (year - tolerance)..=(year + tolerance) {
            if let Some(ids) = self.year_map.get(&y) {
                out.extend(ids.iter().copied());
            }
        }
        Some(out)
    }

    /// Rebuild the entries' display caches.  Needed after the index
    /// is deserialized from the artifact cache.
    pub fn refresh_caches(&mut self) {
        for publication in self.entries.iter_mut() {
            publication.refresh_caches();
        }
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            total_entries: self.entries.len(),
            lccn_keys: self.lccn_map.len(),
            title_keys: self.title_map.len(),
            author_keys: self.author_map.len(),
            publisher_keys: self.publisher_map.len(),
            year_keys: self.year_map.len(),
            entries_without_year: self.unknown_year.len(),
        }
    }
}

/// Distinct matching-normalized tokens of length >= MIN_TOKEN_LEN.
fn word_tokens(text: &str, publication: &Publication) -> Vec<String> {
    let normalized = normalize_for_matching(text, publication.language);
    let mut tokens: Vec<String> = normalized
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .map(|t| t.to_string())
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(title: &str, author: &str, year: Option<i32>, lccn: Option<&str>) -> Publication {
        let mut p = Publication::new(title);
        p.set_author(author);
        if let Some(y) = year {
            p.set_year(y);
        }
        if let Some(l) = lccn {
            p.set_lccn(l);
        }
        p.set_source_id(&format!("ref-{title}"));
        p
    }

    fn query(title: &str, year: Option<i32>) -> Publication {
        let mut p = Publication::new(title);
        if let Some(y) = year {
            p.set_year(y);
        }
        p
    }

    fn build() -> CandidateIndex {
        let mut idx = CandidateIndex::new();
        idx.add(reference("The Great Gatsby", "Fitzgerald", Some(1925), None));
        idx.add(reference("Test Book", "Smith", Some(1950), Some("25-12345")));
        idx.add(reference("Undated Mystery", "Doe", None, None));
        idx.add(reference("Test Book Again", "Jones", Some(1960), None));
        idx
    }

    #[test]
    fn identifier_lookup_dominates() {
        let idx = build();
        let mut q = query("Completely Different Title", Some(1800));
        q.set_lccn("25012345");

        let found = idx.find_candidates(&q, 0, false);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn title_words_intersect_year_window() {
        let idx = build();
        let q = query("Test Book", Some(1951));

        // Tolerance 0 misses 1950 but still sees the unknown-year bucket.
        let found = idx.find_candidates(&q, 0, false);
        assert!(!found.contains(&1));

        let found = idx.find_candidates(&q, 1, false);
        assert!(found.contains(&1));
    }

    #[test]
    fn unknown_year_bucket_always_in_window() {
        let idx = build();
        let q = query("Undated Mystery", Some(1700));
        let found = idx.find_candidates(&q, 0, false);
        assert!(found.contains(&2));
    }

    #[test]
    fn author_fallback_when_title_misses() {
        let idx = build();
        let mut q = query("Totally Unrelated Name", Some(1950));
        q.set_author("Smith");
        let found = idx.find_candidates(&q, 0, false);
        assert!(found.contains(&1));
    }

    #[test]
    fn brute_force_ignores_year() {
        let idx = build();
        let q = query("Test Book", None);

        assert!(idx.find_candidates(&q, 1, false).is_empty());

        let found = idx.find_candidates(&q, 1, true);
        assert!(found.contains(&1));
        assert!(found.contains(&3));
    }

    #[test]
    fn every_entry_reaches_the_year_index() {
        let idx = build();
        let stats = idx.stats();
        let indexed_years: usize = stats.entries_without_year
            + idx
                .year_map
                .values()
                .map(|v| v.len())
                .sum::<usize>();
        assert_eq!(indexed_years, stats.total_entries);
    }

    #[test]
    fn deterministic_for_same_corpus() {
        let a = build().find_candidates(&query("Test Book", Some(1950)), 1, false);
        let b = build().find_candidates(&query("Test Book", Some(1950)), 1, false);
        assert_eq!(a, b);
    }
}
