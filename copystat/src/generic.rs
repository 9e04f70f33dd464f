//! Generic-title detection.
//!
//! A title is "generic" when its text alone is unreliable evidence of
//! identity: either it matches a configured pattern ("report",
//! "proceedings", ...) or it occurs in the reference corpus more often
//! than a frequency threshold.  The detector is populated once while
//! the candidate index is built and cached alongside it.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::lang::Language;
use crate::norm::normalize_for_matching;

/// Titles matching any of these (as normalized token sequences) are
/// generic regardless of corpus frequency.
pub const DEFAULT_GENERIC_PATTERNS: &[&str] = &[
    "annual report",
    "bulletin",
    "catalog",
    "catalogue",
    "collected works",
    "complete works",
    "journal",
    "minutes",
    "poems",
    "proceedings",
    "report",
    "selected works",
    "transactions",
    "yearbook",
];

/// Default corpus-frequency threshold above which a title is generic.
pub const DEFAULT_FREQUENCY_THRESHOLD: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenericTitleDetector {
    /// Pattern token sequences, already matching-normalized.
    patterns: Vec<Vec<String>>,
    frequency_threshold: u32,
    title_counts: FxHashMap<String, u32>,
}

impl Default for GenericTitleDetector {
    fn default() -> Self {
        Self::new(
            DEFAULT_GENERIC_PATTERNS.iter().map(|s| s.to_string()),
            DEFAULT_FREQUENCY_THRESHOLD,
        )
    }
}

impl GenericTitleDetector {
    pub fn new(patterns: impl IntoIterator<Item = String>, frequency_threshold: u32) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                normalize_for_matching(&p, Language::English)
                    .split_whitespace()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|p| !p.is_empty())
            .collect();

        GenericTitleDetector {
            patterns,
            frequency_threshold,
            title_counts: FxHashMap::default(),
        }
    }

    /// Record one reference-corpus title.  Called during index build.
    pub fn add_title(&mut self, title: &str, language: Language) {
        let key = normalize_for_matching(title, language);
        if key.is_empty() {
            return;
        }
        *self.title_counts.entry(key).or_insert(0) += 1;
    }

    /// Classify a title.  Returns the reason string when generic:
    /// `pattern:<words>` or `frequency:<count>`.
    pub fn detect(&self, title: &str, language: Language) -> Option<String> {
        let normalized = normalize_for_matching(title, language);
        if normalized.is_empty() {
            return None;
        }
        let tokens: Vec<&str> = normalized.split_whitespace().collect();

        for pattern in &self.patterns {
            if pattern.len() > tokens.len() {
                continue;
            }
            let hit = tokens
                .windows(pattern.len())
                .any(|w| w.iter().zip(pattern.iter()).all(|(a, b)| *a == b));
            if hit {
                return Some(format!("pattern:{}", pattern.join(" ")));
            }
        }

        if let Some(&count) = self.title_counts.get(&normalized) {
            if count > self.frequency_threshold {
                return Some(format!("frequency:{count}"));
            }
        }

        None
    }

    /// Convenience wrapper for boolean checks.
    pub fn is_generic(&self, title: &str, language: Language) -> bool {
        self.detect(title, language).is_some()
    }

    pub fn distinct_titles(&self) -> usize {
        self.title_counts.len()
    }
}
