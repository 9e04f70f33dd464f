//! Job configuration.
//!
//! A single serde-backed structure covering matching thresholds, load
//! filters, batch/pool sizing, and status-engine overrides.  Loaded
//! from a JSON file or constructed with defaults; validated once at
//! job start so bad settings fail fast instead of mid-run.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CsError, CsResult};
use crate::generic::{DEFAULT_FREQUENCY_THRESHOLD, DEFAULT_GENERIC_PATTERNS};
use crate::score::ScoreWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum title score in strict mode.
    pub title_threshold: f64,
    /// Minimum author score in strict mode.
    pub author_threshold: f64,
    /// Minimum publisher score in strict mode, applied when both
    /// sides carry publisher data.
    pub publisher_threshold: f64,

    /// Short-circuit the candidate scan when title and author both
    /// reach these.
    pub early_exit_title: f64,
    pub early_exit_author: f64,
    pub early_exit_publisher: f64,

    /// Window for year-based candidate filtering.
    pub year_tolerance: i32,

    /// Record filters applied at load time.
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub us_only: bool,

    /// Records per on-disk batch.
    pub batch_size: usize,
    /// Worker pool size; defaults to available parallelism.
    pub num_processes: Option<usize>,

    /// Compute every field score and skip the strict per-field gates.
    pub score_everything: bool,
    /// Floor on the combined score; only consulted with
    /// `score_everything`.
    pub minimum_combined_score: Option<f64>,

    /// Permit matches for queries with no publication year.
    pub brute_force_missing_year: bool,

    /// Status-engine overrides.
    pub copyright_expiration_year: Option<i32>,
    pub max_data_year: Option<i32>,

    /// Raised author/publisher bars applied when either title in a
    /// comparison is generic.
    pub generic_title_author_threshold: f64,
    pub generic_title_publisher_threshold: f64,
    pub generic_title_patterns: Vec<String>,
    pub generic_frequency_threshold: u32,

    pub score_weights: ScoreWeights,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            title_threshold: 40.0,
            author_threshold: 30.0,
            publisher_threshold: 30.0,
            early_exit_title: 95.0,
            early_exit_author: 90.0,
            early_exit_publisher: 85.0,
            year_tolerance: 1,
            min_year: None,
            max_year: None,
            us_only: false,
            batch_size: 1000,
            num_processes: None,
            score_everything: false,
            minimum_combined_score: None,
            brute_force_missing_year: false,
            copyright_expiration_year: None,
            max_data_year: None,
            generic_title_author_threshold: 60.0,
            generic_title_publisher_threshold: 60.0,
            generic_title_patterns: DEFAULT_GENERIC_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            generic_frequency_threshold: DEFAULT_FREQUENCY_THRESHOLD,
            score_weights: ScoreWeights::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults
    /// for any omitted field.
    pub fn from_file(path: &Path) -> CsResult<Config> {
        let text = fs::read_to_string(path)
            .map_err(|e| CsError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| CsError::Config(format!("cannot parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject nonsensical settings before any work begins.
    pub fn validate(&self) -> CsResult<()> {
        let pct = |name: &str, v: f64| -> CsResult<()> {
            if !(0.0..=100.0).contains(&v) {
                return Err(CsError::Config(format!("{name} must be in [0, 100], got {v}")));
            }
            Ok(())
        };

        pct("title_threshold", self.title_threshold)?;
        pct("author_threshold", self.author_threshold)?;
        pct("publisher_threshold", self.publisher_threshold)?;
        pct("early_exit_title", self.early_exit_title)?;
        pct("early_exit_author", self.early_exit_author)?;
        pct("early_exit_publisher", self.early_exit_publisher)?;
        pct(
            "generic_title_author_threshold",
            self.generic_title_author_threshold,
        )?;
        pct(
            "generic_title_publisher_threshold",
            self.generic_title_publisher_threshold,
        )?;
        if let Some(min) = self.minimum_combined_score {
            pct("minimum_combined_score", min)?;
        }

        if self.year_tolerance < 0 {
            return Err(CsError::Config(format!(
                "year_tolerance must be >= 0, got {}",
                self.year_tolerance
            )));
        }

        if self.batch_size == 0 {
            return Err(CsError::Config("batch_size must be >= 1".to_string()));
        }

        if self.num_processes == Some(0) {
            return Err(CsError::Config("num_processes must be >= 1".to_string()));
        }

        if let (Some(min), Some(max)) = (self.min_year, self.max_year) {
            if min > max {
                return Err(CsError::Config(format!(
                    "min_year {min} exceeds max_year {max}"
                )));
            }
        }

        let w = &self.score_weights;
        if w.title < 0.0 || w.author < 0.0 || w.publisher < 0.0 || w.title + w.author <= 0.0 {
            return Err(CsError::Config(
                "score weights must be non-negative with title + author > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Effective worker pool size.
    pub fn worker_count(&self) -> usize {
        match self.num_processes {
            Some(n) => n.max(1),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn bad_threshold_rejected() {
        let config = Config {
            title_threshold: 150.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CsError::Config(_))));
    }

    #[test]
    fn impossible_year_filter_rejected() {
        let config = Config {
            min_year: Some(1960),
            max_year: Some(1950),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = Config {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{"title_threshold": 55.0}"#).unwrap();
        assert_eq!(config.title_threshold, 55.0);
        assert_eq!(config.author_threshold, 30.0);
        assert_eq!(config.batch_size, 1000);
    }
}
