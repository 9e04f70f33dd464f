//! Result aggregation and export seams.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::batch::BatchStats;
use crate::error::{CsError, CsResult};
use crate::matches::MatchResult;
use crate::publication::{CountryClassification, Publication};

/// Aggregate statistics for one analysis run.  All counters are sums,
/// so batches may be absorbed in any completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatistics {
    pub total_records: usize,
    pub us_records: usize,
    pub non_us_records: usize,
    pub unknown_country: usize,
    pub registration_matches: usize,
    pub renewal_matches: usize,
    pub no_matches: usize,
    pub skipped_records: usize,
    pub records_with_errors: usize,
    pub failed_batches: usize,
    pub processing_time_seconds: f64,
    /// One counter per final status label encountered.
    pub status_counts: BTreeMap<String, usize>,
}

impl AnalysisStatistics {
    /// Fold one processed publication into the counters.
    pub fn record(&mut self, publication: &Publication) {
        self.total_records += 1;

        match publication.country_classification {
            CountryClassification::Us => self.us_records += 1,
            CountryClassification::NonUs => self.non_us_records += 1,
            CountryClassification::Unknown => self.unknown_country += 1,
        }

        let has_reg = publication.has_registration_match();
        let has_ren = publication.has_renewal_match();
        if has_reg {
            self.registration_matches += 1;
        }
        if has_ren {
            self.renewal_matches += 1;
        }
        if !has_reg && !has_ren {
            self.no_matches += 1;
        }

        *self
            .status_counts
            .entry(publication.copyright_status.clone())
            .or_insert(0) += 1;
    }

    /// Fold one batch's bookkeeping counters in.
    pub fn absorb_batch(&mut self, stats: &BatchStats) {
        self.skipped_records += stats.skipped_records;
        self.records_with_errors += stats.records_with_errors;
        self.processing_time_seconds += stats.processing_time_seconds;
    }
}

/// Everything a run produced: the processed publications plus the
/// statistics.  Feeds the export seams.
#[derive(Debug, Default)]
pub struct AnalysisResults {
    pub publications: Vec<Publication>,
    pub statistics: AnalysisStatistics,
}

impl AnalysisResults {
    pub fn new() -> Self {
        AnalysisResults::default()
    }

    /// Add one processed publication, updating the statistics.
    pub fn push(&mut self, publication: Publication) {
        self.statistics.record(&publication);
        self.publications.push(publication);
    }
}

/// Renderer seam.  Spreadsheet/HTML renderers live outside this crate;
/// [`JsonExporter`] is the in-tree implementation.
pub trait Exporter {
    fn export(&self, results: &AnalysisResults, path: &Path) -> CsResult<()>;
}

/// Writes results as JSON: one file, or one file per status label.
pub struct JsonExporter {
    pub single_file: bool,
    pub pretty: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        JsonExporter {
            single_file: false,
            pretty: true,
        }
    }
}

impl JsonExporter {
    fn write_document(
        &self,
        path: &Path,
        publications: &[&Publication],
        status: Option<&str>,
    ) -> CsResult<()> {
        let mut metadata = json!({
            "export_date": chrono::Utc::now().to_rfc3339(),
            "total_records": publications.len(),
            "tool_version": env!("CARGO_PKG_VERSION"),
        });

        match status {
            Some(s) => {
                metadata["copyright_status"] = json!(s);
            }
            None => {
                let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
                for p in publications {
                    *counts.entry(p.copyright_status.as_str()).or_insert(0) += 1;
                }
                metadata["status_counts"] = json!(counts);
            }
        }

        let document = json!({
            "metadata": metadata,
            "publications": publications
                .iter()
                .map(|&p| publication_json(p))
                .collect::<Vec<_>>(),
        });

        let writer = BufWriter::new(File::create(path)?);
        let result = if self.pretty {
            serde_json::to_writer_pretty(writer, &document)
        } else {
            serde_json::to_writer(writer, &document)
        };
        result.map_err(|e| CsError::Message(format!("cannot write {}: {e}", path.display())))
    }
}

impl Exporter for JsonExporter {
    fn export(&self, results: &AnalysisResults, path: &Path) -> CsResult<()> {
        if self.single_file {
            let all: Vec<&Publication> = results.publications.iter().collect();
            return self.write_document(path, &all, None);
        }

        // One file per status label, suffixed onto the base name.
        let mut groups: BTreeMap<&str, Vec<&Publication>> = BTreeMap::new();
        for p in &results.publications {
            groups
                .entry(p.copyright_status.as_str())
                .or_default()
                .push(p);
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("results");
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parent = path.parent().unwrap_or_else(|| Path::new("."));

        for (status, publications) in groups {
            let file = parent.join(format!("{stem}_{}.{ext}", status.to_lowercase()));
            self.write_document(&file, &publications, Some(status))?;
        }

        Ok(())
    }
}

fn match_json(m: &MatchResult) -> serde_json::Value {
    json!({
        "source_id": m.source_id,
        "title": m.matched_title,
        "author": m.matched_author,
        "publisher": m.matched_publisher,
        "date": m.matched_date,
        "scores": {
            "overall": m.similarity_score,
            "title": m.title_score,
            "author": m.author_score,
            "publisher": m.publisher_score,
        },
        "match_type": m.match_type.as_str(),
        "year_difference": m.year_difference,
    })
}

fn publication_json(p: &Publication) -> serde_json::Value {
    let mut value = json!({
        "marc_record": {
            "id": p.source_id,
            "title": p.original_title,
            "author_245c": p.original_author,
            "author_1xx": p.original_main_author,
            "year": p.year,
            "publisher": p.original_publisher,
            "place": p.original_place,
            "edition": p.original_edition,
            "lccn": p.lccn,
            "normalized_lccn": p.normalized_lccn,
            "language_code": p.language.code(),
            "language_detection_status": p.language_status.as_str(),
            "country_code": p.country_code,
            "country_classification": p.country_classification.as_str(),
        },
        "analysis": {
            "copyright_status": p.copyright_status,
            "status_rule": p.status_rule.map(|r| r.citation()),
            "rule_description": p.status_rule.map(|r| r.description()),
            "sort_score": p.sort_score,
            "generic_title_detected": p.generic_title_detected,
            "generic_detection_reason": p.generic_detection_reason,
            "registration_generic_title": p.registration_generic_title,
            "renewal_generic_title": p.renewal_generic_title,
            "data_completeness": p.data_completeness,
        },
    });

    if let Some(m) = p.registration_match() {
        value["registration_match"] = match_json(m);
    }
    if let Some(m) = p.renewal_match() {
        value["renewal_match"] = match_json(m);
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::determine_copyright_status;

    fn processed(title: &str, classification: CountryClassification, year: i32) -> Publication {
        let mut p = Publication::new(title);
        p.set_year(year);
        p.country_classification = classification;
        determine_copyright_status(&mut p, Some(1929), Some(1991));
        p
    }

    #[test]
    fn statistics_track_classification_and_status() {
        let mut results = AnalysisResults::new();
        results.push(processed("A", CountryClassification::Us, 1950));
        results.push(processed("B", CountryClassification::Us, 1925));
        results.push(processed("C", CountryClassification::NonUs, 1950));
        results.push(processed("D", CountryClassification::Unknown, 1950));

        let s = &results.statistics;
        assert_eq!(s.total_records, 4);
        assert_eq!(s.us_records, 2);
        assert_eq!(s.non_us_records, 1);
        assert_eq!(s.unknown_country, 1);
        assert_eq!(s.no_matches, 4);
        assert_eq!(s.status_counts.get("US_PRE_1929"), Some(&1));
        assert_eq!(s.status_counts.get("US_NO_MATCH"), Some(&1));
    }

    #[test]
    fn json_export_single_file_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut results = AnalysisResults::new();
        results.push(processed("A", CountryClassification::Us, 1950));

        JsonExporter {
            single_file: true,
            pretty: false,
        }
        .export(&results, &path)
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["metadata"]["total_records"], 1);
        assert_eq!(
            doc["publications"][0]["analysis"]["copyright_status"],
            "US_NO_MATCH"
        );
    }

    #[test]
    fn json_export_splits_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let mut results = AnalysisResults::new();
        results.push(processed("A", CountryClassification::Us, 1950));
        results.push(processed("B", CountryClassification::Us, 1925));

        JsonExporter::default().export(&results, &path).unwrap();

        assert!(dir.path().join("out_us_no_match.json").exists());
        assert!(dir.path().join("out_us_pre_1929.json").exists());
    }
}
