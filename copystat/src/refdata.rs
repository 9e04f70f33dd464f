//! Reference corpus loading.
//!
//! The registration and renewal corpora arrive through the
//! [`ReferenceLoader`] seam; the engine never sees their on-disk
//! formats.  A JSON-lines implementation ships in-tree as the
//! reference implementation for the binaries and tests; production
//! corpus parsers live outside this crate.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CsError, CsResult};
use crate::publication::Publication;

/// Year range applied while loading reference entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YearFilter {
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
}

impl YearFilter {
    pub fn includes(&self, year: Option<i32>) -> bool {
        match year {
            // Entries without years are kept; dropping them silently
            // would lose real matches.
            None => true,
            Some(y) => {
                self.min_year.map(|min| y >= min).unwrap_or(true)
                    && self.max_year.map(|max| y <= max).unwrap_or(true)
            }
        }
    }
}

/// Source of reference publications (registrations or renewals).
pub trait ReferenceLoader {
    /// Load the corpus, applying the year filter.  Ordering is
    /// loader-defined and does not affect correctness.
    fn load(&mut self, filter: &YearFilter) -> CsResult<Vec<Publication>>;

    /// Latest publication year represented in the corpus, once known.
    fn max_data_year(&self) -> Option<i32>;
}

/// One corpus entry as JSON.  Absent/empty fields are normalized away
/// by the Publication setters.
#[derive(Debug, Deserialize)]
struct JsonlEntry {
    title: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    publisher: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    lccn: String,
    #[serde(default)]
    source_id: String,
    #[serde(default)]
    full_text: String,
}

/// Reads one corpus from a JSON-lines file: one entry object per line,
/// blank lines ignored, unparseable lines logged and skipped.
pub struct JsonlLoader {
    path: PathBuf,
    source_label: String,
    max_data_year: Option<i32>,
}

impl JsonlLoader {
    /// * `source_label` - stamped onto every loaded publication, e.g.
    ///   "REG" or "REN".
    pub fn new(path: impl Into<PathBuf>, source_label: impl Into<String>) -> Self {
        JsonlLoader {
            path: path.into(),
            source_label: source_label.into(),
            max_data_year: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_to_publication(&self, entry: JsonlEntry, line_no: usize) -> Publication {
        let mut p = Publication::new(entry.title);
        p.set_author(&entry.author);
        p.set_publisher(&entry.publisher);
        p.set_pub_date(&entry.date);
        p.set_lccn(&entry.lccn);
        p.set_full_text(&entry.full_text);
        p.set_source(&self.source_label);
        if entry.source_id.trim().is_empty() {
            p.set_source_id(&format!("{}-{line_no}", self.source_label));
        } else {
            p.set_source_id(&entry.source_id);
        }
        p
    }
}

impl ReferenceLoader for JsonlLoader {
    fn load(&mut self, filter: &YearFilter) -> CsResult<Vec<Publication>> {
        let file = File::open(&self.path).map_err(|e| {
            CsError::Message(format!("cannot open {}: {e}", self.path.display()))
        })?;

        let mut out = Vec::new();
        let mut skipped = 0usize;

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: JsonlEntry = match serde_json::from_str(&line) {
                Ok(e) => e,
                Err(e) => {
                    log::warn!(
                        "{}:{}: skipping unparseable entry: {e}",
                        self.path.display(),
                        line_no + 1
                    );
                    skipped += 1;
                    continue;
                }
            };

            let p = self.entry_to_publication(entry, line_no + 1);

            if let Some(y) = p.year {
                self.max_data_year = Some(self.max_data_year.map_or(y, |m| m.max(y)));
            }

            if filter.includes(p.year) {
                out.push(p);
            }
        }

        if skipped > 0 {
            log::warn!(
                "{}: skipped {skipped} unparseable entries",
                self.path.display()
            );
        }

        log::info!(
            "Loaded {} reference entries from {}",
            out.len(),
            self.path.display()
        );

        Ok(out)
    }

    fn max_data_year(&self) -> Option<i32> {
        self.max_data_year
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_corpus(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f
    }

    #[test]
    fn loads_entries_and_tracks_max_year() {
        let f = write_corpus(&[
            r#"{"title": "Test Book", "author": "Smith", "date": "1950", "lccn": "25-12345", "source_id": "A1"}"#,
            r#"{"title": "Later Work", "author": "Jones", "date": "1961"}"#,
            "",
            "not json at all",
        ]);

        let mut loader = JsonlLoader::new(f.path(), "REG");
        let pubs = loader.load(&YearFilter::default()).unwrap();

        assert_eq!(pubs.len(), 2);
        assert_eq!(pubs[0].normalized_lccn.as_deref(), Some("25012345"));
        assert_eq!(pubs[0].source.as_deref(), Some("REG"));
        assert_eq!(loader.max_data_year(), Some(1961));
    }

    #[test]
    fn year_filter_keeps_undated_entries() {
        let f = write_corpus(&[
            r#"{"title": "Dated", "date": "1940"}"#,
            r#"{"title": "Undated"}"#,
        ]);

        let mut loader = JsonlLoader::new(f.path(), "REG");
        let filter = YearFilter {
            min_year: Some(1950),
            max_year: None,
        };
        let pubs = loader.load(&filter).unwrap();

        assert_eq!(pubs.len(), 1);
        assert_eq!(pubs[0].title(), "Undated");
    }
}
