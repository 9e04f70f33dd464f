//! Streaming MARC catalog loader.
//!
//! Walks a MARCXML file or directory of files through `marcbib`'s
//! event-driven reader, extracts publications, applies the coarse load
//! filters, and groups the survivors into fixed-size batches - either
//! spilled to disk as independent work units or handed out through an
//! in-process iterator.  Memory use stays bounded by one batch plus
//! parser state.

use std::path::{Path, PathBuf};

use marcbib::{BibRecord, RecordStream};

use crate::config::Config;
use crate::error::{CsError, CsResult};
use crate::norm::{normalize_minimal, remove_bracketed};
use crate::publication::{CountryClassification, Publication};

/// Official MARC country codes for US states and territories
/// (008 positions 15-17).
pub const US_COUNTRY_CODES: &[&str] = &[
    "aku", "alu", "aru", "azu", "cau", "cou", "ctu", "dcu", "deu", "flu", "gau", "hiu", "iau",
    "idu", "ilu", "inu", "ksu", "kyu", "lau", "mau", "mdu", "meu", "miu", "mnu", "mou", "msu",
    "mtu", "nbu", "ncu", "ndu", "nhu", "nju", "nmu", "nvu", "nyu", "ohu", "oku", "oru", "pau",
    "riu", "scu", "sdu", "tnu", "txu", "utu", "vau", "vtu", "wau", "wvu", "wyu", "xxu",
];

/// Classify the 008 country code.
pub fn classify_country(field_008: &str) -> (String, CountryClassification) {
    let code = field_008
        .get(15..18)
        .map(|c| c.trim().to_string())
        .unwrap_or_default();

    if code.is_empty() {
        return (code, CountryClassification::Unknown);
    }

    let classification = if US_COUNTRY_CODES.contains(&code.to_lowercase().as_str()) {
        CountryClassification::Us
    } else {
        CountryClassification::NonUs
    };

    (code, classification)
}

/// Totals accumulated while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    /// Records encountered in the source files.
    pub records_seen: usize,
    /// Records excluded by the year/US-only filters.
    pub records_filtered: usize,
    /// Records skipped as unusable (no title, malformed).
    pub records_skipped: usize,
}

/// Result of spilling a catalog to disk.
#[derive(Debug)]
pub struct Extraction {
    pub batch_paths: Vec<PathBuf>,
    pub counts: LoadCounts,
}

pub struct MarcLoader {
    path: PathBuf,
    batch_size: usize,
    min_year: Option<i32>,
    max_year: Option<i32>,
    us_only: bool,
}

impl MarcLoader {
    pub fn new(path: impl Into<PathBuf>, config: &Config) -> Self {
        MarcLoader {
            path: path.into(),
            batch_size: config.batch_size,
            min_year: config.min_year,
            max_year: config.max_year,
            us_only: config.us_only,
        }
    }

    /// The MARCXML files behind this loader: the path itself, or every
    /// `*.xml` / `*.marcxml` file in the directory, sorted.
    fn marc_files(&self) -> CsResult<Vec<PathBuf>> {
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }

        if self.path.is_dir() {
            let mut files: Vec<PathBuf> = Vec::new();
            for pattern in ["*.xml", "*.marcxml"] {
                let glob_pattern = self.path.join(pattern);
                let glob_pattern = glob_pattern.to_string_lossy();
                for entry in glob::glob(&glob_pattern)
                    .map_err(|e| CsError::Message(format!("bad glob {glob_pattern}: {e}")))?
                {
                    match entry {
                        Ok(p) => files.push(p),
                        Err(e) => log::warn!("Skipping unreadable path: {e}"),
                    }
                }
            }
            files.sort();

            if files.is_empty() {
                return Err(CsError::Message(format!(
                    "no MARC XML files found under {}",
                    self.path.display()
                )));
            }
            return Ok(files);
        }

        Err(CsError::Message(format!(
            "MARC path not found: {}",
            self.path.display()
        )))
    }

    /// Stream the catalog as in-process batches.
    pub fn batches(&self) -> CsResult<BatchIterator> {
        Ok(BatchIterator {
            files: self.marc_files()?,
            file_idx: 0,
            stream: None,
            batch_size: self.batch_size,
            min_year: self.min_year,
            max_year: self.max_year,
            us_only: self.us_only,
            counts: LoadCounts::default(),
        })
    }

    /// Parse the catalog and spill each batch to `dir` as an
    /// independent work unit.
    pub fn extract_to_dir(&self, dir: &Path) -> CsResult<Extraction> {
        std::fs::create_dir_all(dir)?;

        let mut iter = self.batches()?;
        let mut batch_paths = Vec::new();

        for batch in iter.by_ref() {
            let path = dir.join(format!("batch_{:06}.bin", batch_paths.len() + 1));
            crate::batch::write_batch(&path, &batch)?;
            log::debug!(
                "Wrote batch {} with {} publications",
                path.display(),
                batch.len()
            );
            batch_paths.push(path);
        }

        let counts = iter.counts();
        log::info!(
            "Extracted {} batches; {} records seen, {} filtered, {} skipped",
            batch_paths.len(),
            counts.records_seen,
            counts.records_filtered,
            counts.records_skipped
        );

        Ok(Extraction {
            batch_paths,
            counts,
        })
    }

}

/// The coarse load filter: US-only and year-range checks.  Records
/// without years are kept; the matcher applies its own missing-year
/// policy.
fn passes_load_filters(
    publication: &Publication,
    min_year: Option<i32>,
    max_year: Option<i32>,
    us_only: bool,
) -> bool {
    if us_only && publication.country_classification != CountryClassification::Us {
        return false;
    }

    let year = match publication.year {
        Some(y) => y,
        None => return true,
    };

    if min_year.map(|min| year < min).unwrap_or(false) {
        return false;
    }
    if max_year.map(|max| year > max).unwrap_or(false) {
        return false;
    }

    true
}

/// Streaming batch iterator; one batch of publications at a time.
pub struct BatchIterator {
    files: Vec<PathBuf>,
    file_idx: usize,
    stream: Option<RecordStream>,
    batch_size: usize,
    min_year: Option<i32>,
    max_year: Option<i32>,
    us_only: bool,
    counts: LoadCounts,
}

impl BatchIterator {
    /// Totals so far; complete once iteration has finished.
    pub fn counts(&self) -> LoadCounts {
        self.counts
    }

    /// The next record across the file list, or None at the end.
    fn next_record(&mut self) -> Option<BibRecord> {
        loop {
            if self.stream.is_none() {
                let path = self.files.get(self.file_idx)?;
                log::info!("Processing MARC file: {}", path.display());
                match BibRecord::from_xml_file(path) {
                    Ok(s) => self.stream = Some(s),
                    Err(e) => {
                        log::error!("Skipping unreadable MARC file: {e}");
                        self.file_idx += 1;
                        continue;
                    }
                }
            }

            match self.stream.as_mut().and_then(|s| s.next()) {
                Some(Ok(record)) => return Some(record),
                Some(Err(e)) => {
                    // An XML-level error poisons the rest of the file;
                    // count it and move on to the next file.
                    log::error!(
                        "Malformed XML in {}: {e}",
                        self.files[self.file_idx].display()
                    );
                    self.counts.records_skipped += 1;
                    self.stream = None;
                    self.file_idx += 1;
                }
                None => {
                    self.stream = None;
                    self.file_idx += 1;
                }
            }
        }
    }
}

impl Iterator for BatchIterator {
    type Item = Vec<Publication>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(record) = self.next_record() {
            self.counts.records_seen += 1;

            let publication = match extract_publication(&record) {
                Some(p) => p,
                None => {
                    self.counts.records_skipped += 1;
                    continue;
                }
            };

            if passes_load_filters(&publication, self.min_year, self.max_year, self.us_only) {
                batch.push(publication);
            } else {
                self.counts.records_filtered += 1;
            }

            if batch.len() >= self.batch_size {
                return Some(batch);
            }
        }

        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}

/// First value for `code` among the given tags, in tag-preference
/// order (e.g. 264 before 260).
fn tag_value<'a>(record: &'a BibRecord, tags: &[&str], code: &str) -> Option<&'a str> {
    tags.iter()
        .find_map(|tag| record.first_value(tag, code))
}

/// Strip a trailing life-date segment from a personal-name heading,
/// e.g. "Smith, John, 1945-" becomes "Smith, John".
fn strip_life_dates(name: &str) -> String {
    let parts: Vec<&str> = name.split(',').collect();
    if parts.len() >= 3 {
        let last = parts[parts.len() - 1].trim();
        let looks_like_date = last
            .chars()
            .next()
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
            || last.ends_with('-');
        if !last.is_empty() && looks_like_date {
            return parts[..parts.len() - 1].join(",").trim().to_string();
        }
    }
    name.to_string()
}

/// Map one MARC record into a Publication.  Returns None for records
/// with no usable title.
pub fn extract_publication(record: &BibRecord) -> Option<Publication> {
    // Title from 245 $a/$b/$n/$p in source order, brackets stripped.
    let title = record
        .first_field("245")
        .map(|f| f.values_in_order(&["a", "b", "n", "p"]).join(" "))
        .unwrap_or_default();
    let title = normalize_minimal(&remove_bracketed(&title));
    if title.is_empty() {
        return None;
    }

    let mut publication = Publication::new(title);
    publication.set_source("MARC");

    if let Some(author) = record.first_value("245", "c") {
        publication.set_author(author);
    }

    // Heading author: personal name first, then corporate, then
    // meeting name.
    if let Some(name) = record.first_value("100", "a") {
        publication.set_main_author(&strip_life_dates(name));
    } else if let Some(name) = record.first_value("110", "a") {
        publication.set_main_author(name);
    } else if let Some(name) = record.first_value("111", "a") {
        publication.set_main_author(name);
    }

    let field_008 = record.control_field("008");

    match tag_value(record, &["264", "260"], "c") {
        Some(date) => publication.set_pub_date(date),
        None => {
            if let Some(packed) = field_008.and_then(|f| f.get(7..11)) {
                publication.set_pub_date(packed);
            }
        }
    }

    if let Some(place) = tag_value(record, &["264", "260"], "a") {
        publication.set_place(place);
    }
    if let Some(publisher) = tag_value(record, &["264", "260"], "b") {
        publication.set_publisher(publisher);
    }
    if let Some(edition) = record.first_value("250", "a") {
        publication.set_edition(edition);
    }
    if let Some(lccn) = record.first_value("010", "a") {
        publication.set_lccn(lccn);
    }
    if let Some(id) = record.control_field("001") {
        publication.set_source_id(id);
    }

    if let Some(f) = field_008 {
        let (code, classification) = classify_country(f);
        publication.set_country(&code, classification);
    }

    let mut language = field_008
        .and_then(|f| f.get(35..38))
        .map(|l| l.trim().to_lowercase())
        .unwrap_or_default();
    if language.is_empty() {
        if let Some(l) = record.first_value("041", "a") {
            language = l.trim().to_lowercase().chars().take(3).collect();
        }
    }
    publication.set_language_code(&language);

    Some(publication)
}
