//! On-disk batch and result files.
//!
//! Batches are opaque binary serializations of `Vec<Publication>`;
//! the only contract is semantic round-trip equality and stability
//! within a single job.  Result files add per-batch statistics and a
//! failure marker.  Every file carries a schema version so stale
//! artifacts are rejected instead of misread.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CsError, CsResult};
use crate::publication::Publication;

pub const BATCH_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct BatchFile {
    version: u32,
    publications: Vec<Publication>,
}

/// Per-batch processing statistics.  Addition commutes, so batches may
/// be absorbed in any completion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub batch_id: usize,
    pub marc_count: usize,
    pub registration_matches_found: usize,
    pub renewal_matches_found: usize,
    pub skipped_records: usize,
    pub processing_time_seconds: f64,
    pub records_with_errors: usize,
}

impl BatchStats {
    pub fn new(batch_id: usize) -> Self {
        BatchStats {
            batch_id,
            ..Default::default()
        }
    }

    /// Fold another batch's counts into this one.
    pub fn absorb(&mut self, other: &BatchStats) {
        self.marc_count += other.marc_count;
        self.registration_matches_found += other.registration_matches_found;
        self.renewal_matches_found += other.renewal_matches_found;
        self.skipped_records += other.skipped_records;
        self.processing_time_seconds += other.processing_time_seconds;
        self.records_with_errors += other.records_with_errors;
    }
}

/// A fully processed batch as written by a worker.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessedBatch {
    pub version: u32,
    pub stats: BatchStats,
    pub publications: Vec<Publication>,
    pub failed: bool,
    pub error: Option<String>,
}

impl ProcessedBatch {
    pub fn completed(stats: BatchStats, publications: Vec<Publication>) -> Self {
        ProcessedBatch {
            version: BATCH_SCHEMA_VERSION,
            stats,
            publications,
            failed: false,
            error: None,
        }
    }

    /// A failed batch carries zero processed records; the coordinator
    /// logs the error and moves on.
    pub fn failed(batch_id: usize, error: String) -> Self {
        ProcessedBatch {
            version: BATCH_SCHEMA_VERSION,
            stats: BatchStats::new(batch_id),
            publications: Vec::new(),
            failed: true,
            error: Some(error),
        }
    }
}

/// Write one batch of publications.
pub fn write_batch(path: &Path, publications: &[Publication]) -> CsResult<()> {
    let file = BatchFile {
        version: BATCH_SCHEMA_VERSION,
        publications: publications.to_vec(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)
        .map_err(|e| CsError::Message(format!("cannot write batch {}: {e}", path.display())))
}

/// Read one batch, rebuilding the display caches serialization drops.
pub fn read_batch(path: &Path) -> CsResult<Vec<Publication>> {
    let reader = BufReader::new(File::open(path)?);
    let file: BatchFile = bincode::deserialize_from(reader)
        .map_err(|e| CsError::Message(format!("cannot read batch {}: {e}", path.display())))?;

    if file.version != BATCH_SCHEMA_VERSION {
        return Err(CsError::Message(format!(
            "batch {} has schema version {}, expected {BATCH_SCHEMA_VERSION}",
            path.display(),
            file.version
        )));
    }

    let mut publications = file.publications;
    for p in publications.iter_mut() {
        p.refresh_caches();
    }
    Ok(publications)
}

/// Write a worker's result file.
pub fn write_result(path: &Path, result: &ProcessedBatch) -> CsResult<()> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, result)
        .map_err(|e| CsError::Message(format!("cannot write result {}: {e}", path.display())))
}

/// Read a worker's result file.
pub fn read_result(path: &Path) -> CsResult<ProcessedBatch> {
    let reader = BufReader::new(File::open(path)?);
    let mut result: ProcessedBatch = bincode::deserialize_from(reader)
        .map_err(|e| CsError::Message(format!("cannot read result {}: {e}", path.display())))?;

    if result.version != BATCH_SCHEMA_VERSION {
        return Err(CsError::Message(format!(
            "result {} has schema version {}, expected {BATCH_SCHEMA_VERSION}",
            path.display(),
            result.version
        )));
    }

    for p in result.publications.iter_mut() {
        p.refresh_caches();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publication::CountryClassification;

    fn sample() -> Publication {
        let mut p = Publication::new("The Great  Gatsby [novel]");
        p.set_main_author("Fitzgerald, F. Scott");
        p.set_pub_date("1925");
        p.set_lccn("25-12345");
        p.set_country("nyu", CountryClassification::Us);
        p.set_source_id("ocm0001");
        p
    }

    #[test]
    fn batch_round_trip_preserves_fields_and_rebuilds_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch_000001.bin");

        let original = sample();
        write_batch(&path, &[original.clone()]).unwrap();

        let restored = read_batch(&path).unwrap();
        assert_eq!(restored.len(), 1);
        let p = &restored[0];

        assert_eq!(p.original_title, original.original_title);
        assert_eq!(p.year, Some(1925));
        assert_eq!(p.normalized_lccn.as_deref(), Some("25012345"));
        // Display caches were skipped by serialization and rebuilt.
        assert!(p.caches_ready());
        assert_eq!(p.title(), "The Great Gatsby");
    }

    #[test]
    fn result_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result_000001.bin");

        let mut stats = BatchStats::new(7);
        stats.marc_count = 3;
        stats.registration_matches_found = 2;

        write_result(&path, &ProcessedBatch::completed(stats.clone(), vec![sample()])).unwrap();
        let restored = read_result(&path).unwrap();

        assert!(!restored.failed);
        assert_eq!(restored.stats, stats);
        assert_eq!(restored.publications.len(), 1);
    }

    #[test]
    fn stats_absorb_commutes() {
        let mut a = BatchStats::new(0);
        a.marc_count = 5;
        a.renewal_matches_found = 2;
        let mut b = BatchStats::new(1);
        b.marc_count = 7;
        b.records_with_errors = 1;

        let mut ab = a.clone();
        ab.absorb(&b);
        let mut ba = b.clone();
        ba.absorb(&a);

        assert_eq!(ab.marc_count, ba.marc_count);
        assert_eq!(ab.renewal_matches_found, ba.renewal_matches_found);
        assert_eq!(ab.records_with_errors, ba.records_with_errors);
    }

    #[test]
    fn corrupt_batch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, b"not a batch").unwrap();
        assert!(read_batch(&path).is_err());
    }
}
