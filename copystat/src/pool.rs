//! Worker side of the batch pipeline.
//!
//! Each worker owns a read-only [`WorkerContext`] snapshot (shared via
//! `Arc`, never mutated after build) and processes one batch file at a
//! time: read, match, classify, write the result file, report back.
//! Cancellation is cooperative; a worker finishes its current batch
//! before exiting.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::batch::{self, BatchStats, ProcessedBatch};
use crate::config::Config;
use crate::error::CsResult;
use crate::generic::GenericTitleDetector;
use crate::index::CandidateIndex;
use crate::matcher::MatchingEngine;
use crate::publication::Publication;
use crate::signals::ShutdownTracker;
use crate::status::determine_copyright_status;

/// How often an idle worker wakes to check for shutdown.
const SHUTDOWN_POLL_SECS: u64 = 2;

/// One unit of work: a batch file on disk.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub batch_id: usize,
    pub path: PathBuf,
}

/// What a worker reports back per job.
#[derive(Debug)]
pub struct JobOutcome {
    pub batch_id: usize,
    /// Absent when even the failure record could not be written.
    pub result_path: Option<PathBuf>,
    pub stats: BatchStats,
    pub failed: bool,
}

/// Read-only per-job state shared by every worker.
pub struct WorkerContext {
    pub config: Config,
    pub registration: CandidateIndex,
    pub renewal: CandidateIndex,
    pub detector: GenericTitleDetector,
    /// Effective data ceiling: config override, else the latest year
    /// observed in the reference corpora.
    pub max_data_year: Option<i32>,
    pub result_dir: PathBuf,
}

/// Worker thread body.  Exits when the job channel closes or shutdown
/// is requested.
pub fn run_worker(
    worker_id: usize,
    context: Arc<WorkerContext>,
    jobs: Receiver<BatchJob>,
    results: Sender<JobOutcome>,
    shutdown: ShutdownTracker,
) {
    let engine = MatchingEngine::new(context.config.clone());
    log::debug!("Worker {worker_id} starting");

    loop {
        if shutdown.shutdown_requested() {
            log::debug!("Worker {worker_id} observed shutdown request; exiting");
            break;
        }

        let job = match jobs.recv_timeout(Duration::from_secs(SHUTDOWN_POLL_SECS)) {
            Ok(job) => job,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let outcome = run_job(&engine, &context, &job);

        if results.send(outcome).is_err() {
            // Coordinator is gone; nothing sensible left to do.
            log::error!("Worker {worker_id} lost its coordinator; requesting shutdown");
            shutdown.request_shutdown();
            break;
        }
    }

    log::debug!("Worker {worker_id} done");
}

fn run_job(engine: &MatchingEngine, context: &WorkerContext, job: &BatchJob) -> JobOutcome {
    let processed = match process_batch(engine, context, job) {
        Ok(p) => p,
        Err(e) => {
            log::error!("Batch {} failed: {e}", job.batch_id);
            ProcessedBatch::failed(job.batch_id, e.to_string())
        }
    };

    let result_path = context
        .result_dir
        .join(format!("result_{:06}.bin", job.batch_id));

    let (result_path, failed) = match batch::write_result(&result_path, &processed) {
        Ok(()) => (Some(result_path), processed.failed),
        Err(e) => {
            log::error!(
                "Cannot write result for batch {}: {e}",
                job.batch_id
            );
            (None, true)
        }
    };

    JobOutcome {
        batch_id: job.batch_id,
        result_path,
        stats: processed.stats,
        failed,
    }
}

/// Process one batch file: match and classify every record, in the
/// order they appear in the batch.
pub fn process_batch(
    engine: &MatchingEngine,
    context: &WorkerContext,
    job: &BatchJob,
) -> CsResult<ProcessedBatch> {
    let started = Instant::now();
    let mut publications = batch::read_batch(&job.path)?;

    let mut stats = BatchStats::new(job.batch_id);
    stats.marc_count = publications.len();

    for publication in publications.iter_mut() {
        match process_record(engine, context, publication) {
            Ok(()) => {
                if publication.has_registration_match() {
                    stats.registration_matches_found += 1;
                }
                if publication.has_renewal_match() {
                    stats.renewal_matches_found += 1;
                }
            }
            Err(e) => {
                log::warn!(
                    "Record {} in batch {} not classified: {e}",
                    publication.source_id.as_deref().unwrap_or("?"),
                    job.batch_id
                );
                stats.records_with_errors += 1;
            }
        }
    }

    stats.processing_time_seconds = started.elapsed().as_secs_f64();
    Ok(ProcessedBatch::completed(stats, publications))
}

/// Match one record against both corpora and finalize its status.
pub fn process_record(
    engine: &MatchingEngine,
    context: &WorkerContext,
    publication: &mut Publication,
) -> CsResult<()> {
    if let Some(reason) = context
        .detector
        .detect(publication.title(), publication.language)
    {
        publication.generic_title_detected = true;
        publication.generic_detection_reason = reason;
    }

    if let Some(best) = engine.find_best_match(publication, &context.registration, &context.detector)
    {
        publication.registration_generic_title = best.candidate_generic.is_some();
        let result = engine.build_match_result(&context.registration, &best);
        publication.set_registration_match(Some(result));
    }

    if let Some(best) = engine.find_best_match(publication, &context.renewal, &context.detector) {
        publication.renewal_generic_title = best.candidate_generic.is_some();
        let result = engine.build_match_result(&context.renewal, &best);
        publication.set_renewal_match(Some(result));
    }

    determine_copyright_status(
        publication,
        context.config.copyright_expiration_year,
        context.config.max_data_year.or(context.max_data_year),
    );
    publication.calculate_sort_score();
    publication.check_data_completeness();

    Ok(())
}
