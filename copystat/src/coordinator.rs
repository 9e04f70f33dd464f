//! Coordinator side of the batch pipeline.
//!
//! Hands batch files to a fixed pool of worker threads over a bounded
//! channel (back-pressure), collects result files in whatever order
//! workers finish, sums statistics, and owns temp-file cleanup on both
//! the normal and interrupted exit paths.  Worker failures are
//! isolated to their batch; the job keeps going.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded};

use crate::batch;
use crate::error::{CsError, CsResult};
use crate::pool::{run_worker, BatchJob, JobOutcome, WorkerContext};
use crate::results::AnalysisResults;
use crate::signals::{ShutdownTracker, TempRegistry};

/// How long the dispatcher waits on a full queue before re-checking
/// the shutdown flag.
const DISPATCH_POLL_MS: u64 = 200;

pub struct BatchCoordinator {
    context: Arc<WorkerContext>,
    workers: usize,
    shutdown: ShutdownTracker,
    temp: TempRegistry,
}

impl BatchCoordinator {
    /// * `context` - the read-only snapshot every worker shares.
    /// * `temp` - registry of directories to remove when the job ends,
    ///   normally or not.
    pub fn new(context: WorkerContext, temp: TempRegistry) -> CsResult<Self> {
        context.config.validate()?;
        let workers = context.config.worker_count();

        Ok(BatchCoordinator {
            context: Arc::new(context),
            workers,
            shutdown: ShutdownTracker::new(),
            temp,
        })
    }

    /// The tracker workers poll; exposed so embedders and tests can
    /// request cancellation without raising a real signal.
    pub fn shutdown_tracker(&self) -> &ShutdownTracker {
        &self.shutdown
    }

    /// Process every batch file and aggregate the results.
    ///
    /// Statistics are sums, so the aggregate is independent of worker
    /// completion order; publications are assembled in batch order so
    /// a run's output ordering follows its input ordering.
    pub fn run(&self, batch_paths: &[PathBuf]) -> CsResult<AnalysisResults> {
        self.shutdown.track_termination();
        self.temp.register(&self.context.result_dir);
        std::fs::create_dir_all(&self.context.result_dir)?;

        log::info!(
            "Processing {} batches with {} workers",
            batch_paths.len(),
            self.workers
        );

        // Bounded job queue for back-pressure; results flow back
        // unbounded as workers finish.
        let (job_tx, job_rx) = bounded::<BatchJob>(self.workers * 2);
        let (result_tx, result_rx) = unbounded::<JobOutcome>();

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let context = Arc::clone(&self.context);
            let jobs = job_rx.clone();
            let results = result_tx.clone();
            let shutdown = self.shutdown.clone();
            handles.push(
                thread::Builder::new()
                    .name(format!("batch-worker-{worker_id}"))
                    .spawn(move || run_worker(worker_id, context, jobs, results, shutdown))
                    .map_err(|e| CsError::Message(format!("cannot spawn worker: {e}")))?,
            );
        }
        drop(job_rx);
        drop(result_tx);

        let dispatched = self.dispatch(batch_paths, job_tx);
        let outcomes = self.collect(result_rx, dispatched);

        for handle in handles {
            if let Err(e) = handle.join() {
                log::error!("Worker thread panicked: {e:?}");
            }
        }

        if self.shutdown.shutdown_requested() {
            log::warn!("Interrupted; removing temporary files");
            self.temp.cleanup();
            return Err(CsError::Interrupted);
        }

        let results = self.aggregate(dispatched, outcomes);
        self.temp.cleanup();
        results
    }

    /// Feed jobs until done or interrupted.  Returns how many were
    /// handed out.
    fn dispatch(&self, batch_paths: &[PathBuf], job_tx: crossbeam_channel::Sender<BatchJob>) -> usize {
        let mut dispatched = 0;

        'outer: for (i, path) in batch_paths.iter().enumerate() {
            let mut job = BatchJob {
                batch_id: i + 1,
                path: path.clone(),
            };

            loop {
                if self.shutdown.shutdown_requested() {
                    log::info!("Shutdown requested; stopping dispatch");
                    break 'outer;
                }

                match job_tx.send_timeout(job, Duration::from_millis(DISPATCH_POLL_MS)) {
                    Ok(()) => {
                        dispatched += 1;
                        break;
                    }
                    Err(crossbeam_channel::SendTimeoutError::Timeout(j)) => {
                        // Queue full; keep waiting.
                        job = j;
                    }
                    Err(crossbeam_channel::SendTimeoutError::Disconnected(_)) => {
                        log::error!("All workers exited early; stopping dispatch");
                        break 'outer;
                    }
                }
            }
        }

        // Closing the channel tells idle workers there is no more work.
        drop(job_tx);
        dispatched
    }

    /// Drain worker outcomes until every sender is gone.
    fn collect(
        &self,
        result_rx: crossbeam_channel::Receiver<JobOutcome>,
        dispatched: usize,
    ) -> Vec<JobOutcome> {
        let mut outcomes = Vec::with_capacity(dispatched);
        while let Ok(outcome) = result_rx.recv() {
            log::debug!(
                "Batch {} finished ({} records{})",
                outcome.batch_id,
                outcome.stats.marc_count,
                if outcome.failed { ", FAILED" } else { "" }
            );
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Read the result files back and fold them into one
    /// [`AnalysisResults`].
    fn aggregate(&self, dispatched: usize, outcomes: Vec<JobOutcome>) -> CsResult<AnalysisResults> {
        let mut results = AnalysisResults::new();

        // Keyed by batch id so publications come out in input order
        // regardless of completion order.
        let mut by_batch: BTreeMap<usize, JobOutcome> = BTreeMap::new();
        for outcome in outcomes {
            by_batch.insert(outcome.batch_id, outcome);
        }

        if by_batch.len() < dispatched {
            // Jobs lost to a crashed worker produce no outcome at all.
            let lost = dispatched - by_batch.len();
            log::error!("{lost} dispatched batches produced no result");
            results.statistics.failed_batches += lost;
        }

        for outcome in by_batch.values() {
            results.statistics.absorb_batch(&outcome.stats);

            if outcome.failed {
                results.statistics.failed_batches += 1;
                continue;
            }

            let path = match &outcome.result_path {
                Some(p) => p,
                None => continue,
            };

            let processed = batch::read_result(path)?;
            for publication in processed.publications {
                results.push(publication);
            }
        }

        log::info!(
            "Aggregated {} records ({} registration matches, {} renewal matches, {} failed batches)",
            results.statistics.total_records,
            results.statistics.registration_matches,
            results.statistics.renewal_matches,
            results.statistics.failed_batches,
        );

        Ok(results)
    }
}

/// Scratch space for one run's batch and result files, removed by the
/// coordinator's cleanup.
pub fn job_scratch_dir(base: &Path, label: &str) -> PathBuf {
    base.join(format!("copystat-{label}-{}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::generic::GenericTitleDetector;
    use crate::index::CandidateIndex;
    use crate::publication::{CountryClassification, Publication};

    fn reference(title: &str, author: &str, year: i32) -> Publication {
        let mut p = Publication::new(title);
        p.set_author(author);
        p.set_year(year);
        p.set_source_id(&format!("REF-{title}"));
        p
    }

    fn marc(title: &str, author: &str, year: i32, id: &str) -> Publication {
        let mut p = Publication::new(title);
        p.set_author(author);
        p.set_year(year);
        p.set_country("nyu", CountryClassification::Us);
        p.set_source_id(id);
        p
    }

    fn write_batches(dir: &Path, batches: &[Vec<Publication>]) -> Vec<PathBuf> {
        batches
            .iter()
            .enumerate()
            .map(|(i, batch)| {
                let path = dir.join(format!("batch_{:06}.bin", i + 1));
                batch::write_batch(&path, batch).unwrap();
                path
            })
            .collect()
    }

    fn coordinator(dir: &Path, workers: usize) -> BatchCoordinator {
        let mut registration = CandidateIndex::new();
        registration.add(reference("Test Book", "Smith, John", 1950));

        let mut renewal = CandidateIndex::new();
        renewal.add(reference("Renewed Title", "Jones, Mary", 1955));

        let context = WorkerContext {
            config: Config {
                num_processes: Some(workers),
                copyright_expiration_year: Some(1929),
                max_data_year: Some(1991),
                ..Default::default()
            },
            registration,
            renewal,
            detector: GenericTitleDetector::default(),
            max_data_year: Some(1991),
            result_dir: dir.join("results"),
        };

        BatchCoordinator::new(context, TempRegistry::new()).unwrap()
    }

    fn batches_fixture() -> Vec<Vec<Publication>> {
        vec![
            vec![
                marc("Test Book", "Smith, John", 1950, "M-1"),
                marc("Unmatched Thing", "Nobody", 1960, "M-2"),
            ],
            vec![marc("Renewed Title", "Jones, Mary", 1955, "M-3")],
        ]
    }

    #[test]
    fn processes_batches_and_aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_batches(dir.path(), &batches_fixture());

        let coordinator = coordinator(dir.path(), 2);
        let results = coordinator.run(&paths).unwrap();

        assert_eq!(results.statistics.total_records, 3);
        assert_eq!(results.statistics.registration_matches, 1);
        assert_eq!(results.statistics.renewal_matches, 1);
        assert_eq!(results.statistics.no_matches, 1);
        assert_eq!(results.statistics.failed_batches, 0);

        // Input order survives out-of-order completion.
        let ids: Vec<&str> = results
            .publications
            .iter()
            .map(|p| p.source_id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["M-1", "M-2", "M-3"]);

        // Result dir was cleaned up.
        assert!(!dir.path().join("results").exists());
    }

    #[test]
    fn aggregation_is_order_independent() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();

        let mut batches = batches_fixture();
        let paths_a = write_batches(dir_a.path(), &batches);
        batches.reverse();
        let paths_b = write_batches(dir_b.path(), &batches);

        let stats_a = coordinator(dir_a.path(), 1).run(&paths_a).unwrap().statistics;
        let mut stats_b = coordinator(dir_b.path(), 1).run(&paths_b).unwrap().statistics;

        // Timing always differs between runs; everything else must not.
        stats_b.processing_time_seconds = stats_a.processing_time_seconds;
        assert_eq!(stats_a, stats_b);
    }

    #[test]
    fn corrupt_batch_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = write_batches(dir.path(), &batches_fixture());
        let bad = dir.path().join("batch_000099.bin");
        std::fs::write(&bad, b"junk").unwrap();
        paths.push(bad);

        let results = coordinator(dir.path(), 2).run(&paths).unwrap();
        assert_eq!(results.statistics.failed_batches, 1);
        assert_eq!(results.statistics.total_records, 3);
    }

    #[test]
    fn shutdown_before_run_cleans_up_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_batches(dir.path(), &batches_fixture());

        let coordinator = coordinator(dir.path(), 1);
        coordinator.shutdown_tracker().request_shutdown();

        match coordinator.run(&paths) {
            Err(CsError::Interrupted) => {}
            other => panic!("expected Interrupted, got {other:?}"),
        }
        assert!(!dir.path().join("results").exists());
    }
}
