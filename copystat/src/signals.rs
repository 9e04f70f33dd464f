//! Signal tracking and temporary-file cleanup.
//!
//! The handlers registered here only flip atomic flags
//! (async-signal-safe); all real cleanup runs on the main thread once
//! the run loop observes the flag.  Temp directories are tracked in an
//! explicit registry rather than global side effects, so interrupted
//! and completed jobs clean up the same way.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use signal_hook as sigs;

pub const SIG_FAST_SHUTDOWN: i32 = sigs::consts::SIGTERM;
pub const SIG_GRACEFUL_SHUTDOWN: i32 = sigs::consts::SIGINT;

/// Tracks termination signals.  Set up by the coordinator and cloned
/// into every worker thread, so all parties observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownTracker {
    shutdown: Arc<AtomicBool>,
}

impl ShutdownTracker {
    pub fn new() -> ShutdownTracker {
        ShutdownTracker::default()
    }

    /// Register handlers for SIGINT and SIGTERM.
    ///
    /// Panics when registration fails: handlers are installed at job
    /// start and a job that cannot arrange its own cleanup should not
    /// run at all.
    pub fn track_termination(&self) {
        for sig in [SIG_GRACEFUL_SHUTDOWN, SIG_FAST_SHUTDOWN] {
            if let Err(e) = sigs::flag::register(sig, self.shutdown.clone()) {
                panic!("Cannot register shutdown handler for signal {sig}: {e}");
            }
        }
    }

    /// Directly request a shutdown (used by tests and by workers that
    /// lose contact with the coordinator).
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

/// Registry of temp directories owned by the current job.
#[derive(Debug, Clone, Default)]
pub struct TempRegistry {
    dirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl TempRegistry {
    pub fn new() -> TempRegistry {
        TempRegistry::default()
    }

    /// Track a directory for removal at job end.
    pub fn register(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let mut dirs = self.dirs.lock().expect("temp registry poisoned");
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }

    /// Remove every registered directory.  Failures are logged, not
    /// fatal; cleanup runs on interrupt paths too.
    pub fn cleanup(&self) {
        let mut dirs = self.dirs.lock().expect("temp registry poisoned");
        for dir in dirs.drain(..) {
            if !dir.exists() {
                continue;
            }
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => log::debug!("Removed temp dir {}", dir.display()),
                Err(e) => log::warn!("Could not remove temp dir {}: {e}", dir.display()),
            }
        }
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs
            .lock()
            .expect("temp registry poisoned")
            .iter()
            .any(|d| d == dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_shutdown_request() {
        let tracker = ShutdownTracker::new();
        assert!(!tracker.shutdown_requested());
        tracker.request_shutdown();
        assert!(tracker.shutdown_requested());

        // Clones observe the same flag.
        let clone = tracker.clone();
        assert!(clone.shutdown_requested());
    }

    #[test]
    fn registry_removes_dirs_once() {
        let dir = tempfile::tempdir().unwrap();
        let inner = dir.path().join("batches");
        std::fs::create_dir_all(&inner).unwrap();
        std::fs::write(inner.join("batch_000001.bin"), b"x").unwrap();

        let registry = TempRegistry::new();
        registry.register(&inner);
        registry.register(&inner);
        assert!(registry.contains(&inner));

        registry.cleanup();
        assert!(!inner.exists());

        // Second cleanup is a no-op.
        registry.cleanup();
    }
}
