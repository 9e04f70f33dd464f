//! Persistent artifact cache.
//!
//! Parsed reference corpora, built indexes, the generic-title
//! detector, and (optionally) MARC batches are expensive to rebuild,
//! so they are cached on disk keyed by content hashes of their inputs
//! and the configuration that shaped them.  Different configurations
//! never share a key.  Corrupt or stale entries read as misses; the
//! caller rebuilds and overwrites.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{CsError, CsResult};

/// Bumped whenever a cached artifact's layout changes.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    schema_version: u32,
    payload: T,
}

/// A filesystem-backed cache of serialized artifacts.
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Open (creating if needed) a cache under `root`.  When
    /// `force_refresh` is set every existing entry is removed first.
    pub fn open(root: impl Into<PathBuf>, force_refresh: bool) -> CsResult<Self> {
        let cache = ArtifactCache { root: root.into() };
        fs::create_dir_all(&cache.root)?;
        if force_refresh {
            cache.clear()?;
        }
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove every cache entry.
    pub fn clear(&self) -> CsResult<()> {
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "bin").unwrap_or(false) {
                fs::remove_file(entry.path())?;
            }
        }
        log::info!("Cleared artifact cache at {}", self.root.display());
        Ok(())
    }

    /// Hash a sequence of key parts into a cache key.
    pub fn key_of(parts: &[&str]) -> String {
        let joined = parts.join("\u{1f}");
        format!("{:x}", md5::compute(joined.as_bytes()))
    }

    /// A content signature for an input file: path, size, and mtime.
    /// Any change to the file produces a different signature.
    pub fn file_signature(path: &Path) -> CsResult<String> {
        let meta = fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Ok(format!("{}:{}:{}", path.display(), meta.len(), mtime))
    }

    fn entry_path(&self, name: &str, key: &str) -> PathBuf {
        self.root.join(format!("{name}-{key}.bin"))
    }

    /// Fetch an artifact.  Any read or decode failure is a miss.
    pub fn get<T: DeserializeOwned>(&self, name: &str, key: &str) -> Option<T> {
        let path = self.entry_path(name, key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(_) => return None,
        };

        let envelope: Envelope<T> = match bincode::deserialize(&bytes) {
            Ok(e) => e,
            Err(e) => {
                log::warn!(
                    "Corrupt cache entry {} treated as a miss: {e}",
                    path.display()
                );
                return None;
            }
        };

        if envelope.schema_version != CACHE_SCHEMA_VERSION {
            log::info!(
                "Cache entry {} has schema {} (want {CACHE_SCHEMA_VERSION}); miss",
                path.display(),
                envelope.schema_version
            );
            return None;
        }

        log::debug!("Cache hit: {name} ({key})");
        Some(envelope.payload)
    }

    /// Store an artifact atomically (write-to-temp, then rename), so
    /// concurrent readers of the same key never observe a torn entry
    /// and concurrent writers leave one valid winner.
    pub fn put<T: Serialize>(&self, name: &str, key: &str, value: &T) -> CsResult<()> {
        let envelope = Envelope {
            schema_version: CACHE_SCHEMA_VERSION,
            payload: value,
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|e| CsError::Message(format!("cannot serialize cache entry {name}: {e}")))?;

        let path = self.entry_path(name, key);
        let tmp = self
            .root
            .join(format!("{name}-{key}.tmp.{}", std::process::id()));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;

        log::debug!("Cache write: {name} ({key})");
        Ok(())
    }

    /// Fetch, or rebuild-and-store on a miss.
    pub fn get_or_build<T, F>(&self, name: &str, key: &str, build: F) -> CsResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> CsResult<T>,
    {
        if let Some(value) = self.get::<T>(name, key) {
            return Ok(value);
        }

        let value = build()?;
        self.put(name, key, &value)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), false).unwrap();

        assert_eq!(cache.get::<Vec<String>>("corpus", "k1"), None);

        let value = vec!["a".to_string(), "b".to_string()];
        cache.put("corpus", "k1", &value).unwrap();
        assert_eq!(cache.get::<Vec<String>>("corpus", "k1"), Some(value));
    }

    #[test]
    fn different_key_parts_never_collide() {
        let a = ArtifactCache::key_of(&["/tmp/reg.jsonl", "min=1920", "max=1977"]);
        let b = ArtifactCache::key_of(&["/tmp/reg.jsonl", "min=1920", "max=1978"]);
        let c = ArtifactCache::key_of(&["/tmp/reg.jsonl", "min=1920"]);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), false).unwrap();

        cache.put("idx", "k", &42u64).unwrap();
        let path = dir.path().join("idx-k.bin");
        std::fs::write(&path, b"scrambled").unwrap();

        assert_eq!(cache.get::<u64>("idx", "k"), None);
    }

    #[test]
    fn force_refresh_clears_entries() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ArtifactCache::open(dir.path(), false).unwrap();
            cache.put("idx", "k", &1u32).unwrap();
        }
        let cache = ArtifactCache::open(dir.path(), true).unwrap();
        assert_eq!(cache.get::<u32>("idx", "k"), None);
    }

    #[test]
    fn get_or_build_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::open(dir.path(), false).unwrap();

        let first: u32 = cache.get_or_build("n", "k", || Ok(10)).unwrap();
        // Second build closure would produce a different value; the
        // cached one must win.
        let second: u32 = cache.get_or_build("n", "k", || Ok(99)).unwrap();
        assert_eq!(first, 10);
        assert_eq!(second, 10);
    }
}
