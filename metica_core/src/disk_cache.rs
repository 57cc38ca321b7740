//! TTL-bounded key-value persistence backed by a single JSON file.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::timesource::TimeSource;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry<V> {
    data: V,
    cache_time: i64,
    ttl_seconds: i64,
}

/// A single-file key-value store with per-write TTLs.
///
/// All entries live in one JSON document that is loaded eagerly at [`DiskCache::prepare`] time
/// and rewritten synchronously after every mutation (write-through). Expired entries are ignored
/// on read rather than evicted; the next write for the key (or [`DiskCache::clear`]) replaces
/// them.
///
/// The cache has no internal locking. Each instance is owned by a single coordinator, which
/// serializes access.
pub struct DiskCache<V> {
    path: PathBuf,
    entries: HashMap<String, CacheEntry<V>>,
    time_source: Arc<dyn TimeSource>,
}

impl<V: Serialize + DeserializeOwned + Clone> DiskCache<V> {
    /// Load the cache from `path`.
    ///
    /// A missing, unreadable, or unparseable file is logged and treated as an empty cache. It is
    /// never a fatal condition: the cache heals on the next write.
    pub fn prepare(path: impl Into<PathBuf>, time_source: Arc<dyn TimeSource>) -> DiskCache<V> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!(target: "metica", "failed to parse cache file {:?}: {}", path, err);
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                log::warn!(target: "metica", "failed to read cache file {:?}: {}", path, err);
                HashMap::new()
            }
        };

        DiskCache {
            path,
            entries,
            time_source,
        }
    }

    /// Read the value for `key` if present and fresh.
    ///
    /// An entry is fresh while `now - cache_time < ttl_seconds`. At exactly
    /// `cache_time + ttl_seconds` the entry is already expired.
    pub fn read(&self, key: &str) -> Option<V> {
        let entry = self.entries.get(key)?;
        let now = self.time_source.epoch_seconds();
        if now - entry.cache_time < entry.ttl_seconds {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    /// Read the value for `key` ignoring freshness.
    ///
    /// Serves the fallback path when a fetch fails and a stale snapshot is better than nothing.
    pub fn read_stale(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    /// All stored values keyed by cache key, ignoring freshness.
    pub fn stale_snapshot(&self) -> HashMap<String, V> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.data.clone()))
            .collect()
    }

    /// Upsert an entry with `cache_time = now` and persist synchronously.
    ///
    /// # Errors
    ///
    /// A failure to persist means memory and disk have drifted apart, so it is logged and
    /// returned as [`Error::Io`] rather than swallowed.
    pub fn write(&mut self, key: impl Into<String>, value: V, ttl_seconds: i64) -> Result<()> {
        self.entries.insert(
            key.into(),
            CacheEntry {
                data: value,
                cache_time: self.time_source.epoch_seconds(),
                ttl_seconds,
            },
        );
        self.persist()
    }

    /// Remove all entries and persist an empty document.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec(&self.entries)?;
        fs::write(&self.path, json).map_err(|err| {
            log::warn!(target: "metica", "failed to persist cache file {:?}: {}", self.path, err);
            Error::from(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::DiskCache;
    use crate::timesource::FakeTimeSource;

    fn cache_at(dir: &std::path::Path, clock: &Arc<FakeTimeSource>) -> DiskCache<String> {
        let time_source: Arc<dyn crate::timesource::TimeSource> = clock.clone();
        DiskCache::prepare(dir.join("cache.json"), time_source)
    }

    #[test]
    fn read_returns_fresh_value() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(1000));
        let mut cache = cache_at(dir.path(), &clock);

        cache.write("k", "v".to_owned(), 60).unwrap();
        clock.advance(59);

        assert_eq!(cache.read("k"), Some("v".to_owned()));
    }

    #[test]
    fn entry_expires_exactly_at_ttl_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(1000));
        let mut cache = cache_at(dir.path(), &clock);

        cache.write("k", "v".to_owned(), 60).unwrap();
        clock.set(1060);

        assert_eq!(cache.read("k"), None);
    }

    #[test]
    fn ttl_is_per_write_not_per_cache() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(0));
        let mut cache = cache_at(dir.path(), &clock);

        cache.write("short", "a".to_owned(), 10).unwrap();
        cache.write("long", "b".to_owned(), 100).unwrap();
        clock.advance(50);

        assert_eq!(cache.read("short"), None);
        assert_eq!(cache.read("long"), Some("b".to_owned()));
    }

    #[test]
    fn stale_read_ignores_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(0));
        let mut cache = cache_at(dir.path(), &clock);

        cache.write("k", "v".to_owned(), 10).unwrap();
        clock.advance(1000);

        assert_eq!(cache.read("k"), None);
        assert_eq!(cache.read_stale("k"), Some("v".to_owned()));
    }

    #[test]
    fn entries_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(0));

        let mut cache = cache_at(dir.path(), &clock);
        cache.write("k", "v".to_owned(), 60).unwrap();
        drop(cache);

        let reloaded = cache_at(dir.path(), &clock);
        assert_eq!(reloaded.read("k"), Some("v".to_owned()));
    }

    #[test]
    fn freshness_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(0));

        let mut cache = cache_at(dir.path(), &clock);
        cache.write("k", "v".to_owned(), 60).unwrap();
        drop(cache);
        clock.advance(60);

        let reloaded = cache_at(dir.path(), &clock);
        assert_eq!(reloaded.read("k"), None);
        assert_eq!(reloaded.read_stale("k"), Some("v".to_owned()));
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(0));
        std::fs::write(dir.path().join("cache.json"), b"not json {").unwrap();

        let cache = cache_at(dir.path(), &clock);

        assert_eq!(cache.read_stale("k"), None);
    }

    #[test]
    fn clear_removes_entries_and_persists_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(0));

        let mut cache = cache_at(dir.path(), &clock);
        cache.write("k", "v".to_owned(), 60).unwrap();
        cache.clear().unwrap();
        drop(cache);

        let reloaded = cache_at(dir.path(), &clock);
        assert_eq!(reloaded.read_stale("k"), None);
    }
}
