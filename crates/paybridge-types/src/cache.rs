//! Key-value cache capability
//!
//! The token store and the rate limiter persist their state through the
//! [`Cache`] trait instead of global singletons, so any backend can be
//! injected: the bundled [`MemoryCache`] and [`FileCache`], or an adapter
//! over Redis or a database.

use std::collections::HashMap;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Errors raised by cache backends
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Underlying storage failed
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored entry could not be encoded or decoded
    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Key-value cache with optional per-entry time to live
pub trait Cache: Send + Sync {
    /// Get a value, `None` on miss or expiry
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a value; `ttl: None` keeps it until deleted
    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()>;

    /// Remove a value; deleting a missing key is not an error
    fn delete(&self, key: &str) -> CacheResult<()>;
}

/// In-process cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((_, Some(expires_at))) if Instant::now() >= *expires_at => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// On-disk entry format
#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: String,
    /// Unix milliseconds
    expires_at: Option<i64>,
}

/// File-backed cache: one JSON file per key
///
/// File names are the SHA-256 of the key, so arbitrary keys are safe.
/// Writes go to a temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Open (and create if needed) a cache directory
    pub fn new(dir: impl Into<PathBuf>) -> CacheResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Default location under the system temp directory
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("paybridge-cache")
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove every entry file
    pub fn clear(&self) -> CacheResult<()> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                remove_if_exists(&path)?;
            }
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let name: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        self.dir.join(format!("{}.json", name))
    }
}

impl Cache for FileCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding corrupt cache entry {}: {}", path.display(), e);
                remove_if_exists(&path)?;
                return Ok(None);
            }
        };

        if let Some(expires_at) = entry.expires_at {
            if Utc::now().timestamp_millis() >= expires_at {
                remove_if_exists(&path)?;
                return Ok(None);
            }
        }

        Ok(Some(entry.value))
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let entry = FileEntry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64),
        };

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        remove_if_exists(&self.path_for(key))
    }
}

fn remove_if_exists(path: &Path) -> CacheResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str) -> FileCache {
        let dir = std::env::temp_dir().join(format!(
            "paybridge-cache-test-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        FileCache::new(dir).unwrap()
    }

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").unwrap(), None);

        cache.set("k", "v", None).unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));

        cache.delete("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
        // Deleting twice is fine
        cache.delete("k").unwrap();
    }

    #[test]
    fn test_memory_cache_ttl() {
        let cache = MemoryCache::new();
        cache.set("short", "v", Some(Duration::from_millis(20))).unwrap();
        cache.set("long", "v", Some(Duration::from_secs(60))).unwrap();

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("short").unwrap(), None);
        assert!(cache.get("long").unwrap().is_some());
    }

    #[test]
    fn test_file_cache_roundtrip() {
        let cache = temp_cache("roundtrip");
        cache.set("paybridge.auth.token", r#"{"a":1}"#, None).unwrap();
        assert_eq!(
            cache.get("paybridge.auth.token").unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );

        // Survives a new handle on the same directory
        let reopened = FileCache::new(cache.dir().to_path_buf()).unwrap();
        assert!(reopened.get("paybridge.auth.token").unwrap().is_some());

        reopened.delete("paybridge.auth.token").unwrap();
        assert_eq!(cache.get("paybridge.auth.token").unwrap(), None);
        let _ = fs::remove_dir_all(cache.dir());
    }

    #[test]
    fn test_file_cache_expiry() {
        let cache = temp_cache("expiry");
        cache.set("k", "v", Some(Duration::from_millis(10))).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("k").unwrap(), None);
        let _ = fs::remove_dir_all(cache.dir());
    }

    #[test]
    fn test_file_cache_corrupt_entry_is_miss() {
        let cache = temp_cache("corrupt");
        fs::write(cache.path_for("k"), "not json").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
        let _ = fs::remove_dir_all(cache.dir());
    }

    #[test]
    fn test_file_cache_clear() {
        let cache = temp_cache("clear");
        cache.set("a", "1", None).unwrap();
        cache.set("b", "2", None).unwrap();
        cache.clear().unwrap();
        assert_eq!(cache.get("a").unwrap(), None);
        assert_eq!(cache.get("b").unwrap(), None);
        let _ = fs::remove_dir_all(cache.dir());
    }
}
