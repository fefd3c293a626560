//! Concrete [`OrderCache`] stores.
//!
//! Both stores enumerate keys in lexicographic order (`BTreeMap`), which is
//! the order the read-back fallback scan sees.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{CacheError, OrderCache};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock cannot leave the data half-written.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn keys_with_prefix(map: &BTreeMap<String, Value>, prefix: &str) -> Vec<String> {
    map.keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-lifetime store. Used by tests and by the daemon when no cache
/// file is configured.
#[derive(Debug, Default)]
pub struct MemoryOrderCache {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryOrderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OrderCache for MemoryOrderCache {
    fn read(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn write(&self, key: &str, value: Value) -> Result<(), CacheError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        Ok(keys_with_prefix(&lock(&self.entries), prefix))
    }
}

// ---------------------------------------------------------------------------
// File-backed
// ---------------------------------------------------------------------------

/// Single JSON document on disk, rewritten on every mutation.
///
/// The file is the only copy: every read lists or loads it afresh and every
/// mutation is load, modify, replace. Several handles (or processes) on one
/// path therefore see each other's writes, which is what lets a checkout
/// started by one process be reconciled by another after the gateway
/// redirect. The mutex only serializes handles within this process.
#[derive(Debug)]
pub struct FileOrderCache {
    path: PathBuf,
    guard: Mutex<()>,
}

impl FileOrderCache {
    /// Open (or lazily create) the cache at `path`. An existing file must
    /// parse.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache = Self {
            path: path.into(),
            guard: Mutex::new(()),
        };
        cache.load()?;
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> Result<BTreeMap<String, Value>, CacheError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| CacheError::Corrupt {
            key: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Replace the file atomically: a crash leaves the old or the new
    /// document, never a truncated one.
    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), CacheError> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| self.io_err(e))?;

        let body =
            serde_json::to_vec_pretty(entries).map_err(|e| CacheError::Encode(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.io_err(e))?;
        tmp.write_all(&body).map_err(|e| self.io_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_err(e.error))?;
        Ok(())
    }

    /// Load, apply `f`, and write back when `f` reports a change.
    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, Value>) -> bool,
    ) -> Result<(), CacheError> {
        let _held = lock(&self.guard);
        let mut entries = self.load()?;
        if f(&mut entries) {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

impl OrderCache for FileOrderCache {
    fn read(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let _held = lock(&self.guard);
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: Value) -> Result<(), CacheError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
            true
        })
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let _held = lock(&self.guard);
        Ok(keys_with_prefix(&self.load()?, prefix))
    }
}
