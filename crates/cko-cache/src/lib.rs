//! cko-cache
//!
//! Local order cache: the key-value store that carries an order across the
//! full-page redirect to the payment gateway and back.
//!
//! Layout:
//! - `order_<orderId>` holds the full [`OrderRecord`] as JSON.
//! - `current_order_id` holds the id of the in-progress checkout.
//! - `consumed_<orderId>` records that `order_<orderId>` was read back and
//!   purged, so a later process does not treat the id as never seen.
//!
//! No expiry is enforced here. Entries from abandoned checkouts stay until
//! something deletes them; the read-back fallback in [`readback`] is the only
//! place that notices them.

mod readback;
mod store;

pub use readback::{OrderReadback, Readback, ReadbackSource};
pub use store::{FileOrderCache, MemoryOrderCache};

use cko_schemas::OrderRecord;
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

pub const ORDER_KEY_PREFIX: &str = "order_";
pub const CURRENT_ORDER_KEY: &str = "current_order_id";
pub const CONSUMED_KEY_PREFIX: &str = "consumed_";
pub const ENV_CACHE_PATH: &str = "CKO_CACHE_PATH";

/// Cache key for a full order record.
pub fn order_key(order_id: &str) -> String {
    format!("{ORDER_KEY_PREFIX}{order_id}")
}

/// Cache key of the read-once tombstone for `order_id`.
pub fn consumed_key(order_id: &str) -> String {
    format!("{CONSUMED_KEY_PREFIX}{order_id}")
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CacheError {
    /// Backing file could not be read or written.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A stored value exists but does not decode into the expected type.
    Corrupt { key: String, message: String },
    /// A value could not be encoded for storage.
    Encode(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Io { path, source } => {
                write!(f, "cache io error at {}: {source}", path.display())
            }
            CacheError::Corrupt { key, message } => {
                write!(f, "cache entry {key} is corrupt: {message}")
            }
            CacheError::Encode(msg) => write!(f, "cache encode error: {msg}"),
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CacheError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Cache contract
// ---------------------------------------------------------------------------

/// Browser-local-storage shaped key-value contract.
///
/// Methods take `&self`; implementations synchronize internally so one cache
/// can be shared between the reconciliation task and the email watcher.
pub trait OrderCache: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Value>, CacheError>;

    fn write(&self, key: &str, value: Value) -> Result<(), CacheError>;

    /// Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Keys starting with `prefix`, in the store's enumeration order.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}

/// Typed helpers over any [`OrderCache`].
pub trait OrderCacheExt: OrderCache {
    fn put_order(&self, record: &OrderRecord) -> Result<(), CacheError> {
        let v = serde_json::to_value(record).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.write(&order_key(&record.order_id), v)
    }

    fn get_order(&self, order_id: &str) -> Result<Option<OrderRecord>, CacheError> {
        let key = order_key(order_id);
        match self.read(&key)? {
            None => Ok(None),
            Some(v) => decode_record(&key, v).map(Some),
        }
    }

    fn set_current_order_id(&self, order_id: &str) -> Result<(), CacheError> {
        self.write(CURRENT_ORDER_KEY, Value::String(order_id.to_string()))
    }

    /// Blank or non-string markers read as absent.
    fn current_order_id(&self) -> Result<Option<String>, CacheError> {
        Ok(match self.read(CURRENT_ORDER_KEY)? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
    }

    fn clear_current_order_id(&self) -> Result<(), CacheError> {
        self.delete(CURRENT_ORDER_KEY)
    }
}

impl<C: OrderCache + ?Sized> OrderCacheExt for C {}

pub(crate) fn decode_record(key: &str, v: Value) -> Result<OrderRecord, CacheError> {
    serde_json::from_value(v).map_err(|e| CacheError::Corrupt {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Open the file cache named by `CKO_CACHE_PATH`, or `fallback` when unset.
pub fn open_from_env(fallback: impl Into<PathBuf>) -> Result<FileOrderCache, CacheError> {
    let path = std::env::var(ENV_CACHE_PATH)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| fallback.into());
    FileOrderCache::open(path)
}
