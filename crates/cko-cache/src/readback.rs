//! Read-once-then-purge retrieval of a cached order after the gateway
//! redirect.
//!
//! # Invariants
//!
//! - An exact `order_<id>` hit is deleted as part of the read, and a
//!   `consumed_<id>` tombstone is written first.
//! - Once an id has been taken by exact hit, every later take of that id
//!   returns `None`, in this process or any other that opens the same
//!   store. It never degrades into the fallback scan.
//! - When the exact key is missing (and the id was never taken) the first
//!   decodable `order_*` key in the store's listing order is returned and
//!   left in place. With several stale orders this may attach another
//!   checkout's data; the choice is logged. [`OrderReadback::exact_only`]
//!   turns the scan off for stores shared between customers.

use std::collections::BTreeSet;
use std::sync::Mutex;

use cko_schemas::OrderRecord;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{consumed_key, decode_record, order_key, CacheError, OrderCache, ORDER_KEY_PREFIX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadbackSource {
    /// `order_<id>` existed and has been purged.
    Exact,
    /// Exact key missing; `key` was the first available order entry.
    Fallback { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readback {
    pub record: OrderRecord,
    pub source: ReadbackSource,
}

/// Read-once bookkeeping over an [`OrderCache`].
///
/// The in-memory set short-cuts repeat takes; the `consumed_<id>` tombstone
/// in the cache is what survives a restart.
#[derive(Debug)]
pub struct OrderReadback {
    consumed: Mutex<BTreeSet<String>>,
    fallback: bool,
}

impl Default for OrderReadback {
    fn default() -> Self {
        Self {
            consumed: Mutex::new(BTreeSet::new()),
            fallback: true,
        }
    }
}

impl OrderReadback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never fall back to another cached order when the exact key is missing.
    pub fn exact_only() -> Self {
        Self {
            fallback: false,
            ..Self::default()
        }
    }

    pub fn was_consumed(&self, order_id: &str) -> bool {
        self.consumed
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(order_id)
    }

    /// Take the record for `order_id` out of `cache`.
    pub fn take(
        &self,
        cache: &dyn OrderCache,
        order_id: &str,
    ) -> Result<Option<Readback>, CacheError> {
        let mut consumed = self.consumed.lock().unwrap_or_else(|p| p.into_inner());
        if consumed.contains(order_id) {
            return Ok(None);
        }
        if cache.read(&consumed_key(order_id))?.is_some() {
            debug!(order_id, "order already consumed by an earlier read");
            consumed.insert(order_id.to_string());
            return Ok(None);
        }

        let key = order_key(order_id);
        if let Some(v) = cache.read(&key)? {
            let record = decode_record(&key, v)?;
            cache.write(&consumed_key(order_id), Value::Bool(true))?;
            cache.delete(&key)?;
            consumed.insert(order_id.to_string());
            return Ok(Some(Readback {
                record,
                source: ReadbackSource::Exact,
            }));
        }
        drop(consumed);

        if !self.fallback {
            return Ok(None);
        }

        for candidate in cache.list_keys(ORDER_KEY_PREFIX)? {
            let Some(v) = cache.read(&candidate)? else {
                continue;
            };
            match decode_record(&candidate, v) {
                Ok(record) => {
                    warn!(
                        order_id,
                        fallback_key = %candidate,
                        "exact order entry missing; using first available cached order"
                    );
                    return Ok(Some(Readback {
                        record,
                        source: ReadbackSource::Fallback { key: candidate },
                    }));
                }
                Err(e) => {
                    warn!(key = %candidate, error = %e, "skipping undecodable cached order");
                }
            }
        }

        Ok(None)
    }
}
