use std::sync::{Mutex, MutexGuard};

use cko_cache::{MemoryOrderCache, OrderCache, OrderReadback};
use cko_reconcile::{Navigation, ReconciliationState};
use cko_runtime::Environment;

/// [`Environment`] that records every navigation and display update.
pub struct RecordingEnv {
    cache: Box<dyn OrderCache>,
    readback: OrderReadback,
    navigations: Mutex<Vec<(Option<String>, Navigation)>>,
    states: Mutex<Vec<ReconciliationState>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl Default for RecordingEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEnv {
    pub fn new() -> Self {
        Self::with_cache(Box::new(MemoryOrderCache::new()))
    }

    pub fn with_cache(cache: Box<dyn OrderCache>) -> Self {
        Self {
            cache,
            readback: OrderReadback::new(),
            navigations: Mutex::new(Vec::new()),
            states: Mutex::new(Vec::new()),
        }
    }

    pub fn navigations(&self) -> Vec<(Option<String>, Navigation)> {
        lock(&self.navigations).clone()
    }

    pub fn states(&self) -> Vec<ReconciliationState> {
        lock(&self.states).clone()
    }

    pub fn last_state(&self) -> Option<ReconciliationState> {
        lock(&self.states).last().cloned()
    }
}

impl Environment for RecordingEnv {
    fn cache(&self) -> &dyn OrderCache {
        self.cache.as_ref()
    }

    fn readback(&self) -> &OrderReadback {
        &self.readback
    }

    fn navigate(&self, order_id: Option<&str>, nav: &Navigation) {
        lock(&self.navigations).push((order_id.map(str::to_string), nav.clone()));
    }

    fn observe(&self, state: &ReconciliationState) {
        let mut states = lock(&self.states);
        if states.last() != Some(state) {
            states.push(state.clone());
        }
    }
}
