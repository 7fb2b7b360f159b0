//! A single-slot TTL cache for derived projections.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Caches one derived value with a time-to-live. Cleared on every mutation
/// that can change latest-set membership or enrichment.
pub(crate) struct TtlCell<T> {
    slot: Mutex<Option<(Instant, Arc<T>)>>,
    ttl: Duration,
}

impl<T> TtlCell<T> {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    pub(crate) fn get(&self) -> Option<Arc<T>> {
        let slot = self.slot.lock().ok()?;
        match slot.as_ref() {
            Some((at, value)) if at.elapsed() < self.ttl => Some(Arc::clone(value)),
            _ => None,
        }
    }

    pub(crate) fn put(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some((Instant::now(), Arc::clone(&value)));
        }
        value
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = None;
        }
    }
}
