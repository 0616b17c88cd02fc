//! Compute-once values shared between worker threads.
//!
//! The fleet-wide views (every cluster's `_cluster` section, a cluster's
//! combined component params) are expensive and identical for every
//! component that asks. A `Memo` computes such a value on first request and
//! hands out the same `Arc` afterwards. A failed computation is not stored;
//! the next caller tries again and sees its own error.

use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};

/// Lazily computed shared value
#[derive(Debug)]
pub struct Memo<T> {
    slot: Mutex<Option<Arc<T>>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Memo<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the stored value, computing it with `init` if absent.
    ///
    /// Concurrent callers block until the first computation finishes, so
    /// `init` runs at most once per successful value.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let mut slot = self.slot.lock().map_err(|_| Error::LockPoisoned {
            context: "memoized value".to_string(),
        })?;
        if let Some(value) = slot.as_ref() {
            return Ok(Arc::clone(value));
        }
        let value = Arc::new(init()?);
        *slot = Some(Arc::clone(&value));
        Ok(value)
    }

    /// Whether a value has been computed
    pub fn is_initialized(&self) -> bool {
        self.slot.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}
