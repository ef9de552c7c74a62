//! Position enrichment: the metadata cache, the rate-limited lookup
//! executor, and the poll loop tying them to the upstream sources.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod poller;
pub mod source;
pub mod store;
pub mod throttle;

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// Every critical section in this module leaves its state consistent
/// between statements, so a poisoned lock is safe to reuse.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
