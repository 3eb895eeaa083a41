//! Lock helpers.
//!
//! A panic inside a user callback or probe must not wedge the poller, so
//! poisoned locks are recovered instead of propagated.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
