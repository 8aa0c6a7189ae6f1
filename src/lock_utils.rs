//! Lock Poisoning Recovery
//!
//! The zone registry sits behind a `std::sync::RwLock`. A panic while the
//! lock is held poisons it; these helpers log the event and hand back the
//! guard so the engine keeps serving zone settings instead of cascading the
//! panic into every later update and sweep.
//!
//! Registry writes replace whole entries, so the data behind a poisoned lock
//! is at worst one update behind.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::error;

/// Acquire a read lock, recovering from poisoning.
///
/// `context` names what the lock protects and only appears in the log.
pub fn read_lock_or_recover<'a, T>(rwlock: &'a RwLock<T>, context: &str) -> RwLockReadGuard<'a, T> {
    match rwlock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!(
                "RwLock (read) poisoned for '{}' - recovering with possibly stale data",
                context
            );
            poisoned.into_inner()
        }
    }
}

/// Acquire a write lock, recovering from poisoning.
pub fn write_lock_or_recover<'a, T>(
    rwlock: &'a RwLock<T>,
    context: &str,
) -> RwLockWriteGuard<'a, T> {
    match rwlock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!(
                "RwLock (write) poisoned for '{}' - recovering with possibly stale data",
                context
            );
            poisoned.into_inner()
        }
    }
}
