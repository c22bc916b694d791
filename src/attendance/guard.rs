use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Process-local, fail-fast mutual exclusion of attendance mutations per user.
///
/// Locks are keyed by user id only, so a user's operations in different guilds
/// exclude each other too. Nothing here is shared across processes.
#[derive(Debug, Default)]
pub struct ConcurrencyGuard {
    locked: Mutex<HashSet<u64>>,
}

impl ConcurrencyGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Takes the lock for `user_id`, or returns `None` if it is already held.
    /// The lock is released when the returned [`UserLock`] is dropped.
    pub fn try_acquire(self: &Arc<Self>, user_id: u64) -> Option<UserLock> {
        if !self.entries().insert(user_id) {
            return None;
        }
        Some(UserLock {
            guard: Arc::clone(self),
            user_id,
        })
    }

    #[cfg(test)]
    pub fn is_locked(&self, user_id: u64) -> bool {
        self.entries().contains(&user_id)
    }

    fn release(&self, user_id: u64) {
        self.entries().remove(&user_id);
    }

    // The set stays consistent even if a holder panicked, so poisoning is ignored.
    fn entries(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.locked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held while an attendance mutation for `user_id` is in flight.
#[derive(Debug)]
pub struct UserLock {
    guard: Arc<ConcurrencyGuard>,
    user_id: u64,
}

impl Drop for UserLock {
    fn drop(&mut self) {
        self.guard.release(self.user_id);
    }
}
