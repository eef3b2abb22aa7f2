//! Per-address serialization

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::OwnedMutexGuard;

/// Hands out one async lock per address so read-modify-write cycles on the
/// same address never interleave.
#[derive(Debug, Default)]
pub(super) struct AddressLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl AddressLocks {
    pub(super) async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

            // Drop locks nobody is holding or waiting on.
            locks.retain(|k, lock| k == key || Arc::strong_count(lock) > 1);

            locks.entry(key.to_string()).or_default().clone()
        };

        lock.lock_owned().await
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = AddressLocks::default();

        drop(locks.lock("a@example.com").await);
        drop(locks.lock("b@example.com").await);
        let _held = locks.lock("c@example.com").await;

        assert_eq!(locks.len(), 1);
    }
}
