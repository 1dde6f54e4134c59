//! Keyed issuance locks.
//!
//! One async mutex per identity with an issuance in flight. Different
//! identities never contend; the same identity queues. Each entry counts the
//! callers holding or waiting on it, and the last one out removes it, even
//! when a waiter is cancelled before it gets the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use vista_core::Identity;

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

#[derive(Default)]
pub(crate) struct IssuanceLocks {
    table: Mutex<HashMap<Identity, Slot>>,
}

impl IssuanceLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive issuance rights on `identity`.
    pub(crate) async fn acquire(&self, identity: &Identity) -> IssuanceGuard<'_> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
            let slot = table.entry(identity.clone()).or_insert_with(|| Slot {
                lock: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        // Registered before waiting, so a cancelled wait still releases
        // its place in the table.
        let mut guard = IssuanceGuard {
            locks: self,
            identity: identity.clone(),
            guard: None,
        };
        guard.guard = Some(lock.lock_owned().await);
        guard
    }

    /// Number of identities with an issuance held or queued.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

pub(crate) struct IssuanceGuard<'a> {
    locks: &'a IssuanceLocks,
    identity: Identity,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IssuanceGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut table = self.locks.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = table.get_mut(&self.identity) {
            slot.users -= 1;
            if slot.users == 0 {
                table.remove(&self.identity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn id(name: &str) -> Identity {
        Identity::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = IssuanceLocks::new();
        {
            let _g = locks.acquire(&id("veh-1")).await;
            assert_eq!(locks.in_flight(), 1);
        }
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_different_identities_do_not_block() {
        let locks = IssuanceLocks::new();
        let _a = locks.acquire(&id("veh-1")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&id("veh-2"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_same_identity_serialized() {
        let locks = Arc::new(IssuanceLocks::new());
        let first = locks.acquire(&id("veh-1")).await;

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), locks.acquire(&id("veh-1"))).await;
        assert!(blocked.is_err());

        drop(first);
        let second =
            tokio::time::timeout(Duration::from_millis(100), locks.acquire(&id("veh-1"))).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = IssuanceLocks::new();
        let first = locks.acquire(&id("veh-1")).await;

        // Gives up while queued behind `first`.
        let waited =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(&id("veh-1"))).await;
        assert!(waited.is_err());
        assert_eq!(locks.in_flight(), 1);

        drop(first);
        assert_eq!(locks.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_after_release() {
        let locks = Arc::new(IssuanceLocks::new());
        let first = locks.acquire(&id("veh-1")).await;

        let queued = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire(&id("veh-1")).await;
                std::future::pending::<()>().await;
            })
        };
        tokio::task::yield_now().await;
        drop(first);
        queued.abort();
        let _ = queued.await;

        assert_eq!(locks.in_flight(), 0);
    }
}
