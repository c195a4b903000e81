//! Per-user inventory locks.
//!
//! # Architecture
//!
//! ```text
//! user_id ─hash─► shard[i] (std Mutex<HashMap>) ─► Arc<tokio Mutex<()>>
//!                                                        │
//!                                                 lock_owned().await
//!                                                        │
//!                                                  UserLockGuard
//!                                          (drop: unlock + prune idle)
//! ```
//!
//! Shard maps are only held for the instant needed to clone or prune an
//! entry; waiting happens on the per-user tokio mutex.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use anvil_domain::UserId;

use crate::error::StoreError;

/// Number of registry shards.
pub const LOCK_SHARDS: usize = 16;

type Shard = Mutex<HashMap<UserId, Arc<AsyncMutex<()>>>>;

/// Sharded registry of per-user advisory locks.
#[derive(Debug)]
pub struct LockRegistry {
    shards: Vec<Shard>,
    timeout: Option<Duration>,
}

impl LockRegistry {
    /// Registry that waits indefinitely
    pub fn new() -> Self {
        Self {
            shards: (0..LOCK_SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            timeout: None,
        }
    }

    /// Registry that gives up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout), ..Self::new() }
    }

    /// Configured wait bound
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Acquire the exclusive lock for `user_id`.
    ///
    /// # Errors
    /// `StoreError::LockTimeout` if a wait bound is configured and elapses.
    pub async fn acquire(self: &Arc<Self>, user_id: UserId) -> Result<UserLockGuard, StoreError> {
        let mutex = {
            let mut shard = self.shard(user_id);
            Arc::clone(shard.entry(user_id).or_default())
        };

        let guard = match self.timeout {
            Some(waited) => {
                // Bound first so the timed-out future releases its Arc before pruning
                let acquired = tokio::time::timeout(waited, mutex.lock_owned()).await;
                match acquired {
                    Ok(guard) => guard,
                    Err(_) => {
                        warn!(%user_id, ?waited, "Inventory lock wait timed out");
                        self.prune(user_id);
                        return Err(StoreError::LockTimeout { user_id, waited });
                    },
                }
            },
            None => mutex.lock_owned().await,
        };

        debug!(%user_id, "Inventory lock acquired");
        Ok(UserLockGuard {
            registry: Arc::clone(self),
            user_id,
            guard: Some(guard),
        })
    }

    /// Number of users with a live registry entry
    pub fn tracked_users(&self) -> usize {
        self.shards.iter().map(|s| lock_shard(s).len()).sum()
    }

    fn shard(&self, user_id: UserId) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        let index = (hasher.finish() % LOCK_SHARDS as u64) as usize;
        lock_shard(&self.shards[index])
    }

    /// Drop the entry when nobody holds or waits on it.
    fn prune(&self, user_id: UserId) {
        let mut shard = self.shard(user_id);
        if shard.get(&user_id).is_some_and(|m| Arc::strong_count(m) == 1) {
            shard.remove(&user_id);
        }
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_shard(shard: &Shard) -> MutexGuard<'_, HashMap<UserId, Arc<AsyncMutex<()>>>> {
    shard.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held lock for one user; released on drop.
#[derive(Debug)]
pub struct UserLockGuard {
    registry: Arc<LockRegistry>,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl UserLockGuard {
    /// User this guard locks
    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

impl Drop for UserLockGuard {
    fn drop(&mut self) {
        // Unlock before pruning so our own Arc no longer counts
        self.guard.take();
        self.registry.prune(self.user_id);
        debug!(user_id = %self.user_id, "Inventory lock released");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_same_user_serializes() {
        let registry = Arc::new(LockRegistry::with_timeout(Duration::from_millis(50)));
        let user = Uuid::now_v7();

        let held = registry.acquire(user).await.unwrap();
        let second = registry.acquire(user).await;
        assert!(matches!(second, Err(StoreError::LockTimeout { .. })));

        drop(held);
        assert!(registry.acquire(user).await.is_ok());
    }

    #[tokio::test]
    async fn test_different_users_do_not_block() {
        let registry = Arc::new(LockRegistry::with_timeout(Duration::from_millis(50)));

        let _a = registry.acquire(Uuid::now_v7()).await.unwrap();
        let _b = registry.acquire(Uuid::now_v7()).await.unwrap();
        assert_eq!(registry.tracked_users(), 2);
    }

    #[tokio::test]
    async fn test_idle_entries_pruned() {
        let registry = Arc::new(LockRegistry::new());
        let user = Uuid::now_v7();

        let guard = registry.acquire(user).await.unwrap();
        assert_eq!(guard.user_id(), user);
        assert_eq!(registry.tracked_users(), 1);

        drop(guard);
        assert_eq!(registry.tracked_users(), 0);
    }

    #[tokio::test]
    async fn test_waiter_acquires_after_release() {
        let registry = Arc::new(LockRegistry::new());
        let user = Uuid::now_v7();

        let held = registry.acquire(user).await.unwrap();
        let waiter = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.acquire(user).await.map(|g| g.user_id()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), user);
        assert_eq!(registry.tracked_users(), 0);
    }
}
