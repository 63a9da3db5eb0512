//! In-process per-user advisory lock, keyed by user id.
//!
//! Spec §5 requires mutating operations to be serialized per user; this is
//! the "in-process per-user advisory lock" variant of the two strategies it
//! names (the alternative being `SELECT … FOR UPDATE` on the user row).
//! Grounded on the teacher's `DashMap`-backed status/event registries.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::UserId;

/// Holds one `tokio::sync::Mutex` per user that has been touched by a
/// mutation, created lazily on first use.
#[derive(Debug, Clone, Default)]
pub struct UserLocks {
    inner: Arc<DashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the advisory lock for `user`. Reads (including Stats) must
    /// not call this — only mutating operations take the lock (spec §5).
    pub async fn acquire(&self, user: UserId) -> OwnedMutexGuard<()> {
        let mutex = self
            .inner
            .entry(user)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}
