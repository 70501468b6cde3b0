use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockKey = (String, i64);

/// Per-(bot, user) async mutexes serializing read-modify-write cycles.
#[derive(Clone, Default)]
pub struct UserLocks {
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

/// Held while one or two records are being mutated. Dropping it releases
/// the users and forgets their mutexes once nobody else waits on them.
pub struct UserGuard {
    guards: Vec<OwnedMutexGuard<()>>,
    keys: Vec<LockKey>,
    locks: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            // The map holds the only handle left when no task waits
            self.locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, bot_id: &str, user_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry((bot_id.to_string(), user_id))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn lock(&self, bot_id: &str, user_id: i64) -> UserGuard {
        let guard = self.handle(bot_id, user_id).lock_owned().await;
        self.guard(vec![guard], vec![(bot_id.to_string(), user_id)])
    }

    fn guard(&self, guards: Vec<OwnedMutexGuard<()>>, keys: Vec<LockKey>) -> UserGuard {
        UserGuard {
            guards,
            keys,
            locks: Arc::clone(&self.locks),
        }
    }

    /// Locks two users of the same bot in ascending id order so concurrent
    /// transfers between the same pair cannot deadlock.
    pub async fn lock_pair(&self, bot_id: &str, a: i64, b: i64) -> UserGuard {
        if a == b {
            return self.lock(bot_id, a).await;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let keys = vec![(bot_id.to_string(), first), (bot_id.to_string(), second)];
        let first = self.handle(bot_id, first).lock_owned().await;
        let second = self.handle(bot_id, second).lock_owned().await;
        self.guard(vec![first, second], keys)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
