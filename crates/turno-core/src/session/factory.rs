use std::sync::{Arc, Mutex};

use tracing::debug;

use super::Session;

const DEFAULT_POOL_CAPACITY: usize = 64;

/// Bounded pool of session instances. Eviction hands instances back so
/// steady churn reuses allocations instead of minting a new session per
/// load.
pub struct SessionFactory {
    pool: Mutex<Vec<Session>>,
    capacity: usize,
}

impl SessionFactory {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: Mutex::new(Vec::new()),
            capacity,
        }
    }

    /// Hand out a vacant instance, preferring a pooled one.
    pub fn acquire(&self) -> Arc<Session> {
        match self.lock().pop() {
            Some(session) => Arc::new(session),
            None => Arc::new(Session::vacant()),
        }
    }

    /// Take an instance back once the caller holds the last reference.
    /// Sessions still referenced elsewhere are left to drop on their own,
    /// as are any returned while the pool is full.
    pub fn recycle(&self, session: Arc<Session>) {
        let Ok(session) = Arc::try_unwrap(session) else {
            return;
        };
        session.reset();
        let mut pool = self.lock();
        if pool.len() < self.capacity {
            pool.push(session);
        } else {
            debug!(capacity = self.capacity, "session pool full, dropping instance");
        }
    }

    pub fn pooled(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Session>> {
        self.pool.lock().expect("session pool lock poisoned")
    }
}

impl Default for SessionFactory {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_returns_vacant_instances() {
        let factory = SessionFactory::default();
        let session = factory.acquire();
        assert_eq!(session.id(), None);
        assert_eq!(factory.pooled(), 0);
    }

    #[test]
    fn recycled_instances_are_reused_clean() {
        let factory = SessionFactory::new(4);
        let session = factory.acquire();
        session.restore(crate::session::SessionState {
            id: Some("abc".into()),
            created_at: 1,
            last_activity: 1,
            data: [("k".to_string(), serde_json::json!(1))].into_iter().collect(),
        });
        factory.recycle(session);
        assert_eq!(factory.pooled(), 1);

        let reused = factory.acquire();
        assert_eq!(factory.pooled(), 0);
        assert_eq!(reused.id(), None);
        assert_eq!(reused.get("k"), None);
    }

    #[test]
    fn shared_sessions_are_not_pooled() {
        let factory = SessionFactory::new(4);
        let session = factory.acquire();
        let extra = Arc::clone(&session);
        factory.recycle(session);
        assert_eq!(factory.pooled(), 0);
        drop(extra);
    }

    #[test]
    fn pool_capacity_is_respected() {
        let factory = SessionFactory::new(1);
        let first = factory.acquire();
        let second = factory.acquire();
        factory.recycle(first);
        factory.recycle(second);
        assert_eq!(factory.pooled(), 1);
    }
}
