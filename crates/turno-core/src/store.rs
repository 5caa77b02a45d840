use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

/// A mutex-protected map shared between producer threads and a daemon.
///
/// Iteration goes through [`snapshot`](SharedMap::snapshot), which clones
/// the entries and releases the lock before the caller processes them.
/// A producer inserting mid-pass is therefore never blocked for longer
/// than a single map operation, and the pass works on a consistent view.
pub struct SharedMap<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for SharedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> SharedMap<K, V> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SharedMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.lock().insert(key, value)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().get(key).cloned()
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().remove(key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone out the current entries. The lock is held only for the clone.
    pub fn snapshot(&self) -> Vec<(K, V)>
    where
        K: Clone,
    {
        self.lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, V>> {
        self.inner.lock().expect("shared map lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn insert_get_remove_roundtrip() {
        let map: SharedMap<String, u32> = SharedMap::new();
        assert!(map.is_empty());
        assert_eq!(map.insert("a".to_string(), 1), None);
        assert_eq!(map.insert("a".to_string(), 2), Some(1));
        assert_eq!(map.get("a"), Some(2));
        assert_eq!(map.remove("a"), Some(2));
        assert_eq!(map.get("a"), None);
        assert!(!map.contains_key("a"));
    }

    #[test]
    fn snapshot_does_not_block_inserts() {
        let map: SharedMap<u32, u32> = SharedMap::new();
        map.insert(1, 10);
        map.insert(2, 20);

        // Processing a snapshot entry may itself touch the map.
        for (k, _) in map.snapshot() {
            map.insert(k + 100, 0);
        }
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn concurrent_inserts_are_all_kept() {
        let map = Arc::new(SharedMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..100u32 {
                        map.insert(t * 1_000 + i, i);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(map.len(), 800);
    }
}
