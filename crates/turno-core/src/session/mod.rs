//! Session objects, pooling, marshalling, and the persistence sweeper.

mod factory;
mod marshaller;
mod persistence;

pub use factory::SessionFactory;
pub use marshaller::{JsonMarshaller, SessionMarshaller};
pub use persistence::SessionSweeper;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The persistent fields of a session. `data` is ordered so the encoded
/// form, and with it the checksum, is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// `None` once the session is destroyed.
    pub id: Option<String>,
    pub created_at: u64,
    pub last_activity: u64,
    pub data: BTreeMap<String, serde_json::Value>,
}

/// A server-side session. Shared as `Arc<Session>` between the web layer
/// and the sweeper; all mutation goes through the interior lock.
pub struct Session {
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            state: Mutex::new(SessionState {
                id: Some(id.into()),
                created_at: now,
                last_activity: now,
                data: BTreeMap::new(),
            }),
        }
    }

    /// An empty instance for the factory pool; [`restore`](Self::restore)
    /// gives it content.
    pub(crate) fn vacant() -> Self {
        Self {
            state: Mutex::new(SessionState {
                id: None,
                created_at: 0,
                last_activity: 0,
                data: BTreeMap::new(),
            }),
        }
    }

    pub fn id(&self) -> Option<String> {
        self.lock().id.clone()
    }

    pub fn created_at(&self) -> u64 {
        self.lock().created_at
    }

    pub fn last_activity(&self) -> u64 {
        self.lock().last_activity
    }

    /// Time since the last activity, at seconds granularity.
    pub fn inactive_for(&self) -> Duration {
        Duration::from_secs(unix_now().saturating_sub(self.lock().last_activity))
    }

    pub fn touch(&self) {
        self.lock().last_activity = unix_now();
    }

    pub fn put(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut state = self.lock();
        state.data.insert(key.into(), value);
        state.last_activity = unix_now();
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().data.get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        let mut state = self.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.last_activity = unix_now();
        }
        removed
    }

    /// Destroy the session: id and content are cleared, which flips the
    /// checksum so the next sweep deletes the on-disk copy.
    pub fn destroy(&self) {
        let mut state = self.lock();
        state.id = None;
        state.data.clear();
    }

    /// Strip the instance back to its vacant shape for pool reuse.
    pub(crate) fn reset(&self) {
        *self.lock() = SessionState {
            id: None,
            created_at: 0,
            last_activity: 0,
            data: BTreeMap::new(),
        };
    }

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn restore(&self, state: SessionState) {
        *self.lock() = state;
    }

    /// Content fingerprint, recomputed from the current id and data on
    /// every call. Activity timestamps are liveness metadata and stay out
    /// of it, so touch-only traffic does not look dirty to the sweeper.
    pub fn checksum(&self) -> String {
        let state = self.lock();
        let content = serde_json::json!({ "id": state.id, "data": state.data });
        let digest = Sha256::digest(content.to_string().as_bytes());
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest.iter() {
            let _ = write!(&mut hex, "{byte:02x}");
        }
        hex
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state lock poisoned")
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
