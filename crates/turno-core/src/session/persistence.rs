use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::context::AppContext;
use crate::daemon::{Daemon, DEFAULT_TIMEOUT};
use crate::error::{DaemonError, DaemonResult, PersistenceError, PersistenceResult};
use crate::store::SharedMap;
use crate::telemetry::PROFILE_TARGET;

use super::{Session, SessionFactory, SessionMarshaller};

/// Reconciles resident sessions with the on-disk store.
///
/// Each pass compares every resident session's content fingerprint with
/// the one remembered from its last flush: new or dirty content is
/// written out, unchanged-but-idle sessions are written one last time
/// and evicted, destroyed sessions lose their file and their map
/// entries. Sessions the sweeper evicts come back lazily through
/// [`unpersist`](Self::unpersist).
pub struct SessionSweeper {
    name: String,
    sessions: Arc<SharedMap<String, Arc<Session>>>,
    checksums: Arc<SharedMap<String, String>>,
    factory: Arc<SessionFactory>,
    marshaller: Arc<dyn SessionMarshaller>,
    config: SessionConfig,
    ctx: Arc<AppContext>,
}

impl SessionSweeper {
    pub fn new(
        sessions: Arc<SharedMap<String, Arc<Session>>>,
        checksums: Arc<SharedMap<String, String>>,
        factory: Arc<SessionFactory>,
        marshaller: Arc<dyn SessionMarshaller>,
        config: SessionConfig,
        ctx: Arc<AppContext>,
    ) -> Self {
        Self {
            name: "session-sweeper".to_string(),
            sessions,
            checksums,
            factory,
            marshaller,
            config,
            ctx,
        }
    }

    /// One reconciliation pass over every resident session. Write
    /// failures abort the pass; the remaining sessions are retried on
    /// the next one.
    pub fn persist(&self) -> PersistenceResult<()> {
        for (key, session) in self.sessions.snapshot() {
            self.persist_session(&key, session)?;
        }
        Ok(())
    }

    fn persist_session(&self, key: &str, session: Arc<Session>) -> PersistenceResult<()> {
        let checksum = session.checksum();
        let stored = self.checksums.get(key);
        let unchanged = stored.as_deref() == Some(checksum.as_str());

        if session.id().is_some() {
            if !unchanged {
                self.write_session_file(key, &session)?;
                self.checksums.insert(key.to_string(), checksum);
            } else if session.inactive_for() > self.config.inactivity_timeout() {
                // Still clean, but past the inactivity window: flush one
                // last time and release the instance.
                self.write_session_file(key, &session)?;
                self.checksums.remove(key);
                self.sessions.remove(key);
                self.factory.recycle(session);
                self.ctx.metrics().record_session_evicted();
                info!(session = key, "inactive session evicted");
            }
        } else if !unchanged {
            // Destroyed since the last flush: the file and both map
            // entries go away.
            self.remove_session_file(key)?;
            self.checksums.remove(key);
            self.sessions.remove(key);
            self.factory.recycle(session);
            self.ctx.metrics().record_session_removed();
            info!(session = key, "destroyed session removed");
        }
        Ok(())
    }

    /// Return the resident session, or lazily load it from its file.
    /// Missing files yield `None`; unreadable ones are deleted first.
    pub fn unpersist(&self, session_id: &str) -> Option<Arc<Session>> {
        if let Some(session) = self.sessions.get(session_id) {
            return Some(session);
        }
        match self.load_session_from_file(session_id) {
            Ok(found) => found,
            Err(PersistenceError::DataNotReadable(reason)) => {
                warn!(session = session_id, reason = %reason, "deleting unreadable session file");
                let _ = fs::remove_file(self.session_file_path(session_id));
                None
            }
            Err(err) => {
                error!(session = session_id, error = %err, "failed to load session");
                None
            }
        }
    }

    /// `<save_path>/<file_prefix><session_id>`.
    pub fn session_file_path(&self, session_id: &str) -> PathBuf {
        self.config
            .save_path
            .join(format!("{}{session_id}", self.config.file_prefix))
    }

    /// Preload every session file used within the inactivity window.
    /// Files that cannot be read or decoded are deleted rather than
    /// reported.
    fn initialize(&self) -> PersistenceResult<usize> {
        let mut loaded = 0usize;
        for entry in fs::read_dir(&self.config.save_path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(session_id) = name.strip_prefix(self.config.file_prefix.as_str()) else {
                continue;
            };
            if session_id.is_empty() || !self.modified_within_window(&entry) {
                continue;
            }
            match self.load_session_from_file(session_id) {
                Ok(Some(_)) => loaded += 1,
                Ok(None) => {}
                Err(PersistenceError::DataNotReadable(reason)) => {
                    warn!(session = session_id, reason = %reason, "deleting unreadable session file");
                    let _ = fs::remove_file(entry.path());
                }
                Err(err) => return Err(err),
            }
        }
        Ok(loaded)
    }

    /// Decode `<prefix><id>` into a pooled instance and make it resident,
    /// fingerprint included. `Ok(None)` means no such file.
    fn load_session_from_file(&self, session_id: &str) -> PersistenceResult<Option<Arc<Session>>> {
        let path = self.session_file_path(session_id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(PersistenceError::DataNotReadable(err.to_string())),
        };
        let session = self.factory.acquire();
        self.marshaller
            .unmarshall(&session, &raw)
            .map_err(|err| PersistenceError::DataNotReadable(err.to_string()))?;
        let checksum = session.checksum();
        self.sessions
            .insert(session_id.to_string(), Arc::clone(&session));
        self.checksums.insert(session_id.to_string(), checksum);
        debug!(session = session_id, "session loaded from file");
        Ok(Some(session))
    }

    fn write_session_file(&self, key: &str, session: &Session) -> PersistenceResult<()> {
        let encoded = self.marshaller.marshall(session)?;
        let path = self.session_file_path(key);
        fs::write(&path, encoded)?;
        self.ctx.metrics().record_session_flushed();
        debug!(session = key, path = %path.display(), "session file written");
        Ok(())
    }

    fn remove_session_file(&self, key: &str) -> PersistenceResult<()> {
        let path = self.session_file_path(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(session = key, path = %path.display(), "session file removed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn modified_within_window(&self, entry: &fs::DirEntry) -> bool {
        let Ok(metadata) = entry.metadata() else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        match modified.elapsed() {
            Ok(age) => age <= self.config.inactivity_timeout(),
            // A modification time in the future still counts as fresh.
            Err(_) => true,
        }
    }
}

impl Daemon for SessionSweeper {
    fn name(&self) -> &str {
        &self.name
    }

    fn bootstrap(&mut self) -> DaemonResult<()> {
        fs::create_dir_all(&self.config.save_path).map_err(|err| {
            DaemonError::Bootstrap(format!(
                "cannot create session save path {}: {err}",
                self.config.save_path.display()
            ))
        })?;
        let loaded = self
            .initialize()
            .map_err(|err| DaemonError::Bootstrap(err.to_string()))?;
        info!(
            save_path = %self.config.save_path.display(),
            loaded,
            "session sweeper ready"
        );
        Ok(())
    }

    fn iterate(&mut self) {
        if let Err(err) = self.persist() {
            error!(error = %err, "session sweep failed");
        }
        let resident = self.sessions.len();
        self.ctx.metrics().set_sessions_resident(resident as u64);
        if self.ctx.profiling() {
            debug!(
                target: PROFILE_TARGET,
                resident,
                checksums = self.checksums.len(),
                "session sweep pass"
            );
        }
    }

    fn default_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT * self.config.sweep_interval_factor
    }
}
