use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::{error, info};

use crate::error::{DaemonError, DaemonResult};

/// Base park interval between iterations when a daemon does not override
/// [`Daemon::default_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// A periodic task: one unit of work per iteration, parked in between.
///
/// Implementations carry their own strategy values (priority key, sweep
/// factor) instead of overriding the loop itself.
pub trait Daemon: Send {
    /// Thread name and log field for this daemon.
    fn name(&self) -> &str;

    /// One-time setup before the first iteration. An error here is fatal:
    /// the daemon logs it and never runs.
    fn bootstrap(&mut self) -> DaemonResult<()> {
        Ok(())
    }

    /// One unit of work. Runs on the daemon thread only.
    fn iterate(&mut self);

    /// How long to park between iterations.
    fn default_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DaemonState {
    New = 0,
    Running = 1,
    ShuttingDown = 2,
    Stopped = 3,
    Failed = 4,
}

impl DaemonState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => DaemonState::Running,
            2 => DaemonState::ShuttingDown,
            3 => DaemonState::Stopped,
            4 => DaemonState::Failed,
            _ => DaemonState::New,
        }
    }
}

/// Owner handle for a spawned daemon. Dropping it signals the daemon and
/// joins the thread; a daemon thread is never left detached.
pub struct DaemonHandle {
    name: String,
    state: Arc<AtomicU8>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// Start `daemon` on its own named thread and hand back the owner handle.
pub fn spawn<D: Daemon + 'static>(daemon: D) -> DaemonResult<DaemonHandle> {
    let name = daemon.name().to_string();
    let state = Arc::new(AtomicU8::new(DaemonState::New as u8));
    let (stop_tx, stop_rx) = bounded::<()>(1);

    let loop_state = Arc::clone(&state);
    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_loop(daemon, loop_state, stop_rx))?;

    Ok(DaemonHandle {
        name,
        state,
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    })
}

fn run_loop<D: Daemon>(mut daemon: D, state: Arc<AtomicU8>, stop_rx: Receiver<()>) {
    if let Err(err) = daemon.bootstrap() {
        error!(daemon = daemon.name(), %err, "daemon bootstrap failed");
        state.store(DaemonState::Failed as u8, Ordering::SeqCst);
        return;
    }
    state.store(DaemonState::Running as u8, Ordering::SeqCst);
    info!(daemon = daemon.name(), "daemon started");

    loop {
        // A panicking iteration must not take the daemon down with it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| daemon.iterate()));
        if outcome.is_err() {
            error!(daemon = daemon.name(), "daemon iteration panicked");
        }

        match stop_rx.recv_timeout(daemon.default_timeout()) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    state.store(DaemonState::Stopped as u8, Ordering::SeqCst);
    info!(daemon = daemon.name(), "daemon stopped");
}

impl DaemonHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> DaemonState {
        DaemonState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.state() == DaemonState::Running
    }

    /// Signal the daemon, wait for the loop to finish, and join the thread.
    pub fn shutdown(mut self) -> DaemonResult<()> {
        self.shutdown_inner()
    }

    fn shutdown_inner(&mut self) -> DaemonResult<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        if self.state() == DaemonState::Running {
            self.state
                .store(DaemonState::ShuttingDown as u8, Ordering::SeqCst);
        }
        // Closing the channel wakes the park immediately.
        drop(self.stop_tx.take());
        match thread.join() {
            Ok(()) => Ok(()),
            Err(_) => {
                self.state.store(DaemonState::Failed as u8, Ordering::SeqCst);
                Err(DaemonError::Panicked)
            }
        }
    }
}

impl Drop for DaemonHandle {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown_inner() {
            error!(daemon = %self.name, %err, "daemon shutdown failed");
        }
    }
}
