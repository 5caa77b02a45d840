use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error};
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::JobError;

use super::message::Message;

/// Application-supplied execution logic for queued messages.
pub trait JobExecutor: Send + Sync {
    fn execute(&self, message: Message, ctx: &AppContext) -> Result<(), JobError>;
}

/// A single message execution on its own thread.
///
/// The worker only ever polls [`is_finished`](Job::is_finished); it never
/// blocks on the thread. A panicking executor counts as finished like any
/// other outcome, so a broken job cannot wedge the sweep.
pub struct Job {
    message_id: Uuid,
    thread: JoinHandle<()>,
}

impl Job {
    pub(crate) fn spawn(
        message: Message,
        executor: Arc<dyn JobExecutor>,
        ctx: Arc<AppContext>,
    ) -> io::Result<Job> {
        let message_id = message.id;
        let thread = thread::Builder::new()
            .name(format!("job-{message_id}"))
            .spawn(move || {
                debug!(%message_id, application = ctx.name(), "job started");
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    executor.execute(message, &ctx)
                }));
                match outcome {
                    Ok(Ok(())) => debug!(%message_id, "job completed"),
                    Ok(Err(err)) => error!(%message_id, %err, "job failed"),
                    Err(_) => error!(%message_id, "job panicked"),
                }
            })?;
        Ok(Job { message_id, thread })
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    /// Completion predicate; the only signal the worker relies on.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
