//! Priority-paced queue worker: a shared pending set drained through an
//! explicit message state machine with a hard cap on concurrent jobs.

mod job;
mod message;
mod priority;
mod worker;

pub use job::{Job, JobExecutor};
pub use message::{Message, MessageState};
pub use priority::PriorityKey;
pub use worker::QueueWorker;

use tracing::debug;
use uuid::Uuid;

use crate::store::SharedMap;

/// Correlates a queued unit of work to its message by id. Handles live in
/// the pending set from [`JobQueue::attach`] until the message reaches a
/// terminal state and the worker purges them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: u64,
    pub message_id: Uuid,
}

/// The shared structures a worker drains: the pending handle set and the
/// message store. Producers keep an `Arc<JobQueue>` and attach handles
/// while the worker sweeps.
#[derive(Default)]
pub struct JobQueue {
    pending: SharedMap<u64, JobHandle>,
    messages: SharedMap<Uuid, Message>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a message so an attached handle can find it.
    pub fn publish(&self, message: Message) {
        self.messages.insert(message.id, message);
    }

    /// Insert a pending handle keyed by job id. Idempotent per key. The
    /// insert is a single short critical section, so attaching mid-sweep
    /// never loses the handle; it is swept on the next pass at the latest.
    pub fn attach(&self, job_id: u64, message_id: Uuid) {
        self.pending.insert(job_id, JobHandle { job_id, message_id });
        debug!(job_id, %message_id, "job handle attached");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
