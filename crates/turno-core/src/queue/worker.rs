use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::context::AppContext;
use crate::daemon::Daemon;
use crate::error::{DaemonError, DaemonResult, QueueError};
use crate::telemetry::PROFILE_TARGET;

use super::{Job, JobExecutor, JobHandle, JobQueue, MessageState, PriorityKey};

/// Drains one priority's pending set through the message state machine.
///
/// The worker owns two private indices: the per-message state entries,
/// seeded from the message's declared state the first time a handle is
/// swept, and the executing-job registry, which never grows past the
/// configured cap. Everything it shares with producers goes through the
/// [`JobQueue`].
pub struct QueueWorker {
    name: String,
    priority: PriorityKey,
    queue: Arc<JobQueue>,
    executor: Arc<dyn JobExecutor>,
    ctx: Arc<AppContext>,
    max_jobs_executing: usize,
    default_timeout: Duration,
    states: HashMap<Uuid, MessageState>,
    executing: HashMap<Uuid, Job>,
}

impl QueueWorker {
    pub fn new(
        priority: PriorityKey,
        queue: Arc<JobQueue>,
        executor: Arc<dyn JobExecutor>,
        ctx: Arc<AppContext>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            name: format!("queue-worker-{priority}"),
            priority,
            queue,
            executor,
            ctx,
            max_jobs_executing: config.max_jobs_executing,
            default_timeout: config.default_timeout(),
            states: HashMap::new(),
            executing: HashMap::new(),
        }
    }

    /// One full pass over the pending set. Each handle is processed with
    /// its own error containment, then the worker pauses for the
    /// priority's pacing timeout before the next one.
    fn sweep(&mut self) {
        for (job_id, handle) in self.queue.pending.snapshot() {
            if let Err(err) = self.process_handle(job_id, &handle) {
                error!(job_id, message_id = %handle.message_id, %err, "failed to process job handle");
            }
            thread::sleep(self.priority.queue_timeout());
        }

        let pending = self.queue.pending.len();
        let executing = self.executing.len();
        let metrics = self.ctx.metrics();
        metrics.set_queue_pending(self.priority.as_str(), pending as u64);
        metrics.set_queue_executing(self.priority.as_str(), executing as u64);
        if self.ctx.profiling() {
            debug!(
                target: PROFILE_TARGET,
                priority = %self.priority,
                pending,
                executing,
                "queue worker pass"
            );
        }
    }

    fn process_handle(&mut self, job_id: u64, handle: &JobHandle) -> Result<(), QueueError> {
        let message_id = handle.message_id;

        // A handle may land before its message is published; leave it
        // pending until the message shows up.
        let Some(message) = self.queue.messages.get(&message_id) else {
            debug!(job_id, %message_id, "no message published for handle yet");
            return Ok(());
        };

        let state = *self
            .states
            .entry(message_id)
            .or_insert_with(|| message.state.unwrap_or(MessageState::Unknown));

        match state {
            MessageState::Active => {
                self.states.insert(message_id, MessageState::ToProcess);
                debug!(%message_id, "message ready to be processed");
            }
            MessageState::Paused | MessageState::InProgress => {
                let finished = self
                    .executing
                    .get(&message_id)
                    .map(Job::is_finished)
                    .unwrap_or(false);
                if finished {
                    self.states.insert(message_id, MessageState::Processed);
                    self.ctx.metrics().record_job_processed(self.priority.as_str());
                    info!(%message_id, "job finished, removing from job queue");
                } else {
                    debug!(%message_id, state = %state, "job still in progress");
                }
            }
            MessageState::Processed | MessageState::Failed => {
                self.cleanup(job_id, message_id);
            }
            MessageState::ToProcess => {
                if self.executing.len() < self.max_jobs_executing {
                    let job = Job::spawn(message, Arc::clone(&self.executor), Arc::clone(&self.ctx))
                        .map_err(|source| QueueError::JobSpawn { message_id, source })?;
                    self.executing.insert(message_id, job);
                    self.states.insert(message_id, MessageState::InProgress);
                    self.ctx.metrics().record_job_started(self.priority.as_str());
                    debug!(%message_id, executing = self.executing.len(), "job started");
                } else {
                    info!(
                        executing = self.executing.len(),
                        waiting = self.queue.pending.len(),
                        "job queue full"
                    );
                    self.ctx.metrics().record_backpressure(self.priority.as_str());
                }
            }
            MessageState::Unknown => {
                self.states.insert(message_id, MessageState::Failed);
                self.ctx.metrics().record_job_failed(self.priority.as_str());
                error!(%message_id, "message has an invalid state");
            }
        }
        Ok(())
    }

    /// Terminal purge of every structure tracking the message. Safe to run
    /// again for ids that are already gone.
    fn cleanup(&mut self, job_id: u64, message_id: Uuid) {
        self.executing.remove(&message_id);
        self.states.remove(&message_id);
        self.queue.messages.remove(&message_id);
        self.queue.pending.remove(&job_id);
        debug!(job_id, %message_id, "message purged after terminal state");
    }
}

impl Daemon for QueueWorker {
    fn name(&self) -> &str {
        &self.name
    }

    fn bootstrap(&mut self) -> DaemonResult<()> {
        if self.max_jobs_executing == 0 {
            return Err(DaemonError::Bootstrap(
                "max_jobs_executing must be at least 1".to_string(),
            ));
        }
        info!(
            priority = %self.priority,
            cap = self.max_jobs_executing,
            "queue worker ready"
        );
        Ok(())
    }

    fn iterate(&mut self) {
        self.sweep();
    }

    fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    use opentelemetry::KeyValue;

    use crate::error::JobError;
    use crate::metrics::test_harness::MetricTestHarness;
    use crate::queue::Message;

    use super::*;

    #[derive(Default)]
    struct CountingExecutor {
        runs: AtomicUsize,
    }

    impl JobExecutor for CountingExecutor {
        fn execute(&self, _message: Message, _ctx: &AppContext) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Holds every job until the gate opens and tracks the concurrency peak.
    struct ProbeExecutor {
        gate: Arc<AtomicBool>,
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ProbeExecutor {
        fn new(gate: Arc<AtomicBool>) -> Self {
            Self {
                gate,
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl JobExecutor for ProbeExecutor {
        fn execute(&self, _message: Message, _ctx: &AppContext) -> Result<(), JobError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            while !self.gate.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_worker(executor: Arc<dyn JobExecutor>, cap: usize) -> (Arc<JobQueue>, QueueWorker) {
        let queue = Arc::new(JobQueue::new());
        let config = WorkerConfig {
            max_jobs_executing: cap,
            default_timeout_ms: 5,
        };
        let ctx = Arc::new(AppContext::new("test-app"));
        let worker = QueueWorker::new(
            PriorityKey::High,
            Arc::clone(&queue),
            executor,
            ctx,
            &config,
        );
        (queue, worker)
    }

    fn attach_message(queue: &JobQueue, job_id: u64) -> Uuid {
        let message = Message::new(vec![]);
        let id = message.id;
        queue.publish(message);
        queue.attach(job_id, id);
        id
    }

    /// Sweep until the pending set drains or the deadline hits.
    fn drain(worker: &mut QueueWorker, queue: &JobQueue) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while queue.pending_count() > 0 {
            assert!(Instant::now() < deadline, "queue did not drain in time");
            worker.sweep();
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn active_message_runs_to_terminal_purge() {
        let executor = Arc::new(CountingExecutor::default());
        let (queue, mut worker) = test_worker(Arc::clone(&executor) as _, 200);
        let message_id = attach_message(&queue, 1);

        // Pass 1 marks the message ready; pass 2 starts the job.
        worker.sweep();
        assert_eq!(worker.states.get(&message_id), Some(&MessageState::ToProcess));
        worker.sweep();
        assert_eq!(worker.states.get(&message_id), Some(&MessageState::InProgress));
        assert_eq!(worker.executing.len(), 1);

        drain(&mut worker, &queue);
        assert_eq!(executor.runs.load(Ordering::SeqCst), 1);
        assert_eq!(queue.message_count(), 0);
        assert!(worker.states.is_empty());
        assert!(worker.executing.is_empty());
    }

    #[test]
    fn declared_terminal_state_purges_on_first_sweep() {
        let executor = Arc::new(CountingExecutor::default());
        let (queue, mut worker) = test_worker(Arc::clone(&executor) as _, 200);

        let message = Message::new(vec![]).with_state(MessageState::Processed);
        let id = message.id;
        queue.publish(message);
        queue.attach(1, id);

        worker.sweep();
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.message_count(), 0);
        assert_eq!(executor.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handle_without_message_stays_pending() {
        let executor = Arc::new(CountingExecutor::default());
        let (queue, mut worker) = test_worker(executor as _, 200);
        queue.attach(9, Message::new_id());

        worker.sweep();
        worker.sweep();
        assert_eq!(queue.pending_count(), 1);
        assert!(worker.states.is_empty());
    }

    #[test]
    fn undeclared_state_seeds_unknown_and_fails() {
        let executor = Arc::new(CountingExecutor::default());
        let (queue, mut worker) = test_worker(Arc::clone(&executor) as _, 200);

        let mut message = Message::new(vec![]);
        message.state = None;
        let id = message.id;
        queue.publish(message);
        queue.attach(1, id);

        worker.sweep();
        assert_eq!(worker.states.get(&id), Some(&MessageState::Failed));
        worker.sweep();
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(queue.message_count(), 0);
        assert_eq!(executor.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn paused_message_without_a_job_stays_paused() {
        let executor = Arc::new(CountingExecutor::default());
        let (queue, mut worker) = test_worker(executor as _, 200);

        let message = Message::new(vec![]).with_state(MessageState::Paused);
        let id = message.id;
        queue.publish(message);
        queue.attach(1, id);

        for _ in 0..3 {
            worker.sweep();
        }
        assert_eq!(worker.states.get(&id), Some(&MessageState::Paused));
        assert!(worker.executing.is_empty());
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn paused_message_with_finished_job_becomes_processed() {
        let executor = Arc::new(CountingExecutor::default());
        let (queue, mut worker) = test_worker(Arc::clone(&executor) as _, 200);

        let message = Message::new(vec![]).with_state(MessageState::Paused);
        let id = message.id;
        queue.publish(message.clone());
        queue.attach(1, id);

        let job = Job::spawn(
            message,
            Arc::clone(&worker.executor),
            Arc::clone(&worker.ctx),
        )
        .unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while !job.is_finished() {
            assert!(Instant::now() < deadline, "job did not finish");
            thread::sleep(Duration::from_millis(1));
        }
        worker.executing.insert(id, job);

        worker.sweep();
        assert_eq!(worker.states.get(&id), Some(&MessageState::Processed));
        worker.sweep();
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn cap_bounds_concurrent_jobs() {
        let gate = Arc::new(AtomicBool::new(false));
        let executor = Arc::new(ProbeExecutor::new(Arc::clone(&gate)));
        let (queue, mut worker) = test_worker(Arc::clone(&executor) as _, 2);

        for job_id in 0..5 {
            attach_message(&queue, job_id);
        }

        worker.sweep(); // all ready
        worker.sweep(); // two start, three hit the cap
        assert_eq!(worker.executing.len(), 2);
        worker.sweep();
        assert_eq!(worker.executing.len(), 2);

        gate.store(true, Ordering::SeqCst);
        drain(&mut worker, &queue);
        assert_eq!(executor.peak.load(Ordering::SeqCst), 2);
        assert!(worker.executing.is_empty());
    }

    #[test]
    fn backpressure_is_recorded_per_pass() {
        let harness = MetricTestHarness::new();
        let gate = Arc::new(AtomicBool::new(false));
        let executor = Arc::new(ProbeExecutor::new(Arc::clone(&gate)));

        let queue = Arc::new(JobQueue::new());
        let config = WorkerConfig {
            max_jobs_executing: 1,
            default_timeout_ms: 5,
        };
        let ctx = Arc::new(
            AppContext::new("test-app").with_metrics(harness.metrics.clone()),
        );
        let mut worker = QueueWorker::new(
            PriorityKey::High,
            Arc::clone(&queue),
            Arc::clone(&executor) as _,
            ctx,
            &config,
        );

        attach_message(&queue, 1);
        attach_message(&queue, 2);

        worker.sweep(); // both ready
        worker.sweep(); // one starts, one is refused
        let attrs = vec![KeyValue::new("priority", "high".to_string())];
        harness.assert_counter("turno.queue.backpressure", &attrs, 1);
        harness.assert_counter("turno.jobs.started", &attrs, 1);

        gate.store(true, Ordering::SeqCst);
        drain(&mut worker, &queue);
    }

    #[test]
    fn bootstrap_rejects_a_zero_cap() {
        let executor = Arc::new(CountingExecutor::default());
        let (_queue, mut worker) = test_worker(executor as _, 0);
        assert!(worker.bootstrap().is_err());
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(16))]

            /// Every attached message reaches a terminal state and is
            /// purged from all structures, whatever the batch size.
            #[test]
            fn pending_set_always_drains(count in 1usize..12) {
                let executor = Arc::new(CountingExecutor::default());
                let (queue, mut worker) = test_worker(Arc::clone(&executor) as _, 200);
                for job_id in 0..count {
                    attach_message(&queue, job_id as u64);
                }

                let deadline = Instant::now() + Duration::from_secs(10);
                while queue.pending_count() > 0 && Instant::now() < deadline {
                    worker.sweep();
                    thread::sleep(Duration::from_millis(1));
                }

                prop_assert_eq!(queue.pending_count(), 0);
                prop_assert_eq!(queue.message_count(), 0);
                prop_assert!(worker.states.is_empty());
                prop_assert!(worker.executing.is_empty());
                prop_assert_eq!(executor.runs.load(Ordering::SeqCst), count);
            }
        }
    }
}
