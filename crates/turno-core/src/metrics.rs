use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;

/// Runtime metrics, created once per application context and shared by the
/// queue worker, the request handlers, and the session sweeper.
/// Instruments are handles onto the meter, so cloning is cheap.
#[derive(Clone)]
pub struct Metrics {
    pub jobs_started: Counter<u64>,
    pub jobs_processed: Counter<u64>,
    pub jobs_failed: Counter<u64>,
    pub queue_backpressure: Counter<u64>,
    pub queue_pending: Gauge<u64>,
    pub queue_executing: Gauge<u64>,
    pub requests_handled: Counter<u64>,
    pub requests_faulted: Counter<u64>,
    pub sessions_flushed: Counter<u64>,
    pub sessions_evicted: Counter<u64>,
    pub sessions_removed: Counter<u64>,
    pub sessions_resident: Gauge<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create instruments from the global meter provider. When no provider
    /// is installed (OTel disabled) the instruments are no-op.
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("turno");
        Self::from_meter(&meter)
    }

    /// Create instruments from a specific meter (tests wire an in-memory
    /// exporter through this).
    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            jobs_started: meter
                .u64_counter("turno.jobs.started")
                .with_description("Jobs started by the queue worker")
                .build(),
            jobs_processed: meter
                .u64_counter("turno.jobs.processed")
                .with_description("Jobs observed finished and marked processed")
                .build(),
            jobs_failed: meter
                .u64_counter("turno.jobs.failed")
                .with_description("Messages forced to the failed state")
                .build(),
            queue_backpressure: meter
                .u64_counter("turno.queue.backpressure")
                .with_description("Sweep passes that hit the executing-jobs cap")
                .build(),
            queue_pending: meter
                .u64_gauge("turno.queue.pending")
                .with_description("Pending job handles after a sweep pass")
                .build(),
            queue_executing: meter
                .u64_gauge("turno.queue.executing")
                .with_description("Jobs currently executing")
                .build(),
            requests_handled: meter
                .u64_counter("turno.requests.handled")
                .with_description("Requests processed to completion")
                .build(),
            requests_faulted: meter
                .u64_counter("turno.requests.faulted")
                .with_description("Requests that ended with a captured fault")
                .build(),
            sessions_flushed: meter
                .u64_counter("turno.sessions.flushed")
                .with_description("Session files written by the sweeper")
                .build(),
            sessions_evicted: meter
                .u64_counter("turno.sessions.evicted")
                .with_description("Inactive sessions dropped from memory")
                .build(),
            sessions_removed: meter
                .u64_counter("turno.sessions.removed")
                .with_description("Destroyed sessions removed from disk and memory")
                .build(),
            sessions_resident: meter
                .u64_gauge("turno.sessions.resident")
                .with_description("Sessions resident in memory after a sweep")
                .build(),
        }
    }

    pub fn record_job_started(&self, priority: &str) {
        self.jobs_started
            .add(1, &[KeyValue::new("priority", priority.to_string())]);
    }

    pub fn record_job_processed(&self, priority: &str) {
        self.jobs_processed
            .add(1, &[KeyValue::new("priority", priority.to_string())]);
    }

    pub fn record_job_failed(&self, priority: &str) {
        self.jobs_failed
            .add(1, &[KeyValue::new("priority", priority.to_string())]);
    }

    pub fn record_backpressure(&self, priority: &str) {
        self.queue_backpressure
            .add(1, &[KeyValue::new("priority", priority.to_string())]);
    }

    pub fn set_queue_pending(&self, priority: &str, count: u64) {
        self.queue_pending
            .record(count, &[KeyValue::new("priority", priority.to_string())]);
    }

    pub fn set_queue_executing(&self, priority: &str, count: u64) {
        self.queue_executing
            .record(count, &[KeyValue::new("priority", priority.to_string())]);
    }

    pub fn record_request_handled(&self, application: &str) {
        self.requests_handled
            .add(1, &[KeyValue::new("application", application.to_string())]);
    }

    pub fn record_request_faulted(&self, application: &str, kind: &str) {
        self.requests_faulted.add(
            1,
            &[
                KeyValue::new("application", application.to_string()),
                KeyValue::new("kind", kind.to_string()),
            ],
        );
    }

    pub fn record_session_flushed(&self) {
        self.sessions_flushed.add(1, &[]);
    }

    pub fn record_session_evicted(&self) {
        self.sessions_evicted.add(1, &[]);
    }

    pub fn record_session_removed(&self) {
        self.sessions_removed.add(1, &[]);
    }

    pub fn set_sessions_resident(&self, count: u64) {
        self.sessions_resident.record(count, &[]);
    }
}
