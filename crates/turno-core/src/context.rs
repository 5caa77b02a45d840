use crate::metrics::Metrics;

/// Shared application identity handed to jobs, request handlers, and the
/// session sweeper. Owns the metric instruments for the application so
/// they are created once, not per request or per job.
pub struct AppContext {
    name: String,
    profiling: bool,
    metrics: Metrics,
}

impl AppContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            profiling: false,
            metrics: Metrics::new(),
        }
    }

    /// Enable `turno::profile` debug events (pass sizes, request URIs,
    /// sweep counts).
    pub fn with_profiling(mut self) -> Self {
        self.profiling = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profiling(&self) -> bool {
        self.profiling
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    #[cfg(test)]
    pub(crate) fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }
}
