use std::fmt;
use std::time::Duration;

/// Worker priority classes. One worker daemon is spawned per priority;
/// the class sets how long the worker pauses after each handled entry,
/// so high-priority queues drain far more aggressively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriorityKey {
    High,
    Medium,
    Low,
}

impl PriorityKey {
    pub const ALL: [PriorityKey; 3] = [PriorityKey::High, PriorityKey::Medium, PriorityKey::Low];

    /// Per-entry pacing: 10^(2·priority) microseconds.
    pub fn queue_timeout(&self) -> Duration {
        match self {
            PriorityKey::High => Duration::from_micros(100),
            PriorityKey::Medium => Duration::from_millis(10),
            PriorityKey::Low => Duration::from_secs(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityKey::High => "high",
            PriorityKey::Medium => "medium",
            PriorityKey::Low => "low",
        }
    }
}

impl fmt::Display for PriorityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
