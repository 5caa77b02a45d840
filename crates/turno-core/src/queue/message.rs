use std::fmt;

use uuid::Uuid;

/// Lifecycle states of a queued message. The worker's transition table in
/// [`QueueWorker`](super::QueueWorker) is the single source of truth for
/// how a message moves between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageState {
    Unknown,
    Active,
    ToProcess,
    InProgress,
    Paused,
    Processed,
    Failed,
}

impl MessageState {
    /// Map a producer's wire code onto the enumeration. Codes outside the
    /// known range come back as `Unknown`, which the worker then fails
    /// with an error log instead of misbehaving silently.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => MessageState::Active,
            2 => MessageState::Paused,
            3 => MessageState::ToProcess,
            4 => MessageState::InProgress,
            5 => MessageState::Processed,
            6 => MessageState::Failed,
            _ => MessageState::Unknown,
        }
    }

    /// Terminal states trigger the purge of every structure tracking the
    /// message.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageState::Processed | MessageState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageState::Unknown => "unknown",
            MessageState::Active => "active",
            MessageState::ToProcess => "to-process",
            MessageState::InProgress => "in-progress",
            MessageState::Paused => "paused",
            MessageState::Processed => "processed",
            MessageState::Failed => "failed",
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work published to the queue. Workers look messages up by id
/// and clone them to start execution, so the stored copy stays untouched
/// until its terminal purge.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    /// State declared by the producer. Seeds the worker's state entry the
    /// first time the matching handle is swept; `None` seeds `Unknown`.
    pub state: Option<MessageState>,
    pub payload: Vec<u8>,
}

impl Message {
    /// A fresh active message with a time-ordered id.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Self::new_id(),
            state: Some(MessageState::Active),
            payload: payload.into(),
        }
    }

    pub fn with_state(mut self, state: MessageState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn new_id() -> Uuid {
        Uuid::now_v7()
    }
}
