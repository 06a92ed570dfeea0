//! Download task definitions
//!
//! One task per order number, owned exclusively by the orchestrator for
//! its lifetime. Consumers see clones through the status projection and
//! never mutate task state directly.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::infrastructure::csv_export::CsvError;
use crate::infrastructure::export_sink::SinkError;
use crate::infrastructure::order_query::FetchError;

/// Unique identifier for download tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one order export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Waiting in the FIFO queue for a concurrency slot.
    Pending,
    /// Fetching, or waiting out a retry backoff while holding its slot.
    Loading,
    /// Export delivered.
    Success,
    /// Terminal failure; stays visible until cleared or re-armed.
    Error,
}

impl TaskState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// One in-flight or queued order export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: TaskId,
    pub order_number: String,
    pub state: TaskState,
    /// Completed fetch attempts that ended in a retryable failure.
    pub retry_count: u32,
    /// User-facing message of the last failure, if any.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    #[must_use]
    pub fn new(order_number: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            order_number: order_number.into(),
            state: TaskState::Pending,
            retry_count: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Re-arms an errored or queued task for a fresh run: retry counter
    /// and error cleared, identity kept.
    pub fn rearm(&mut self) {
        self.state = TaskState::Pending;
        self.retry_count = 0;
        self.last_error = None;
    }
}

/// Errors surfaced by the export engine.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Malformed order number; reported immediately, consumes no retry.
    #[error("invalid order number '{0}'")]
    InvalidOrderNumber(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Csv(#[from] CsvError),

    #[error(transparent)]
    Delivery(#[from] SinkError),
}

impl ExportError {
    /// User-facing message for the status projection.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_ids_are_unique() {
        assert_ne!(TaskId::new(), TaskId::new());
    }

    #[test]
    fn terminal_states_are_success_and_error() {
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Error.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Loading.is_terminal());
    }

    #[test]
    fn rearm_resets_progress_but_keeps_identity() {
        let mut task = DownloadTask::new("4711");
        let id = task.id;
        task.state = TaskState::Error;
        task.retry_count = 4;
        task.last_error = Some("kaputt".into());

        task.rearm();

        assert_eq!(task.id, id);
        assert_eq!(task.state, TaskState::Pending);
        assert_eq!(task.retry_count, 0);
        assert!(task.last_error.is_none());
    }
}
