//! Status projection events
//!
//! The orchestrator publishes every task state transition on a broadcast
//! channel. Consumers (a status display, tests) render these; they never
//! write back into orchestrator state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::tasks::TaskState;

/// One state transition of one order's task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusEvent {
    pub order_number: String,
    pub state: TaskState,
    /// Fetch attempt the transition belongs to (1-based, 0 before the
    /// first attempt).
    pub attempt: u32,
    /// User-facing detail, set for error transitions.
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskStatusEvent {
    #[must_use]
    pub fn new(order_number: &str, state: TaskState, attempt: u32) -> Self {
        Self {
            order_number: order_number.to_string(),
            state,
            attempt,
            message: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub type StatusSender = broadcast::Sender<TaskStatusEvent>;
pub type StatusReceiver = broadcast::Receiver<TaskStatusEvent>;

/// Capacity of the status channel; late subscribers may miss events but
/// can always rebuild from the task snapshot.
pub const STATUS_CHANNEL_CAPACITY: usize = 256;
