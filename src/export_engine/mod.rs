//! Export engine: task lifecycle, bounded-concurrency download
//! orchestration, change-driven re-extraction, and the status event
//! stream.

pub mod controller;
pub mod events;
pub mod orchestrator;
pub mod tasks;

pub use controller::{ExtractionPipeline, MutationBatch, MutationScope, ReextractionController};
pub use events::{StatusReceiver, StatusSender, TaskStatusEvent};
pub use orchestrator::{ExportOrchestrator, OrchestratorConfig, SubmitOutcome};
pub use tasks::{DownloadTask, ExportError, TaskId, TaskState};
