//! Order-data extraction, normalization and CSV export for the
//! Husqvarna dealer portal.
//!
//! The crate is layered the same way the data flows:
//!
//! - [`domain`] — order line records, column vocabulary, business
//!   constants (discount factor, export header).
//! - [`infrastructure`] — configuration, logging, the HTTP transport,
//!   the two extraction sources (DOM table snapshots and the GraphQL
//!   order query), text normalization, record mapping, and CSV
//!   serialization with artifact delivery.
//! - [`export_engine`] — the stateful part: per-order download tasks,
//!   the bounded-concurrency orchestrator with retry and caching, the
//!   debounced re-extraction controller, and the status event stream.

pub mod domain;
pub mod export_engine;
pub mod infrastructure;

pub use domain::{CartTotals, Column, OrderLine, RawRow};
pub use export_engine::{
    ExportOrchestrator, ExtractionPipeline, MutationBatch, MutationScope, OrchestratorConfig,
    ReextractionController, SubmitOutcome, TaskState, TaskStatusEvent,
};
pub use infrastructure::{
    AppConfig, ExportSink, FetchError, FileSystemSink, MemorySink, OrderFetcher,
    PortalOrderClient,
};
